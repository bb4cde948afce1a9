//! Onboarding answer models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Display preference for body measurements. Stored values are always metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
}

impl ActivityLevel {
    /// Bucket a weekly workout count the way the workouts screen does.
    pub fn from_workouts_per_week(workouts: u32) -> Self {
        match workouts {
            0 => Self::Sedentary,
            1..=2 => Self::Light,
            3..=5 => Self::Moderate,
            _ => Self::Active,
        }
    }

    /// TDEE multiplier applied to BMR.
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.55,
            Self::Active => 1.725,
        }
    }
}

impl std::fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Active => "active",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Lose,
    Maintain,
    Gain,
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lose => write!(f, "lose weight"),
            Self::Maintain => write!(f, "maintain weight"),
            Self::Gain => write!(f, "gain weight"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DietType {
    Classic,
    Pescatarian,
    Vegetarian,
    Vegan,
}

fn default_true() -> bool {
    true
}

/// Answers accumulated across the onboarding pages.
///
/// Stored as JSON under `keys::ONBOARDING_ANSWERS`. Every answer is optional
/// until the user reaches its page; revisiting a page overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnboardingAnswers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub unit_system: UnitSystem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<ActivityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_weight_kg: Option<f64>,
    /// Desired weight change per week, in kg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_change_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet_type: Option<DietType>,
    #[serde(default)]
    pub obstacles: Vec<String>,
    #[serde(default)]
    pub accomplishments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tried_other_apps: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_source: Option<String>,
    #[serde(default)]
    pub is_onboarding_complete: bool,
    /// Persistence gate. When false, setters update memory only.
    #[serde(default = "default_true")]
    pub should_save_to_storage: bool,
}

impl Default for OnboardingAnswers {
    fn default() -> Self {
        Self {
            gender: None,
            date_of_birth: None,
            height_cm: None,
            weight_kg: None,
            unit_system: UnitSystem::default(),
            activity_level: None,
            goal: None,
            target_weight_kg: None,
            weekly_change_kg: None,
            diet_type: None,
            obstacles: Vec::new(),
            accomplishments: Vec::new(),
            tried_other_apps: None,
            referral_source: None,
            is_onboarding_complete: false,
            should_save_to_storage: true,
        }
    }
}

impl OnboardingAnswers {
    /// Overwrite every field the patch sets.
    pub fn apply(&mut self, patch: AnswersPatch) {
        let AnswersPatch {
            gender,
            date_of_birth,
            height_cm,
            weight_kg,
            unit_system,
            activity_level,
            workouts_per_week,
            goal,
            target_weight_kg,
            weekly_change_kg,
            diet_type,
            obstacles,
            accomplishments,
            tried_other_apps,
            referral_source,
        } = patch;

        if gender.is_some() {
            self.gender = gender;
        }
        if date_of_birth.is_some() {
            self.date_of_birth = date_of_birth;
        }
        if height_cm.is_some() {
            self.height_cm = height_cm;
        }
        if weight_kg.is_some() {
            self.weight_kg = weight_kg;
        }
        if let Some(units) = unit_system {
            self.unit_system = units;
        }
        if let Some(workouts) = workouts_per_week {
            self.activity_level = Some(ActivityLevel::from_workouts_per_week(workouts));
        }
        // An explicit level wins over a workout count in the same patch.
        if activity_level.is_some() {
            self.activity_level = activity_level;
        }
        if goal.is_some() {
            self.goal = goal;
        }
        if target_weight_kg.is_some() {
            self.target_weight_kg = target_weight_kg;
        }
        if weekly_change_kg.is_some() {
            self.weekly_change_kg = weekly_change_kg;
        }
        if diet_type.is_some() {
            self.diet_type = diet_type;
        }
        if let Some(obstacles) = obstacles {
            self.obstacles = obstacles;
        }
        if let Some(accomplishments) = accomplishments {
            self.accomplishments = accomplishments;
        }
        if tried_other_apps.is_some() {
            self.tried_other_apps = tried_other_apps;
        }
        if referral_source.is_some() {
            self.referral_source = referral_source;
        }
    }
}

/// A partial update to [`OnboardingAnswers`]. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AnswersPatch {
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub unit_system: Option<UnitSystem>,
    pub activity_level: Option<ActivityLevel>,
    pub workouts_per_week: Option<u32>,
    pub goal: Option<Goal>,
    pub target_weight_kg: Option<f64>,
    pub weekly_change_kg: Option<f64>,
    pub diet_type: Option<DietType>,
    pub obstacles: Option<Vec<String>>,
    pub accomplishments: Option<Vec<String>>,
    pub tried_other_apps: Option<bool>,
    pub referral_source: Option<String>,
}
