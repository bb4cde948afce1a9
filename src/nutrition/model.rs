//! Nutrition plan models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::onboarding::model::{ActivityLevel, DietType, Gender, Goal, OnboardingAnswers};

/// Weekly change assumed when the goal-speed page was skipped.
pub const DEFAULT_WEEKLY_CHANGE_KG: f64 = 0.5;

/// Daily calorie and macro targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NutritionRecommendation {
    pub calories: u32,
    pub protein_g: u32,
    pub carbs_g: u32,
    pub fat_g: u32,
    pub rationale: String,
    /// Name of the planner that produced it.
    pub source: String,
    pub generated_at: DateTime<Utc>,
    /// Set once the user has adjusted any target by hand.
    #[serde(default)]
    pub edited: bool,
}

/// User edits to a cached recommendation. Absent fields are kept.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetEdit {
    pub calories: Option<u32>,
    pub protein_g: Option<u32>,
    pub carbs_g: Option<u32>,
    pub fat_g: Option<u32>,
}

impl NutritionRecommendation {
    /// Apply a user edit. A no-op edit leaves the `edited` flag alone.
    pub fn apply_edit(&mut self, edit: TargetEdit) {
        let before = (self.calories, self.protein_g, self.carbs_g, self.fat_g);
        if let Some(v) = edit.calories {
            self.calories = v;
        }
        if let Some(v) = edit.protein_g {
            self.protein_g = v;
        }
        if let Some(v) = edit.carbs_g {
            self.carbs_g = v;
        }
        if let Some(v) = edit.fat_g {
            self.fat_g = v;
        }
        if before != (self.calories, self.protein_g, self.carbs_g, self.fat_g) {
            self.edited = true;
        }
    }
}

/// Validated planner input, derived from completed onboarding answers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanInput {
    pub gender: Gender,
    pub age_years: u32,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
    pub weekly_change_kg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diet_type: Option<DietType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub obstacles: Vec<String>,
}

impl PlanInput {
    /// Validate answers against `today`. Every missing required field is
    /// reported at once.
    pub fn from_answers(answers: &OnboardingAnswers, today: NaiveDate) -> Result<Self, PlanError> {
        let mut missing = Vec::new();
        if answers.gender.is_none() {
            missing.push("gender");
        }
        if answers.date_of_birth.is_none() {
            missing.push("date_of_birth");
        }
        if answers.height_cm.is_none() {
            missing.push("height_cm");
        }
        if answers.weight_kg.is_none() {
            missing.push("weight_kg");
        }
        if answers.activity_level.is_none() {
            missing.push("activity_level");
        }
        if answers.goal.is_none() {
            missing.push("goal");
        }

        let (
            Some(gender),
            Some(dob),
            Some(height_cm),
            Some(weight_kg),
            Some(activity_level),
            Some(goal),
        ) = (
            answers.gender,
            answers.date_of_birth,
            answers.height_cm,
            answers.weight_kg,
            answers.activity_level,
            answers.goal,
        ) else {
            return Err(PlanError::IncompleteProfile { missing });
        };

        let age_years = today
            .years_since(dob)
            .ok_or_else(|| PlanError::InvalidProfile {
                field: "date_of_birth",
                reason: format!("{dob} is in the future"),
            })?;
        if !(13..=120).contains(&age_years) {
            return Err(PlanError::InvalidProfile {
                field: "date_of_birth",
                reason: format!("age {age_years} is outside 13..=120"),
            });
        }
        check_range("height_cm", height_cm, 50.0, 272.0)?;
        check_range("weight_kg", weight_kg, 20.0, 400.0)?;

        let weekly_change_kg = answers
            .weekly_change_kg
            .unwrap_or(DEFAULT_WEEKLY_CHANGE_KG)
            .abs();
        check_range("weekly_change_kg", weekly_change_kg, 0.0, 1.5)?;

        Ok(Self {
            gender,
            age_years,
            height_cm,
            weight_kg,
            activity_level,
            goal,
            weekly_change_kg,
            target_weight_kg: answers.target_weight_kg,
            diet_type: answers.diet_type,
            obstacles: answers.obstacles.clone(),
        })
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), PlanError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(PlanError::InvalidProfile {
            field,
            reason: format!("{value} is outside {min}..={max}"),
        })
    }
}
