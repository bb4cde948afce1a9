//! Local estimator — Mifflin-St Jeor BMR with activity and goal adjustment.
//!
//! Deterministic and offline. Used when no model API key is configured.

use async_trait::async_trait;
use chrono::Utc;

use crate::error::PlanError;
use crate::onboarding::model::{Gender, Goal};

use super::NutritionPlanner;
use super::model::{NutritionRecommendation, PlanInput};

/// kcal stored in one kg of body fat.
const KCAL_PER_KG: f64 = 7700.0;
/// Largest daily surplus or deficit applied for a goal.
const MAX_DAILY_ADJUSTMENT: f64 = 1000.0;
const PROTEIN_G_PER_KG: f64 = 1.8;
const FAT_SHARE: f64 = 0.25;

#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatePlanner;

impl EstimatePlanner {
    pub fn new() -> Self {
        Self
    }

    /// Basal metabolic rate in kcal/day.
    pub fn bmr(input: &PlanInput) -> f64 {
        let sex_offset = match input.gender {
            Gender::Male => 5.0,
            Gender::Female => -161.0,
            Gender::Other => -78.0,
        };
        10.0 * input.weight_kg + 6.25 * input.height_cm - 5.0 * f64::from(input.age_years)
            + sex_offset
    }

    fn calorie_floor(gender: Gender) -> f64 {
        match gender {
            Gender::Female => 1200.0,
            Gender::Male | Gender::Other => 1500.0,
        }
    }

    /// Build targets without any I/O.
    pub fn estimate(&self, input: &PlanInput) -> NutritionRecommendation {
        let bmr = Self::bmr(input);
        let tdee = bmr * input.activity_level.multiplier();
        let adjustment = (input.weekly_change_kg * KCAL_PER_KG / 7.0).min(MAX_DAILY_ADJUSTMENT);

        let calories = match input.goal {
            Goal::Lose => tdee - adjustment,
            Goal::Maintain => tdee,
            Goal::Gain => tdee + adjustment,
        }
        .max(Self::calorie_floor(input.gender))
        .round();

        let protein_g = (input.weight_kg * PROTEIN_G_PER_KG).round();
        let fat_g = (calories * FAT_SHARE / 9.0).round();
        let carbs_g = ((calories - protein_g * 4.0 - fat_g * 9.0) / 4.0).round().max(0.0);

        let rationale = format!(
            "Your BMR is about {} kcal; with {} activity you burn roughly {} kcal a day. \
             {} kcal/day supports your goal to {}. Protein is set at {PROTEIN_G_PER_KG} g per kg \
             of body weight and fat at {}% of calories, with carbs making up the rest.",
            bmr.round(),
            input.activity_level,
            tdee.round(),
            calories,
            input.goal,
            (FAT_SHARE * 100.0).round(),
        );

        NutritionRecommendation {
            calories: calories as u32,
            protein_g: protein_g as u32,
            carbs_g: carbs_g as u32,
            fat_g: fat_g as u32,
            rationale,
            source: self.name().to_string(),
            generated_at: Utc::now(),
            edited: false,
        }
    }
}

#[async_trait]
impl NutritionPlanner for EstimatePlanner {
    fn name(&self) -> &str {
        "estimate"
    }

    async fn recommend(&self, input: &PlanInput) -> Result<NutritionRecommendation, PlanError> {
        Ok(self.estimate(input))
    }
}
