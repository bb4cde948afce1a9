//! Nutrition plans — the calorie/macro targets produced once onboarding
//! answers are complete.
//!
//! Planners implement [`NutritionPlanner`]. `EstimatePlanner` computes
//! targets locally; `OpenAiPlanner` asks a chat-completions model. The
//! result is cached in device storage by [`PlanCache`].

pub mod cache;
pub mod estimate;
pub mod model;
pub mod openai;

pub use cache::PlanCache;
pub use estimate::EstimatePlanner;
pub use model::{NutritionRecommendation, PlanInput, TargetEdit};
pub use openai::OpenAiPlanner;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::PlanError;

/// Produces a recommendation from validated onboarding input.
#[async_trait]
pub trait NutritionPlanner: Send + Sync {
    /// Short identifier recorded on each recommendation.
    fn name(&self) -> &str;

    async fn recommend(&self, input: &PlanInput) -> Result<NutritionRecommendation, PlanError>;
}

/// Pick a planner from configuration: the model API when a key is set,
/// otherwise the local estimator.
pub fn create_planner(config: &AppConfig) -> Result<Arc<dyn NutritionPlanner>, PlanError> {
    match &config.openai_api_key {
        Some(key) => {
            let planner = OpenAiPlanner::new(
                key.clone(),
                &config.openai_base_url,
                &config.model,
                config.plan_timeout,
            )?;
            tracing::info!("Using OpenAI planner (model: {})", config.model);
            Ok(Arc::new(planner))
        }
        None => {
            tracing::info!("No OPENAI_API_KEY set, using local estimator");
            Ok(Arc::new(EstimatePlanner::new()))
        }
    }
}
