//! `KeyValueStore` trait — the device storage contract.
//!
//! One JSON string per logical record, keyed by a fixed string constant.
//! Values carry no schema version.

use async_trait::async_trait;

use crate::error::StorageError;

/// Storage keys used by the onboarding flow and plan cache.
pub mod keys {
    /// Key for the `OnboardingAnswers` JSON blob.
    pub const ONBOARDING_ANSWERS: &str = "onboarding_answers";
    /// Key for the completion marker, kept apart from the answers so a reset
    /// of the answers does not send a returning user back into onboarding.
    pub const ONBOARDING_COMPLETE: &str = "onboarding_complete";
    /// Key for the cached `NutritionRecommendation`.
    pub const NUTRITION_PLAN: &str = "nutrition_plan";
}

/// Backend-agnostic async key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the raw JSON string stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Returns whether anything was removed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
}
