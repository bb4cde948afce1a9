//! Cached nutrition plan, stored under `keys::NUTRITION_PLAN`.

use std::sync::Arc;

use crate::error::{PlanError, StorageError};
use crate::store::{KeyValueStore, keys};

use super::model::{NutritionRecommendation, TargetEdit};

#[derive(Clone)]
pub struct PlanCache {
    storage: Arc<dyn KeyValueStore>,
}

impl PlanCache {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// The cached plan, if any. An unreadable entry is treated as absent.
    pub async fn load(&self) -> Result<Option<NutritionRecommendation>, StorageError> {
        let Some(raw) = self.storage.get(keys::NUTRITION_PLAN).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(plan) => Ok(Some(plan)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable cached nutrition plan: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn save(&self, plan: &NutritionRecommendation) -> Result<(), StorageError> {
        let value = serde_json::to_string(plan)?;
        self.storage.set(keys::NUTRITION_PLAN, &value).await
    }

    pub async fn clear(&self) -> Result<bool, StorageError> {
        self.storage.remove(keys::NUTRITION_PLAN).await
    }

    /// Apply a user edit to the cached plan and store the result.
    pub async fn update_targets(
        &self,
        edit: TargetEdit,
    ) -> Result<NutritionRecommendation, PlanError> {
        let mut plan = self.load().await?.ok_or(PlanError::NoPlan)?;
        plan.apply_edit(edit);
        self.save(&plan).await?;
        tracing::info!(calories = plan.calories, "Nutrition targets edited");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::MemoryStore;

    fn plan() -> NutritionRecommendation {
        NutritionRecommendation {
            calories: 2100,
            protein_g: 140,
            carbs_g: 230,
            fat_g: 58,
            rationale: "test".to_string(),
            source: "estimate".to_string(),
            generated_at: Utc::now(),
            edited: false,
        }
    }

    #[tokio::test]
    async fn save_load_clear() {
        let cache = PlanCache::new(Arc::new(MemoryStore::new()));
        assert!(cache.load().await.unwrap().is_none());

        cache.save(&plan()).await.unwrap();
        assert_eq!(cache.load().await.unwrap().unwrap().calories, 2100);

        assert!(cache.clear().await.unwrap());
        assert!(cache.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn edit_persists() {
        let storage = Arc::new(MemoryStore::new());
        let cache = PlanCache::new(storage.clone());
        cache.save(&plan()).await.unwrap();

        let edited = cache
            .update_targets(TargetEdit {
                protein_g: Some(160),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(edited.edited);

        let reloaded = PlanCache::new(storage).load().await.unwrap().unwrap();
        assert_eq!(reloaded.protein_g, 160);
        assert!(reloaded.edited);
    }

    #[tokio::test]
    async fn edit_without_plan() {
        let cache = PlanCache::new(Arc::new(MemoryStore::new()));
        let err = cache.update_targets(TargetEdit::default()).await.unwrap_err();
        assert!(matches!(err, PlanError::NoPlan));
    }

    #[tokio::test]
    async fn corrupt_entry_reads_as_absent() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(keys::NUTRITION_PLAN, "[]").await.unwrap();
        assert!(PlanCache::new(storage).load().await.unwrap().is_none());
    }
}
