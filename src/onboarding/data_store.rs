//! Onboarding data store — answers accumulated across pages, persisted
//! through a gate.
//!
//! Every setter updates memory first. Persistence follows only when the gate
//! is open, and a failed write never rolls back the in-memory answer.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::store::{KeyValueStore, keys};

use super::model::{
    ActivityLevel, AnswersPatch, DietType, Gender, Goal, OnboardingAnswers, UnitSystem,
};

/// What happened to the record after an in-memory update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Persisted {
    /// Written to storage.
    Written,
    /// Gate closed; held in memory until the next batch save.
    Deferred,
}

/// Owns the in-progress `OnboardingAnswers` and their persistence.
pub struct OnboardingStore {
    storage: Arc<dyn KeyValueStore>,
    answers: RwLock<OnboardingAnswers>,
}

impl OnboardingStore {
    /// Start with an empty record.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            answers: RwLock::new(OnboardingAnswers::default()),
        }
    }

    /// Restore answers from storage.
    ///
    /// A missing or unreadable record starts empty. The gate always starts
    /// open, whatever was persisted.
    pub async fn load(storage: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let mut answers = match storage.get(keys::ONBOARDING_ANSWERS).await? {
            Some(raw) => match serde_json::from_str::<OnboardingAnswers>(&raw) {
                Ok(answers) => answers,
                Err(e) => {
                    tracing::warn!("Discarding unreadable onboarding answers: {}", e);
                    OnboardingAnswers::default()
                }
            },
            None => OnboardingAnswers::default(),
        };
        answers.should_save_to_storage = true;
        if completion_marker(&*storage).await? {
            answers.is_onboarding_complete = true;
        }

        Ok(Self {
            storage,
            answers: RwLock::new(answers),
        })
    }

    /// Copy of the current answers.
    pub async fn snapshot(&self) -> OnboardingAnswers {
        self.answers.read().await.clone()
    }

    /// Apply `f` to the record, then persist it if the gate is open.
    pub async fn update<F>(&self, f: F) -> Result<Persisted, StorageError>
    where
        F: FnOnce(&mut OnboardingAnswers),
    {
        let snapshot = {
            let mut answers = self.answers.write().await;
            f(&mut answers);
            if !answers.should_save_to_storage {
                return Ok(Persisted::Deferred);
            }
            answers.clone()
        };
        self.write(&snapshot).await?;
        Ok(Persisted::Written)
    }

    /// Apply a multi-field patch with a single persistence attempt.
    pub async fn apply(&self, patch: AnswersPatch) -> Result<Persisted, StorageError> {
        self.update(|a| a.apply(patch)).await
    }

    // ── Setters ─────────────────────────────────────────────────────

    pub async fn set_gender(&self, gender: Gender) -> Result<Persisted, StorageError> {
        self.update(|a| a.gender = Some(gender)).await
    }

    pub async fn set_date_of_birth(&self, dob: NaiveDate) -> Result<Persisted, StorageError> {
        self.update(|a| a.date_of_birth = Some(dob)).await
    }

    pub async fn set_height(&self, height_cm: f64) -> Result<Persisted, StorageError> {
        self.update(|a| a.height_cm = Some(height_cm)).await
    }

    pub async fn set_weight(&self, weight_kg: f64) -> Result<Persisted, StorageError> {
        self.update(|a| a.weight_kg = Some(weight_kg)).await
    }

    pub async fn set_unit_system(&self, units: UnitSystem) -> Result<Persisted, StorageError> {
        self.update(|a| a.unit_system = units).await
    }

    pub async fn set_activity_level(
        &self,
        level: ActivityLevel,
    ) -> Result<Persisted, StorageError> {
        self.update(|a| a.activity_level = Some(level)).await
    }

    pub async fn set_workouts_per_week(&self, workouts: u32) -> Result<Persisted, StorageError> {
        self.set_activity_level(ActivityLevel::from_workouts_per_week(workouts))
            .await
    }

    pub async fn set_goal(&self, goal: Goal) -> Result<Persisted, StorageError> {
        self.update(|a| a.goal = Some(goal)).await
    }

    pub async fn set_target_weight(&self, target_kg: f64) -> Result<Persisted, StorageError> {
        self.update(|a| a.target_weight_kg = Some(target_kg)).await
    }

    pub async fn set_weekly_change(&self, kg_per_week: f64) -> Result<Persisted, StorageError> {
        self.update(|a| a.weekly_change_kg = Some(kg_per_week)).await
    }

    pub async fn set_diet_type(&self, diet: DietType) -> Result<Persisted, StorageError> {
        self.update(|a| a.diet_type = Some(diet)).await
    }

    pub async fn set_obstacles(&self, obstacles: Vec<String>) -> Result<Persisted, StorageError> {
        self.update(|a| a.obstacles = obstacles).await
    }

    pub async fn set_accomplishments(
        &self,
        accomplishments: Vec<String>,
    ) -> Result<Persisted, StorageError> {
        self.update(|a| a.accomplishments = accomplishments).await
    }

    pub async fn set_tried_other_apps(&self, tried: bool) -> Result<Persisted, StorageError> {
        self.update(|a| a.tried_other_apps = Some(tried)).await
    }

    pub async fn set_referral_source(
        &self,
        source: impl Into<String>,
    ) -> Result<Persisted, StorageError> {
        let source = source.into();
        self.update(|a| a.referral_source = Some(source)).await
    }

    // ── Gate, batch save, completion ────────────────────────────────

    /// Open or close the persistence gate. Does not write.
    pub async fn set_should_save_to_storage(&self, enabled: bool) {
        self.answers.write().await.should_save_to_storage = enabled;
        tracing::debug!(enabled, "Onboarding persistence gate toggled");
    }

    pub async fn should_save_to_storage(&self) -> bool {
        self.answers.read().await.should_save_to_storage
    }

    /// Write the whole record once and reopen the gate.
    ///
    /// The gate is reopened even when the write fails.
    pub async fn batch_save(&self) -> Result<(), StorageError> {
        let snapshot = {
            let mut answers = self.answers.write().await;
            answers.should_save_to_storage = true;
            answers.clone()
        };
        self.write(&snapshot).await?;
        tracing::info!("Onboarding answers batch-saved");
        Ok(())
    }

    /// Set the completion marker. Written regardless of the gate.
    pub async fn mark_onboarding_complete(&self) -> Result<(), StorageError> {
        let snapshot = {
            let mut answers = self.answers.write().await;
            answers.is_onboarding_complete = true;
            answers.clone()
        };
        let record = self.write(&snapshot).await;
        let marker = self
            .storage
            .set(keys::ONBOARDING_COMPLETE, "true")
            .await
            .inspect_err(|e| tracing::warn!("Failed to persist onboarding completion: {}", e));
        tracing::info!("Onboarding marked complete");
        record.and(marker)
    }

    pub async fn is_onboarding_complete(&self) -> bool {
        self.answers.read().await.is_onboarding_complete
    }

    /// Clear the answers in memory and storage. The completion marker is kept.
    pub async fn reset(&self) -> Result<(), StorageError> {
        {
            let mut answers = self.answers.write().await;
            let complete = answers.is_onboarding_complete;
            *answers = OnboardingAnswers {
                is_onboarding_complete: complete,
                ..Default::default()
            };
        }
        self.storage.remove(keys::ONBOARDING_ANSWERS).await?;
        Ok(())
    }

    async fn write(&self, answers: &OnboardingAnswers) -> Result<(), StorageError> {
        let value = serde_json::to_string(answers)
            .inspect_err(|e| tracing::warn!("Failed to serialize onboarding answers: {}", e))?;
        self.storage
            .set(keys::ONBOARDING_ANSWERS, &value)
            .await
            .inspect_err(|e| tracing::warn!("Failed to persist onboarding answers: {}", e))
    }
}

/// Read the completion marker straight from storage.
///
/// This is the only signal entry routing uses to choose between onboarding
/// and the main app.
pub async fn completion_marker(storage: &dyn KeyValueStore) -> Result<bool, StorageError> {
    Ok(storage
        .get(keys::ONBOARDING_COMPLETE)
        .await?
        .is_some_and(|v| v.trim() == "true"))
}
