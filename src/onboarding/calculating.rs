//! The "calculating your plan" step.
//!
//! Two halves: a [`ProgressSimulator`] that drives the animated progress bar,
//! and [`PlanCalculation`], which batch-saves the answers, requests a plan
//! and caches it. Retries are bounded and stop when the user navigates away.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::RetryPolicy;
use crate::error::PlanError;
use crate::nutrition::{NutritionPlanner, NutritionRecommendation, PlanCache, PlanInput};

use super::data_store::OnboardingStore;

// ── Progress simulator ──────────────────────────────────────────────

/// A labelled stretch of the progress bar, ending at `until_percent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub label: String,
    pub until_percent: u8,
}

impl Stage {
    pub fn new(label: impl Into<String>, until_percent: u8) -> Self {
        Self {
            label: label.into(),
            until_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub stage: String,
    pub done: bool,
}

/// Linear 0→100 % timer with stage labels.
#[derive(Debug, Clone)]
pub struct ProgressSimulator {
    duration: Duration,
    stages: Vec<Stage>,
}

impl ProgressSimulator {
    /// Stages are sorted by `until_percent`; an empty list gets one
    /// catch-all stage.
    pub fn new(duration: Duration, mut stages: Vec<Stage>) -> Self {
        stages.sort_by_key(|s| s.until_percent);
        if stages.is_empty() {
            stages.push(Stage::new("Calculating", 100));
        }
        Self { duration, stages }
    }

    pub fn with_default_stages(duration: Duration) -> Self {
        Self::new(
            duration,
            vec![
                Stage::new("Customizing health plan", 25),
                Stage::new("Applying BMR formula", 50),
                Stage::new("Estimating your metabolic age", 75),
                Stage::new("Finalizing results", 100),
            ],
        )
    }

    pub fn snapshot(&self, elapsed: Duration) -> ProgressSnapshot {
        let percent = if self.duration.is_zero() {
            100
        } else {
            let ratio = elapsed.as_secs_f64() / self.duration.as_secs_f64();
            (ratio * 100.0).clamp(0.0, 100.0).floor() as u8
        };
        let stage = self
            .stages
            .iter()
            .find(|s| percent < s.until_percent)
            .or_else(|| self.stages.last())
            .map(|s| s.label.clone())
            .unwrap_or_default();
        ProgressSnapshot {
            percent,
            stage,
            done: percent >= 100,
        }
    }
}

// ── Plan calculation ────────────────────────────────────────────────

/// Batch save → plan request (with retry) → cache.
pub struct PlanCalculation {
    store: Arc<OnboardingStore>,
    planner: Arc<dyn NutritionPlanner>,
    cache: PlanCache,
    retry: RetryPolicy,
}

impl PlanCalculation {
    pub fn new(
        store: Arc<OnboardingStore>,
        planner: Arc<dyn NutritionPlanner>,
        cache: PlanCache,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            planner,
            cache,
            retry,
        }
    }

    /// Run to completion without a cancellation source.
    pub async fn run(&self) -> Result<NutritionRecommendation, PlanError> {
        let (_tx, rx) = watch::channel(false);
        self.run_until_cancelled(rx).await
    }

    /// Run, giving up at the next retry wait once `cancel` turns true.
    pub async fn run_until_cancelled(
        &self,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<NutritionRecommendation, PlanError> {
        // The request must see what the batch save wrote, so the snapshot is
        // taken only after the save completes.
        if let Err(e) = self.store.batch_save().await {
            tracing::warn!("Batch save before plan calculation failed: {}", e);
        }
        let answers = self.store.snapshot().await;
        let input = PlanInput::from_answers(&answers, Utc::now().date_naive())?;

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if *cancel.borrow() {
                return Err(PlanError::Cancelled);
            }

            match self.planner.recommend(&input).await {
                Ok(plan) => {
                    if let Err(e) = self.cache.save(&plan).await {
                        tracing::warn!("Failed to cache nutrition plan: {}", e);
                    }
                    tracing::info!(
                        attempt,
                        planner = self.planner.name(),
                        calories = plan.calories,
                        "Nutrition plan calculated"
                    );
                    return Ok(plan);
                }
                Err(e) if !is_retryable(&e) => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    tracing::error!(attempt, "Nutrition plan calculation failed: {}", e);
                    return Err(PlanError::Exhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        delay_ms = self.retry.delay.as_millis() as u64,
                        "Nutrition plan request failed, retrying: {}",
                        e
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry.delay) => {}
                        _ = cancelled(&mut cancel) => {
                            tracing::info!(attempt, "Plan calculation cancelled during retry wait");
                            return Err(PlanError::Cancelled);
                        }
                    }
                    attempt += 1;
                }
            }
        }
    }
}

fn is_retryable(e: &PlanError) -> bool {
    matches!(
        e,
        PlanError::Upstream { .. } | PlanError::Timeout { .. } | PlanError::InvalidResponse { .. }
    )
}

/// Resolves once the flag turns true. A dropped sender never cancels.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// A calculation running on its own task.
pub struct CalculationHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<Result<NutritionRecommendation, PlanError>>,
}

impl CalculationHandle {
    /// Ask the calculation to stop (e.g. the user left the screen).
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Wait for the result. A panic inside the calculation is resumed on
    /// the caller; only an aborted task reads as `Cancelled`.
    pub async fn join(self) -> Result<NutritionRecommendation, PlanError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                tracing::error!("Plan calculation task panicked");
                std::panic::resume_unwind(e.into_panic())
            }
            Err(e) => {
                tracing::warn!("Plan calculation task aborted: {}", e);
                Err(PlanError::Cancelled)
            }
        }
    }
}

/// Start a calculation in the background.
pub fn spawn_calculation(calculation: Arc<PlanCalculation>) -> CalculationHandle {
    let (cancel, rx) = watch::channel(false);
    let task = tokio::spawn(async move { calculation.run_until_cancelled(rx).await });
    CalculationHandle { cancel, task }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::nutrition::EstimatePlanner;
    use crate::onboarding::model::{ActivityLevel, Gender, Goal, OnboardingAnswers};
    use crate::store::{KeyValueStore, MemoryStore, keys};

    /// Fails the first `failures` calls, then delegates to the estimator.
    struct FlakyPlanner {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyPlanner {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NutritionPlanner for FlakyPlanner {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn recommend(
            &self,
            input: &PlanInput,
        ) -> Result<NutritionRecommendation, PlanError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                return Err(PlanError::Upstream {
                    planner: "flaky".to_string(),
                    reason: format!("failure {n}"),
                });
            }
            EstimatePlanner::new().recommend(input).await
        }
    }

    /// Asserts at request time that the answers were already persisted.
    struct ReadsStoragePlanner {
        storage: Arc<MemoryStore>,
    }

    #[async_trait]
    impl NutritionPlanner for ReadsStoragePlanner {
        fn name(&self) -> &str {
            "reads-storage"
        }
        async fn recommend(
            &self,
            input: &PlanInput,
        ) -> Result<NutritionRecommendation, PlanError> {
            let raw = self
                .storage
                .get(keys::ONBOARDING_ANSWERS)
                .await?
                .ok_or(PlanError::NoPlan)?;
            let saved: OnboardingAnswers =
                serde_json::from_str(&raw).map_err(|e| PlanError::Storage(e.into()))?;
            assert_eq!(saved.weight_kg, Some(input.weight_kg));
            EstimatePlanner::new().recommend(input).await
        }
    }

    fn complete(answers: &mut OnboardingAnswers) {
        answers.gender = Some(Gender::Male);
        answers.date_of_birth = NaiveDate::from_ymd_opt(1990, 1, 15);
        answers.height_cm = Some(180.0);
        answers.weight_kg = Some(80.0);
        answers.activity_level = Some(ActivityLevel::Moderate);
        answers.goal = Some(Goal::Maintain);
    }

    async fn setup(
        planner: Arc<dyn NutritionPlanner>,
        retry: RetryPolicy,
    ) -> (Arc<MemoryStore>, PlanCalculation) {
        let storage = Arc::new(MemoryStore::new());
        let store = Arc::new(OnboardingStore::new(storage.clone()));
        store.set_should_save_to_storage(false).await;
        store.update(complete).await.unwrap();
        let calc = PlanCalculation::new(store, planner, PlanCache::new(storage.clone()), retry);
        (storage, calc)
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[test]
    fn simulator_interpolates_linearly() {
        let sim = ProgressSimulator::with_default_stages(Duration::from_secs(8));
        let start = sim.snapshot(Duration::ZERO);
        assert_eq!(start.percent, 0);
        assert_eq!(start.stage, "Customizing health plan");
        assert!(!start.done);

        let mid = sim.snapshot(Duration::from_secs(4));
        assert_eq!(mid.percent, 50);
        assert_eq!(mid.stage, "Estimating your metabolic age");

        let end = sim.snapshot(Duration::from_secs(20));
        assert_eq!(end.percent, 100);
        assert_eq!(end.stage, "Finalizing results");
        assert!(end.done);
    }

    #[test]
    fn simulator_edge_cases() {
        let instant = ProgressSimulator::with_default_stages(Duration::ZERO);
        assert!(instant.snapshot(Duration::ZERO).done);

        let unlabelled = ProgressSimulator::new(Duration::from_secs(1), Vec::new());
        assert_eq!(unlabelled.snapshot(Duration::from_millis(500)).stage, "Calculating");

        let unordered = ProgressSimulator::new(
            Duration::from_secs(10),
            vec![Stage::new("late", 100), Stage::new("early", 30)],
        );
        assert_eq!(unordered.snapshot(Duration::from_secs(1)).stage, "early");
    }

    #[tokio::test]
    async fn batch_saves_before_requesting() {
        let storage = Arc::new(MemoryStore::new());
        let store = Arc::new(OnboardingStore::new(storage.clone()));
        store.set_should_save_to_storage(false).await;
        store.update(complete).await.unwrap();
        assert!(storage.get(keys::ONBOARDING_ANSWERS).await.unwrap().is_none());

        let planner = Arc::new(ReadsStoragePlanner {
            storage: storage.clone(),
        });
        let calc = PlanCalculation::new(
            store.clone(),
            planner,
            PlanCache::new(storage.clone()),
            fast_retry(1),
        );
        calc.run().await.unwrap();
        assert!(store.should_save_to_storage().await);
    }

    #[tokio::test]
    async fn success_is_cached() {
        let planner = Arc::new(FlakyPlanner::new(0));
        let (storage, calc) = setup(planner.clone(), fast_retry(3)).await;
        let plan = calc.run().await.unwrap();
        assert_eq!(planner.calls(), 1);

        let cached = PlanCache::new(storage).load().await.unwrap().unwrap();
        assert_eq!(cached, plan);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let planner = Arc::new(FlakyPlanner::new(2));
        let (_storage, calc) = setup(planner.clone(), fast_retry(3)).await;
        calc.run().await.unwrap();
        assert_eq!(planner.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let planner = Arc::new(FlakyPlanner::new(10));
        let (storage, calc) = setup(planner.clone(), fast_retry(3)).await;
        match calc.run().await.unwrap_err() {
            PlanError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, PlanError::Upstream { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(planner.calls(), 3);
        assert!(PlanCache::new(storage).load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn incomplete_answers_fail_without_calling_planner() {
        let planner = Arc::new(FlakyPlanner::new(0));
        let storage = Arc::new(MemoryStore::new());
        let store = Arc::new(OnboardingStore::new(storage.clone()));
        let calc = PlanCalculation::new(
            store,
            planner.clone(),
            PlanCache::new(storage),
            fast_retry(3),
        );
        assert!(matches!(
            calc.run().await.unwrap_err(),
            PlanError::IncompleteProfile { .. }
        ));
        assert_eq!(planner.calls(), 0);
    }

    #[tokio::test]
    async fn cancel_stops_retry_wait() {
        let planner = Arc::new(FlakyPlanner::new(u32::MAX));
        let retry = RetryPolicy {
            delay: Duration::from_secs(30),
            max_attempts: 100,
        };
        let (_storage, calc) = setup(planner.clone(), retry).await;
        let handle = spawn_calculation(Arc::new(calc));

        // Let the first attempt fail and the retry wait begin.
        while planner.calls() == 0 {
            tokio::task::yield_now().await;
        }
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .expect("cancelled calculation should finish promptly");
        assert!(matches!(result, Err(PlanError::Cancelled)));
        assert_eq!(planner.calls(), 1);
    }

    struct PanickingPlanner;

    #[async_trait]
    impl NutritionPlanner for PanickingPlanner {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn recommend(
            &self,
            _input: &PlanInput,
        ) -> Result<NutritionRecommendation, PlanError> {
            panic!("planner blew up");
        }
    }

    #[tokio::test]
    #[should_panic(expected = "planner blew up")]
    async fn join_resumes_task_panic() {
        let (_storage, calc) = setup(Arc::new(PanickingPlanner), fast_retry(1)).await;
        let _ = spawn_calculation(Arc::new(calc)).join().await;
    }
}
