//! Onboarding flow — the multi-page questionnaire a new user completes
//! before first use.
//!
//! A static [`PageMap`] orders the screens. [`FlowSequencer`] derives
//! next/previous/jump targets and progress from an explicit [`NavState`].
//! [`OnboardingStore`] accumulates answers and persists them behind a gate,
//! and the calculating step turns the finished answers into a nutrition plan.

pub mod calculating;
pub mod data_store;
pub mod model;
pub mod navigation;
pub mod pages;
pub mod routes;

pub use calculating::{
    CalculationHandle, PlanCalculation, ProgressSimulator, ProgressSnapshot, Stage,
    spawn_calculation,
};
pub use data_store::{OnboardingStore, Persisted, completion_marker};
pub use model::{
    ActivityLevel, AnswersPatch, DietType, Gender, Goal, OnboardingAnswers, UnitSystem,
};
pub use navigation::{
    FlowSequencer, HistoryNavigator, MAIN_ROUTE, NavOutcome, NavState, Navigator,
    ONBOARDING_PREFIX, progress_percent,
};
pub use pages::{DEFAULT_SCREENS, PageMap};
pub use routes::{OnboardingRouteState, onboarding_routes};
