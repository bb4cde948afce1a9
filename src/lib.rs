//! Platewise — onboarding flow and nutrition targets for a food-logging app.

pub mod config;
pub mod error;
pub mod nutrition;
pub mod onboarding;
pub mod store;
