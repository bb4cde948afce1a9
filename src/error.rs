//! Error types for Platewise.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Page map error: {0}")]
    PageMap(#[from] PageMapError),

    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Key-value storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Invalid page map definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageMapError {
    #[error("Page map must contain at least one screen")]
    Empty,

    #[error("Page {page} has an empty screen name")]
    EmptyScreen { page: u32 },

    #[error("Screen name {screen:?} must be a single path segment")]
    InvalidScreen { screen: String },

    #[error("Screen {screen:?} appears at page {first} and page {second}")]
    Duplicate {
        screen: String,
        first: u32,
        second: u32,
    },
}

/// Navigation requests that were rejected without navigating.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("Already at last page ({current} of {total})")]
    PastLastPage { current: u32, total: u32 },

    #[error("Page {page} is outside 1..={total}")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("Onboarding can only be completed from {last:?}, current route is {route:?}")]
    NotOnLastPage { route: String, last: String },
}

/// Nutrition plan errors.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Onboarding answers incomplete, missing: {}", missing.join(", "))]
    IncompleteProfile { missing: Vec<&'static str> },

    #[error("Invalid profile value for {field}: {reason}")]
    InvalidProfile { field: &'static str, reason: String },

    #[error("Planner {planner} request failed: {reason}")]
    Upstream { planner: String, reason: String },

    #[error("Planner {planner} timed out after {timeout:?}")]
    Timeout { planner: String, timeout: Duration },

    #[error("Invalid response from {planner}: {reason}")]
    InvalidResponse { planner: String, reason: String },

    #[error("Plan calculation gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<PlanError> },

    #[error("Plan calculation cancelled")]
    Cancelled,

    #[error("No nutrition plan has been calculated yet")]
    NoPlan,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
