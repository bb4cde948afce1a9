//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for plan generation.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Retry behaviour for nutrition plan requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed wait between attempts.
    pub delay: Duration,
    /// Total attempts, including the first one. Always at least 1.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
            max_attempts: 3,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// libSQL database file backing device storage.
    pub db_path: PathBuf,
    /// HTTP port for the onboarding API.
    pub port: u16,
    /// OpenAI API key. Without one the local estimator is used.
    pub openai_api_key: Option<SecretString>,
    pub openai_base_url: String,
    pub model: String,
    pub plan_retry: RetryPolicy,
    /// Timeout applied to each planner HTTP request.
    pub plan_timeout: Duration,
    /// How long the calculating screen animates for.
    pub calculating_duration: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/platewise.db"),
            port: 8080,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            plan_retry: RetryPolicy::default(),
            plan_timeout: Duration::from_secs(30),
            calculating_duration: Duration::from_secs(8),
        }
    }
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    ///
    /// Unparsable numbers fall back to their defaults; a zero attempt count
    /// is rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("PLATEWISE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let port: u16 = lookup("PLATEWISE_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        let openai_base_url = lookup("OPENAI_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.openai_base_url);

        let model = lookup("PLATEWISE_MODEL").unwrap_or(defaults.model);

        let delay_ms: u64 = lookup("PLATEWISE_PLAN_RETRY_DELAY_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.plan_retry.delay.as_millis() as u64);

        let max_attempts: u32 = lookup("PLATEWISE_PLAN_MAX_ATTEMPTS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.plan_retry.max_attempts);
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PLATEWISE_PLAN_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let plan_timeout = lookup("PLATEWISE_PLAN_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.plan_timeout);

        let calculating_duration = lookup("PLATEWISE_CALCULATING_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.calculating_duration);

        Ok(Self {
            db_path,
            port,
            openai_api_key,
            openai_base_url,
            model,
            plan_retry: RetryPolicy {
                delay: Duration::from_millis(delay_ms),
                max_attempts,
            },
            plan_timeout,
            calculating_duration,
        })
    }
}
