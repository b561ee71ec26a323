//! Runtime configuration read from the environment.

use std::env;
use std::time::Duration;

use crate::ai::client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
pub const DEFAULT_DB_URL: &str = "sqlite:mealwise.db?mode=rwc";

/// Default bound on a single model call.
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub ai_base_url: String,
    /// Without a key every AI call takes the fallback path.
    pub ai_api_key: Option<String>,
    pub ai_model: String,
    pub ai_timeout: Duration,
}

impl Config {
    /// Read `MEALWISE_*` variables, falling back to defaults for anything
    /// missing or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("MEALWISE_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let timeout_secs = lookup("MEALWISE_AI_TIMEOUT_SECS")
            .and_then(|t| t.parse().ok())
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_AI_TIMEOUT_SECS);

        Self {
            port,
            database_url: lookup("MEALWISE_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DB_URL.to_string()),
            ai_base_url: lookup("MEALWISE_AI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            ai_api_key: lookup("MEALWISE_AI_API_KEY").filter(|k| !k.trim().is_empty()),
            ai_model: lookup("MEALWISE_AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ai_timeout: Duration::from_secs(timeout_secs),
        }
    }
}
