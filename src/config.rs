//! Engine configuration.
//!
//! Built in code through [`EngineConfig::builder`] or loaded from
//! `SHOPLANE_`-prefixed environment variables via
//! [`ConfigBuilder::from_env`].

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::validation::validate_plan_code;

const ENV_PREFIX: &str = "SHOPLANE_";
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Plan code users without a subscription row are evaluated against.
    /// Falls back to the lowest catalog tier if the code is unknown.
    pub fallback_plan_code: String,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fallback_plan_code: "starter".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Logging configuration consumed by [`init_tracing`](crate::init_tracing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    fallback_plan_code: Option<String>,
    log_level: Option<String>,
    log_json: Option<bool>,
}

impl ConfigBuilder {
    /// Load settings from `SHOPLANE_`-prefixed environment variables:
    /// `SHOPLANE_FALLBACK_PLAN`, `SHOPLANE_LOG_LEVEL`, `SHOPLANE_LOG_JSON`.
    /// Explicit setters take precedence over the environment.
    pub fn from_env(mut self) -> Self {
        if self.fallback_plan_code.is_none() {
            self.fallback_plan_code = env_var("FALLBACK_PLAN");
        }
        if self.log_level.is_none() {
            self.log_level = env_var("LOG_LEVEL");
        }
        if self.log_json.is_none() {
            self.log_json = env_var("LOG_JSON").map(|v| matches!(v.as_str(), "1" | "true" | "yes"));
        }
        self
    }

    pub fn with_fallback_plan_code(mut self, code: impl Into<String>) -> Self {
        self.fallback_plan_code = Some(code.into());
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    pub fn with_json_logging(mut self, json: bool) -> Self {
        self.log_json = Some(json);
        self
    }

    /// Validate and assemble the configuration.
    pub fn build(self) -> Result<EngineConfig> {
        let defaults = EngineConfig::default();

        let fallback_plan_code = self
            .fallback_plan_code
            .unwrap_or(defaults.fallback_plan_code);
        validate_plan_code(&fallback_plan_code)?;

        let level = self.log_level.unwrap_or(defaults.logging.level);
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(BillingError::invalid_argument(format!(
                "unknown log level: {level}"
            )));
        }

        Ok(EngineConfig {
            fallback_plan_code,
            logging: LoggingConfig {
                level,
                json: self.log_json.unwrap_or(defaults.logging.json),
            },
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{name}"))
        .ok()
        .filter(|v| !v.is_empty())
}
