//! Logging configuration
//!
//! `level` sets the base filter. `[logging.modules]` raises or lowers single
//! `condgate` modules, keyed by module name:
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [logging.modules]
//! listener = "debug"
//! routing = "trace"
//! ```

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Modules that accept their own level.
pub const LOG_MODULES: &[&str] = &[
    "chain",
    "cli",
    "condition",
    "config",
    "listener",
    "routing",
    "rule",
    "source",
];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Per-module levels, e.g. `listener = "debug"`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            modules: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Reject unknown levels and module names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_level("logging.level", &self.level)?;

        for (module, level) in &self.modules {
            if !LOG_MODULES.contains(&module.as_str()) {
                return Err(ConfigError::LogModule {
                    module: module.clone(),
                    known: LOG_MODULES.join(", "),
                });
            }
            check_level(&format!("logging.modules.{}", module), level)?;
        }

        Ok(())
    }

    /// `EnvFilter` directives: the base level, then one `condgate::<module>`
    /// directive per configured module in name order.
    pub fn directives(&self) -> String {
        let mut directives = self.level.to_lowercase();
        for (module, level) in &self.modules {
            directives.push_str(&format!(",condgate::{}={}", module, level.to_lowercase()));
        }
        directives
    }
}

fn check_level(field: &str, level: &str) -> Result<(), ConfigError> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ConfigError::LogLevel {
            field: field.to_string(),
            level: level.to_string(),
        })
    }
}
