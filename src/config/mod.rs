//! Configuration module for condgate
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`CONDGATE_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use condgate::config::CondgateConfig;
//!
//! let config = CondgateConfig::default();
//! assert_eq!(config.router.application, "demo");
//!
//! let toml = r#"
//! [router]
//! application = "shop"
//! "#;
//! let config: CondgateConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.router.rule_key(), "shop.condition-router");
//! ```

pub mod error;
pub mod logging;
pub mod router;
pub mod source;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use router::{NotificationsConfig, RouterSettings};
pub use source::{SourceConfig, SourceKind};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the `condgate` binary.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CondgateConfig {
    pub router: RouterSettings,
    pub source: SourceConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

impl CondgateConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                    path: p.to_path_buf(),
                    source,
                })?;
                toml::from_str(&content).map_err(|source| ConfigError::Parse {
                    path: p.to_path_buf(),
                    source,
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply `CONDGATE_*` environment variable overrides.
    /// Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(application) = std::env::var("CONDGATE_APPLICATION") {
            self.router.application = application;
        }

        if let Ok(kind) = std::env::var("CONDGATE_SOURCE") {
            if let Ok(k) = kind.parse() {
                self.source.kind = k;
            }
        }
        if let Ok(dir) = std::env::var("CONDGATE_RULES_DIR") {
            self.source.dir = dir.into();
        }
        if let Ok(interval) = std::env::var("CONDGATE_POLL_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.source.poll_interval_ms = ms;
            }
        }

        if let Ok(level) = std::env::var("CONDGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CONDGATE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let application = self.router.application.trim();
        if application.is_empty() {
            return Err(ConfigError::Validation {
                field: "router.application".to_string(),
                message: "application cannot be empty".to_string(),
            });
        }
        if application.contains(['/', '\\']) {
            return Err(ConfigError::Validation {
                field: "router.application".to_string(),
                message: "application cannot contain path separators".to_string(),
            });
        }

        if self.source.kind == SourceKind::File && self.source.poll_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "source.poll_interval_ms".to_string(),
                message: "poll interval must be non-zero".to_string(),
            });
        }

        if self.notifications.capacity == 0 {
            return Err(ConfigError::Validation {
                field: "notifications.capacity".to_string(),
                message: "capacity must be non-zero".to_string(),
            });
        }

        self.logging.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_condgate_config_defaults() {
        let config = CondgateConfig::default();
        assert_eq!(config.router.application, "demo");
        assert_eq!(config.source.kind, SourceKind::File);
        assert_eq!(config.notifications.capacity, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_minimal_toml() {
        let toml = r#"
        [source]
        dir = "/etc/condgate/rules"
        "#;

        let config: CondgateConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.source.dir, PathBuf::from("/etc/condgate/rules"));
        assert_eq!(config.source.poll_interval_ms, 1000); // Default
    }

    #[test]
    fn test_config_parse_full_toml() {
        let toml = include_str!("../../condgate.example.toml");
        let config: CondgateConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[router]\napplication = \"shop\"").unwrap();

        let config = CondgateConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.router.application, "shop");
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = CondgateConfig::load(Some(Path::new("/nonexistent/condgate.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_invalid_toml_error() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[router\napplication=").unwrap();

        let result = CondgateConfig::load(Some(temp.path()));
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&temp.path().display().to_string()));
    }

    #[test]
    fn test_config_load_none_returns_defaults() {
        let config = CondgateConfig::load(None).unwrap();
        assert_eq!(config.router.application, "demo");
    }

    #[test]
    fn test_config_env_override_application() {
        std::env::set_var("CONDGATE_APPLICATION", "billing");
        let config = CondgateConfig::default().with_env_overrides();
        std::env::remove_var("CONDGATE_APPLICATION");

        assert_eq!(config.router.application, "billing");
    }

    #[test]
    fn test_config_env_override_rules_dir() {
        std::env::set_var("CONDGATE_RULES_DIR", "/srv/rules");
        let config = CondgateConfig::default().with_env_overrides();
        std::env::remove_var("CONDGATE_RULES_DIR");

        assert_eq!(config.source.dir, PathBuf::from("/srv/rules"));
    }

    #[test]
    fn test_config_env_invalid_interval_ignored() {
        std::env::set_var("CONDGATE_POLL_INTERVAL_MS", "soon");
        let config = CondgateConfig::default().with_env_overrides();
        std::env::remove_var("CONDGATE_POLL_INTERVAL_MS");

        assert_eq!(config.source.poll_interval_ms, 1000);
    }

    #[test]
    fn test_config_env_override_log_format() {
        std::env::set_var("CONDGATE_LOG_FORMAT", "json");
        let config = CondgateConfig::default().with_env_overrides();
        assert_eq!(config.logging.format, LogFormat::Json);

        std::env::set_var("CONDGATE_LOG_FORMAT", "xml");
        let config = CondgateConfig::default().with_env_overrides();
        std::env::remove_var("CONDGATE_LOG_FORMAT");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_validation_empty_application() {
        let mut config = CondgateConfig::default();
        config.router.application = "  ".to_string();

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field == "router.application"
        ));
    }

    #[test]
    fn test_config_validation_application_with_separator() {
        let mut config = CondgateConfig::default();
        config.router.application = "../etc".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_poll_interval() {
        let mut config = CondgateConfig::default();
        config.source.poll_interval_ms = 0;

        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { ref field, .. }) if field == "source.poll_interval_ms"
        ));

        config.source.kind = SourceKind::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_checks_logging() {
        let mut config = CondgateConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LogLevel { .. })
        ));

        let mut config = CondgateConfig::default();
        config
            .logging
            .modules
            .insert("gateway".to_string(), "debug".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LogModule { .. })
        ));
    }

    #[test]
    fn test_config_parse_logging_modules() {
        let toml = r#"
        [logging]
        level = "warn"
        [logging.modules]
        listener = "debug"
        "#;
        let config: CondgateConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.directives(), "warn,condgate::listener=debug");
    }

    #[test]
    fn test_config_validation_zero_capacity() {
        let mut config = CondgateConfig::default();
        config.notifications.capacity = 0;
        assert!(config.validate().is_err());
    }
}
