//! Configuration validation module.
//!
//! Provides validation for all configuration values, failing fast on invalid
//! configuration rather than at first cache use.

use crate::AppConfig;
use std::fmt;
use tessera_core::{TesseraError, TesseraResult};

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// Session cache mode is not one of the supported values.
    InvalidSessionsMode { value: String },
    /// Owner or segment count is not positive.
    NonPositiveCount { name: String, value: i64 },
    /// Container lookup name is present but empty.
    EmptyContainerLookup,
    /// Timeout value must be positive.
    NonPositiveTimeout { name: String, value: i64 },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
    /// Log format is invalid.
    InvalidLogFormat { value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSessionsMode { value } => {
                write!(
                    f,
                    "Invalid value for sessionsMode: '{}' (valid: replicated, distributed)",
                    value
                )
            }
            Self::NonPositiveCount { name, value } => {
                write!(f, "'{}' must be positive, got {}", name, value)
            }
            Self::EmptyContainerLookup => {
                write!(f, "cacheContainer lookup name cannot be empty")
            }
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "Timeout '{}' must be positive, got {}", name, value)
            }
            Self::InvalidLogLevel { value } => {
                write!(
                    f,
                    "Invalid log level: '{}' (valid: trace, debug, info, warn, error)",
                    value
                )
            }
            Self::InvalidLogFormat { value } => {
                write!(f, "Invalid log format: '{}' (valid: pretty, json)", value)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Valid session cache modes.
    const VALID_SESSIONS_MODES: &'static [&'static str] = &["replicated", "distributed"];
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];
    /// Valid log formats.
    const VALID_LOG_FORMATS: &'static [&'static str] = &["pretty", "json"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_cache(&config.cache, &mut errors);
        Self::validate_sessions(&config.sessions, &mut errors);
        Self::validate_observability(&config.observability, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validates and folds every error into one fatal configuration error.
    pub fn ensure_valid(config: &AppConfig) -> TesseraResult<()> {
        Self::validate(config).map_err(|errors| {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            TesseraError::Configuration(message)
        })
    }

    /// Validates cache configuration.
    fn validate_cache(config: &crate::CacheConfig, errors: &mut Vec<ConfigValidationError>) {
        if let Some(lookup) = &config.cache_container {
            if lookup.trim().is_empty() {
                errors.push(ConfigValidationError::EmptyContainerLookup);
            }
        }

        // Session settings only matter once clustered
        if config.clustered {
            let mode = config.sessions_mode.trim().to_ascii_lowercase();
            if !Self::VALID_SESSIONS_MODES.contains(&mode.as_str()) {
                errors.push(ConfigValidationError::InvalidSessionsMode {
                    value: config.sessions_mode.clone(),
                });
            }
            if config.sessions_owners <= 0 {
                errors.push(ConfigValidationError::NonPositiveCount {
                    name: "sessionsOwners".to_string(),
                    value: config.sessions_owners,
                });
            }
            if config.sessions_segments <= 0 {
                errors.push(ConfigValidationError::NonPositiveCount {
                    name: "sessionsSegments".to_string(),
                    value: config.sessions_segments,
                });
            }
        }
    }

    /// Validates session store configuration.
    fn validate_sessions(config: &crate::SessionsConfig, errors: &mut Vec<ConfigValidationError>) {
        if config.sweep_interval_secs == 0 {
            errors.push(ConfigValidationError::NonPositiveTimeout {
                name: "sessions.sweep_interval_secs".to_string(),
                value: 0,
            });
        }

        let timeouts = [
            ("sessions.sso_session_idle_timeout_secs", config.sso_session_idle_timeout_secs),
            ("sessions.sso_session_max_lifespan_secs", config.sso_session_max_lifespan_secs),
            (
                "sessions.offline_session_idle_timeout_secs",
                config.offline_session_idle_timeout_secs,
            ),
        ];
        for (name, value) in timeouts {
            if value <= 0 {
                errors.push(ConfigValidationError::NonPositiveTimeout {
                    name: name.to_string(),
                    value,
                });
            }
        }
    }

    /// Validates observability configuration.
    fn validate_observability(
        config: &crate::ObservabilityConfig,
        errors: &mut Vec<ConfigValidationError>,
    ) {
        let level = config.log_level.to_lowercase();
        if !Self::VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }

        let format = config.log_format.to_lowercase();
        if !Self::VALID_LOG_FORMATS.contains(&format.as_str()) {
            errors.push(ConfigValidationError::InvalidLogFormat {
                value: config.log_format.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_sessions_mode_is_case_insensitive() {
        let mut config = AppConfig::default();
        config.cache.clustered = true;
        config.cache.sessions_mode = "REPLICATED".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_sessions_mode() {
        let mut config = AppConfig::default();
        config.cache.sessions_mode = "scattered".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());

        config.cache.clustered = true;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigValidationError::InvalidSessionsMode {
                value: "scattered".to_string()
            }]
        );
    }

    #[test]
    fn test_non_positive_owners_only_checked_when_clustered() {
        let mut config = AppConfig::default();
        config.cache.sessions_owners = 0;
        assert!(ConfigValidator::validate(&config).is_ok());

        config.cache = CacheConfig {
            clustered: true,
            sessions_owners: 0,
            sessions_segments: -1,
            ..CacheConfig::default()
        };
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_empty_container_lookup() {
        let mut config = AppConfig::default();
        config.cache.cache_container = Some("  ".to_string());
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors.contains(&ConfigValidationError::EmptyContainerLookup));
    }

    #[test]
    fn test_invalid_observability() {
        let mut config = AppConfig::default();
        config.observability.log_level = "verbose".to_string();
        config.observability.log_format = "xml".to_string();
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_ensure_valid_joins_errors() {
        let mut config = AppConfig::default();
        config.sessions.sweep_interval_secs = 0;
        config.observability.log_format = "xml".to_string();

        let err = ConfigValidator::ensure_valid(&config).unwrap_err();
        assert!(err.is_fatal());
        let message = err.to_string();
        assert!(message.contains("sweep_interval_secs"));
        assert!(message.contains("xml"));
        assert!(ConfigValidator::ensure_valid(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_sweep_interval() {
        let mut config = AppConfig::default();
        config.sessions.sweep_interval_secs = 0;
        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors[0].to_string().contains("sweep_interval_secs"));
    }
}
