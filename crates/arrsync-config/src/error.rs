//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Variable contained a value that could not be used.
    #[error("invalid configuration value")]
    InvalidField {
        /// Environment variable name.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Variable required by another setting was empty or unset.
    #[error("missing configuration value")]
    MissingField {
        /// Environment variable name.
        field: &'static str,
        /// Setting that requires it.
        required_by: &'static str,
    },
    /// Variable did not parse as a URL.
    #[error("invalid URL")]
    InvalidUrl {
        /// Environment variable name.
        field: &'static str,
        /// Offending value.
        value: String,
        /// Parser error.
        source: url::ParseError,
    },
    /// Dotenv file existed but could not be read.
    #[error("failed to load environment file")]
    EnvFile {
        /// File that failed to load.
        path: PathBuf,
        /// Loader error.
        source: dotenvy::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, value: &str, reason: &'static str) -> Self {
        Self::InvalidField {
            field,
            value: Some(value.to_string()),
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn messages_are_constant_and_sources_preserved() {
        let err = ConfigError::invalid("SEEDBOX_PORT", "abc", "not a port");
        assert_eq!(err.to_string(), "invalid configuration value");
        assert!(err.source().is_none());

        let parse = url::Url::parse("nope").unwrap_err();
        let err = ConfigError::InvalidUrl {
            field: "WEBHOOK_URL",
            value: "nope".to_string(),
            source: parse,
        };
        assert_eq!(err.to_string(), "invalid URL");
        assert!(err.source().is_some());
    }
}
