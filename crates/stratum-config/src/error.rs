//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a [`ServiceConfig`](crate::ServiceConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {path}")]
    Missing {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The configuration file exists but cannot be read.
    #[error("cannot read configuration file {path}")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or schema error.
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or schema error.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A field holds a value the service cannot use.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path, e.g. `metrics.uri_path`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The supported API version range is empty.
    #[error("version.min {min} is greater than version.max {max}")]
    VersionRange {
        /// Configured minimum.
        min: u32,
        /// Configured maximum.
        max: u32,
    },

    /// A `STRATUM__*` override could not be applied.
    #[error("cannot apply environment override {var}: {reason}")]
    Env {
        /// Variable name.
        var: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Neither TOML nor JSON.
    #[error("unsupported configuration format: {0}")]
    UnsupportedFormat(String),
}

impl ConfigError {
    /// Builds an [`InvalidValue`](Self::InvalidValue) error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Env {
            var: var.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_message() {
        let err = ConfigError::Missing {
            path: PathBuf::from("/etc/stratum.toml"),
        };
        assert_eq!(err.to_string(), "configuration file not found: /etc/stratum.toml");
    }

    #[test]
    fn test_invalid_value_message() {
        let err = ConfigError::invalid_value("version.min", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration value for version.min: must be at least 1"
        );
    }

    #[test]
    fn test_version_range_message() {
        let err = ConfigError::VersionRange { min: 4, max: 2 };
        assert_eq!(err.to_string(), "version.min 4 is greater than version.max 2");
    }

    #[test]
    fn test_env_message() {
        let err = ConfigError::env("STRATUM__VERSION__MAX", "expected integer");
        assert!(err.to_string().contains("STRATUM__VERSION__MAX"));
    }
}
