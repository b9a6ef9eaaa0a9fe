//! Service errors.

use std::net::SocketAddr;

use stratum_config::ConfigError;
use stratum_telemetry::TelemetryError;
use thiserror::Error;

/// Errors raised while assembling or running a service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging, metrics or tracer setup failed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// A router was requested for an unsupported API version.
    #[error("API version {version} is outside the supported range {min}..={max}")]
    VersionOutOfRange {
        /// Requested version.
        version: u32,
        /// Lowest supported version.
        min: u32,
        /// Highest supported version.
        max: u32,
    },

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_out_of_range_display() {
        let err = ServiceError::VersionOutOfRange {
            version: 5,
            min: 1,
            max: 3,
        };
        assert_eq!(
            err.to_string(),
            "API version 5 is outside the supported range 1..=3"
        );
    }

    #[test]
    fn test_config_error_is_transparent() {
        let config = ConfigError::invalid_value("addr", "bad");
        let expected = config.to_string();
        let err: ServiceError = config.into();
        assert_eq!(err.to_string(), expected);
    }
}
