//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize metrics.
    #[error("Failed to initialize metrics: {0}")]
    MetricsInit(String),

    /// Failed to initialize logging.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// No tracer kind is registered under the name.
    #[error("Unknown tracer kind: {0}")]
    UnknownTracer(String),

    /// A tracer kind rejected its parameters.
    #[error("Invalid tracer parameters: {0}")]
    InvalidTracerParams(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
