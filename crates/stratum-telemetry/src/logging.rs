//! Structured logging with separate service and access sinks.
//!
//! Stratum writes two independent log streams:
//!
//! - the **service** log ([`SERVICE_TARGET`]) for diagnostics, filtered by a
//!   configurable level,
//! - the **access** log ([`ACCESS_TARGET`]), one entry per request, always
//!   at info level or above.
//!
//! Both are plain `tracing` events distinguished by target, so any code can
//! log to either sink with the usual macros:
//!
//! ```rust,ignore
//! use stratum_telemetry::logging::{LogConfig, init_logging, SERVICE_TARGET};
//!
//! init_logging(&LogConfig::default())?;
//! tracing::warn!(target: SERVICE_TARGET, tracer = "zipkin", "tracing is not active");
//! ```

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Target of service (default) log events.
pub const SERVICE_TARGET: &str = "stratum::service";

/// Target of access log events.
pub const ACCESS_TARGET: &str = "stratum::access";

/// Target of finished spans recorded by the `log` tracer.
pub const TRACE_TARGET: &str = "stratum::trace";

/// Output format for both sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level (or `EnvFilter` directives) for the service log.
    pub service_level: String,

    /// Service log file; stdout when `None`.
    pub service_path: Option<PathBuf>,

    /// Access log file; stdout when `None`.
    pub access_path: Option<PathBuf>,

    /// Output format.
    pub format: LogFormat,

    /// Whether to include the event target.
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_level: "info".to_string(),
            service_path: None,
            access_path: None,
            format: LogFormat::Json,
            include_target: true,
        }
    }
}

impl LogConfig {
    /// Creates a development configuration with human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            service_level: "debug".to_string(),
            format: LogFormat::Pretty,
            ..Self::default()
        }
    }

    /// Filter for the service sink: the configured level, minus access events.
    pub fn service_filter(&self) -> TelemetryResult<EnvFilter> {
        create_env_filter(&format!("{},{ACCESS_TARGET}=off", self.service_level))
    }

    /// Filter for the access sink: access events only.
    pub fn access_filter(&self) -> TelemetryResult<EnvFilter> {
        create_env_filter(&format!("off,{ACCESS_TARGET}=info"))
    }
}

/// Installs the global subscriber with the service and access sinks.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if a filter is invalid or a global
/// subscriber is already installed, and `TelemetryError::Io` if a log file
/// cannot be opened.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    let layers = vec![
        sink_layer(
            config,
            make_writer(config.service_path.as_deref())?,
            config.service_filter()?,
        ),
        sink_layer(
            config,
            make_writer(config.access_path.as_deref())?,
            config.access_filter()?,
        ),
    ];

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Creates an env filter from a directive string.
///
/// # Errors
///
/// Returns error if the filter string is invalid.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

fn make_writer(path: Option<&Path>) -> TelemetryResult<BoxMakeWriter> {
    match path {
        None => Ok(BoxMakeWriter::new(std::io::stdout)),
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(BoxMakeWriter::new(Arc::new(file)))
        }
    }
}

fn sink_layer(
    config: &LogConfig,
    writer: BoxMakeWriter,
    filter: EnvFilter,
) -> Box<dyn Layer<Registry> + Send + Sync> {
    match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(config.include_target)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_target(config.include_target)
            .with_filter(filter)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.service_path.is_none());
    }

    #[test]
    fn test_development_config() {
        let config = LogConfig::development();
        assert_eq!(config.service_level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_filters_are_valid() {
        let config = LogConfig::default();
        assert!(config.service_filter().is_ok());
        assert!(config.access_filter().is_ok());
    }

    #[test]
    fn test_invalid_level_rejected() {
        let config = LogConfig {
            service_level: "stratum=[".to_string(),
            ..LogConfig::default()
        };
        assert!(matches!(
            config.service_filter(),
            Err(TelemetryError::LoggingInit(_))
        ));
    }

    #[test]
    fn test_file_writer_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        assert!(make_writer(Some(&path)).is_ok());
        assert!(path.exists());
    }
}
