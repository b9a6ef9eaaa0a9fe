//! Top-level service configuration.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, CorsConfig, DebugConfig, LogConfig, MetricsConfig, TraceConfig, VersionConfig};

/// Default path of the metrics exposition route.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Methods allowed by CORS when none are configured.
pub const DEFAULT_CORS_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE"];

/// Complete Stratum service configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment; the loader normalizes and validates before returning.
///
/// # Example
///
/// ```
/// use stratum_config::ServiceConfig;
///
/// let config = ServiceConfig::default();
/// assert_eq!(config.addr, "0.0.0.0:8080");
/// assert_eq!((config.version.min, config.version.max), (1, 1));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Listen address.
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Path prefix applied to every route.
    #[serde(default)]
    pub prefix: String,

    /// CORS policy.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Debugging aids.
    #[serde(default)]
    pub debug: DebugConfig,

    /// Log sinks.
    #[serde(default)]
    pub log: LogConfig,

    /// Prometheus exposition.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Request tracing.
    #[serde(default)]
    pub trace: TraceConfig,

    /// Supported API versions.
    #[serde(default)]
    pub version: VersionConfig,

    /// Connection drain timeout on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            prefix: String::new(),
            cors: CorsConfig::default(),
            debug: DebugConfig::default(),
            log: LogConfig::default(),
            metrics: MetricsConfig::default(),
            trace: TraceConfig::default(),
            version: VersionConfig::default(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl ServiceConfig {
    /// Creates a configuration supporting API versions `min..=max`.
    #[must_use]
    pub fn with_versions(min: u32, max: u32) -> Self {
        Self {
            version: VersionConfig { min, max },
            ..Self::default()
        }
    }

    /// Development preset: pretty debug logs and panic stacks in responses.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.log.service_level = "debug".to_string();
        config.log.format = crate::LogFormat::Pretty;
        config.debug.stacks = true;
        config
    }

    /// Production preset: JSON logs and metrics enabled.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.log.format = crate::LogFormat::Json;
        config.metrics.enabled = true;
        config
    }

    /// Fills derived defaults.
    ///
    /// - empty CORS methods become GET, POST, PUT, DELETE
    /// - empty metrics path becomes `/metrics`
    /// - trailing slashes are trimmed from the prefix
    pub fn normalize(&mut self) {
        if self.cors.allowed_methods.is_empty() {
            self.cors.allowed_methods = DEFAULT_CORS_METHODS.iter().map(ToString::to_string).collect();
        }
        if self.metrics.uri_path.is_empty() {
            self.metrics.uri_path = DEFAULT_METRICS_PATH.to_string();
        }
        let trimmed = self.prefix.trim_end_matches('/').len();
        self.prefix.truncate(trimmed);
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::VersionRange` if `version.min` is greater than
    /// `version.max`, and `ConfigError::InvalidValue` if:
    /// - `version.min` or `version.max` is below 1
    /// - `addr` is not a socket address
    /// - `metrics.uri_path` does not start with `/`
    /// - tracing is enabled without a tracer name
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.min < 1 {
            return Err(ConfigError::invalid_value("version.min", "must be at least 1"));
        }
        if self.version.max < 1 {
            return Err(ConfigError::invalid_value("version.max", "must be at least 1"));
        }
        if self.version.min > self.version.max {
            return Err(ConfigError::VersionRange {
                min: self.version.min,
                max: self.version.max,
            });
        }

        if self.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "addr",
                format!("invalid socket address: {}", self.addr),
            ));
        }

        if !self.metrics.uri_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "metrics.uri_path",
                format!("must start with '/': {}", self.metrics.uri_path),
            ));
        }

        if self.trace.enabled && self.trace.tracer.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "trace.tracer",
                "required when tracing is enabled",
            ));
        }

        Ok(())
    }

    /// Normalizes, then validates.
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn finalize(mut self) -> Result<Self, ConfigError> {
        self.normalize();
        self.validate()?;
        Ok(self)
    }
}
