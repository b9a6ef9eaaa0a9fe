//! Configuration schema types.
//!
//! One struct per section of [`ServiceConfig`](crate::ServiceConfig). Every
//! section rejects unknown fields and falls back to defaults for missing ones.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// CORS policy.
///
/// Empty `allowed_methods` is filled with GET, POST, PUT and DELETE by
/// [`ServiceConfig::normalize`](crate::ServiceConfig::normalize).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Enable CORS handling in the ingress handler.
    #[serde(default)]
    pub enabled: bool,

    /// Allowed origins; `*` allows any.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Allowed methods.
    #[serde(default)]
    pub allowed_methods: Vec<String>,

    /// Allowed request headers.
    #[serde(default)]
    pub allowed_headers: Vec<String>,

    /// Response headers exposed to the client.
    #[serde(default)]
    pub exposed_headers: Vec<String>,

    /// Allow credentials.
    #[serde(default)]
    pub allow_credentials: bool,

    /// Preflight cache duration in seconds.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: default_allowed_origins(),
            allowed_methods: Vec::new(),
            allowed_headers: Vec::new(),
            exposed_headers: Vec::new(),
            allow_credentials: false,
            max_age_secs: None,
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Debugging aids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Attach panic stacks to internal error responses.
    #[serde(default)]
    pub stacks: bool,

    /// Maximum stack size in bytes.
    #[serde(default = "default_stack_size")]
    pub stack_size: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            stacks: false,
            stack_size: default_stack_size(),
        }
    }
}

fn default_stack_size() -> usize {
    8 * 1024
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Human-readable.
    Pretty,
}

/// Service and access log sinks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Service log level or filter directives.
    #[serde(default = "default_service_level")]
    pub service_level: String,

    /// Service log file; stdout when unset.
    #[serde(default)]
    pub service_path: Option<PathBuf>,

    /// Access log file; stdout when unset.
    #[serde(default)]
    pub access_path: Option<PathBuf>,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_level: default_service_level(),
            service_path: None,
            access_path: None,
            format: LogFormat::Json,
        }
    }
}

impl LogConfig {
    /// Converts to the telemetry crate's logging configuration.
    #[must_use]
    pub fn to_telemetry(&self) -> stratum_telemetry::LogConfig {
        stratum_telemetry::LogConfig {
            service_level: self.service_level.clone(),
            service_path: self.service_path.clone(),
            access_path: self.access_path.clone(),
            format: match self.format {
                LogFormat::Json => stratum_telemetry::LogFormat::Json,
                LogFormat::Pretty => stratum_telemetry::LogFormat::Pretty,
            },
            ..stratum_telemetry::LogConfig::default()
        }
    }
}

fn default_service_level() -> String {
    "info".to_string()
}

/// Prometheus exposition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the recorder and serve the exposition route.
    #[serde(default)]
    pub enabled: bool,

    /// Path of the exposition route on the global router.
    #[serde(default)]
    pub uri_path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri_path: crate::DEFAULT_METRICS_PATH.to_string(),
        }
    }
}

/// Request tracing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TraceConfig {
    /// Build the configured tracer; the noop tracer is used otherwise.
    #[serde(default)]
    pub enabled: bool,

    /// Registered tracer kind name.
    #[serde(default = "default_tracer")]
    pub tracer: String,

    /// Kind-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tracer: default_tracer(),
            params: serde_json::Value::Null,
        }
    }
}

fn default_tracer() -> String {
    "noop".to_string()
}

/// Supported API version range, inclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VersionConfig {
    /// Oldest supported version.
    #[serde(default = "default_version")]
    pub min: u32,

    /// Newest supported version.
    #[serde(default = "default_version")]
    pub max: u32,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            min: default_version(),
            max: default_version(),
        }
    }
}

impl VersionConfig {
    /// Returns true if `version` lies within `[min, max]`.
    #[must_use]
    pub fn contains(&self, version: u32) -> bool {
        (self.min..=self.max).contains(&version)
    }
}

fn default_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_defaults() {
        let cors = CorsConfig::default();
        assert!(!cors.enabled);
        assert_eq!(cors.allowed_origins, vec!["*"]);
        assert!(cors.allowed_methods.is_empty());
    }

    #[test]
    fn test_log_format_serde() {
        let log: LogConfig = toml::from_str(r#"format = "pretty""#).unwrap();
        assert_eq!(log.format, LogFormat::Pretty);
        assert_eq!(log.service_level, "info");
    }

    #[test]
    fn test_log_to_telemetry() {
        let log = LogConfig {
            service_level: "debug".to_string(),
            access_path: Some(PathBuf::from("/var/log/access.log")),
            format: LogFormat::Pretty,
            ..LogConfig::default()
        };
        let telemetry = log.to_telemetry();
        assert_eq!(telemetry.service_level, "debug");
        assert_eq!(telemetry.format, stratum_telemetry::LogFormat::Pretty);
        assert_eq!(telemetry.access_path, Some(PathBuf::from("/var/log/access.log")));
    }

    #[test]
    fn test_trace_params_from_toml() {
        let trace: TraceConfig = toml::from_str(
            r#"
            enabled = true
            tracer = "log"
            params = { service = "users" }
            "#,
        )
        .unwrap();
        assert_eq!(trace.params["service"], "users");
    }

    #[test]
    fn test_version_contains() {
        let version = VersionConfig { min: 2, max: 4 };
        assert!(!version.contains(1));
        assert!(version.contains(2));
        assert!(version.contains(4));
        assert!(!version.contains(5));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<DebugConfig, _> = toml::from_str("stack = true");
        assert!(result.is_err());
    }
}
