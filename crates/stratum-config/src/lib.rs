//! Typed configuration for Stratum services.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict parsing (unknown fields are errors)
//! - Layered loading (defaults → file → env), then normalization and
//!   validation
//!
//! # Configuration File Format
//!
//! ```toml
//! addr = "0.0.0.0:8080"
//! prefix = "/api"
//! shutdown_timeout_secs = 30
//!
//! [version]
//! min = 1
//! max = 3
//!
//! [cors]
//! enabled = true
//! allowed_origins = ["https://app.example.com"]
//!
//! [debug]
//! stacks = false
//!
//! [log]
//! service_level = "info"
//! access_path = "/var/log/users/access.log"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! uri_path = "/metrics"
//!
//! [trace]
//! enabled = true
//! tracer = "log"
//! params = { service = "users" }
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY` variables, e.g.
//! `STRATUM__VERSION__MAX=4` or `STRATUM__TRACE__ENABLED=true`.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{ServiceConfig, DEFAULT_CORS_METHODS, DEFAULT_METRICS_PATH};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{CorsConfig, DebugConfig, LogConfig, LogFormat, MetricsConfig, TraceConfig, VersionConfig};
