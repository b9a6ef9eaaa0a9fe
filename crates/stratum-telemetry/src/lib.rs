//! Observability for Stratum services.
//!
//! - **Logging**: two structured sinks, one for the service log and one for
//!   the access log, split by `tracing` target
//! - **Tracing**: a small span API with pluggable, named tracer kinds
//! - **Metrics**: Prometheus-format request metrics via the `metrics` crate
//!
//! # Architecture
//!
//! ```text
//!  ┌────────────────────────────────────────────────┐
//!  │               stratum-telemetry                │
//!  │                                                │
//!  │  ┌───────────┐  ┌────────────┐  ┌───────────┐  │
//!  │  │  logging  │  │   tracer   │  │  metrics  │  │
//!  │  │svc│access │  │ noop / log │  │(Prometheus)│ │
//!  │  └─────┬─────┘  └─────┬──────┘  └─────┬─────┘  │
//!  └────────┼──────────────┼───────────────┼────────┘
//!           ▼              ▼               ▼
//!     stdout / files  stratum::trace   GET /metrics
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use stratum_telemetry::{init_logging, LogConfig, TracerRegistry};
//!
//! init_logging(&LogConfig::default())?;
//! let tracer = TracerRegistry::with_defaults().build("log", &serde_json::Value::Null)?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;
pub mod metrics;
pub mod tracer;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat, ACCESS_TARGET, SERVICE_TARGET, TRACE_TARGET};
pub use metrics::{install_prometheus, record_request, render_metrics};
pub use tracer::{
    noop_tracer, LogTracer, NoopTracer, Span, SpanContext, TagValue, Tracer, TracerKind,
    TracerRegistry,
};

/// Re-exported so callers can hold the handle without a direct dependency.
pub use metrics_exporter_prometheus::PrometheusHandle;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
