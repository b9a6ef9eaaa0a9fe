//! Pluggable request tracing.
//!
//! A [`Tracer`] starts one [`Span`] per request. Spans carry tags and are
//! finished explicitly once the response is complete. Tracer
//! implementations are registered by name in a [`TracerRegistry`] and
//! built from configuration at service start-up.
//!
//! Two kinds are always available:
//!
//! | Name   | Behavior                                                   |
//! |--------|------------------------------------------------------------|
//! | `noop` | Generates ids, drops everything else                       |
//! | `log`  | Emits every finished span as an event on [`TRACE_TARGET`]  |
//!
//! Incoming trace context is read from the W3C `traceparent` header.
//!
//! # Example
//!
//! ```rust
//! use stratum_telemetry::tracer::{TracerRegistry, TagValue};
//!
//! let registry = TracerRegistry::with_defaults();
//! let tracer = registry.build("log", &serde_json::json!({"service": "users"})).unwrap();
//!
//! let mut span = tracer.start_span("GET /users", None);
//! span.set_tag("http.status_code", TagValue::from(200u16));
//! span.finish();
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use http::HeaderMap;
use serde_json::Value;

use crate::error::TelemetryError;
use crate::logging::TRACE_TARGET;
use crate::TelemetryResult;

/// The W3C Trace Context header.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Identifiers of a span within a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    /// Trace id (low 64 bits of the W3C trace id).
    pub trace_id: u64,
    /// Span id.
    pub span_id: u64,
    /// Whether the upstream sampled the trace.
    pub sampled: bool,
}

impl SpanContext {
    /// Creates a root context with fresh ids.
    #[must_use]
    pub fn new_root() -> Self {
        Self {
            trace_id: random_id(),
            span_id: random_id(),
            sampled: true,
        }
    }

    /// Creates a child context in the same trace.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: random_id(),
            sampled: self.sampled,
        }
    }

    /// Parses a `traceparent` header value.
    ///
    /// Format: `{version}-{trace-id}-{parent-span-id}-{flags}`
    #[must_use]
    pub fn parse_traceparent(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.trim().split('-').collect();
        if parts.len() != 4 || parts[0] != "00" {
            return None;
        }

        let (trace_id, span_id, flags) = (parts[1], parts[2], parts[3]);
        if trace_id.len() != 32 || span_id.len() != 16 || flags.len() != 2 {
            return None;
        }

        let trace_id = u64::from_str_radix(&trace_id[16..], 16).ok()?;
        let span_id = u64::from_str_radix(span_id, 16).ok()?;
        let flags = u8::from_str_radix(flags, 16).ok()?;

        // All-zero ids are invalid per W3C
        if trace_id == 0 || span_id == 0 {
            return None;
        }

        Some(Self {
            trace_id,
            span_id,
            sampled: flags & 0x01 != 0,
        })
    }

    /// Formats the context as a `traceparent` header value.
    #[must_use]
    pub fn to_traceparent(&self) -> String {
        format!(
            "00-{:032x}-{:016x}-{:02x}",
            self.trace_id,
            self.span_id,
            u8::from(self.sampled)
        )
    }
}

/// Value of a span tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    /// String value.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Boolean.
    Bool(bool),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<u16> for TagValue {
    fn from(value: u16) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u32> for TagValue {
    fn from(value: u32) -> Self {
        Self::UInt(u64::from(value))
    }
}

impl From<u64> for TagValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&TagValue> for Value {
    fn from(value: &TagValue) -> Self {
        match value {
            TagValue::Str(s) => Value::from(s.as_str()),
            TagValue::Int(i) => Value::from(*i),
            TagValue::UInt(u) => Value::from(*u),
            TagValue::Bool(b) => Value::from(*b),
        }
    }
}

/// A single traced operation.
pub trait Span: Send {
    /// Returns the span's identifiers.
    fn context(&self) -> SpanContext;

    /// Sets a tag, replacing any previous value for `key`.
    fn set_tag(&mut self, key: &'static str, value: TagValue);

    /// Completes the span.
    fn finish(self: Box<Self>);
}

/// Starts spans and reads incoming trace context.
pub trait Tracer: Send + Sync + fmt::Debug {
    /// Starts a span, as a child of `parent` when given.
    fn start_span(&self, operation: &str, parent: Option<SpanContext>) -> Box<dyn Span>;

    /// Extracts the upstream span context from request headers.
    fn extract(&self, headers: &HeaderMap) -> Option<SpanContext> {
        headers
            .get(TRACEPARENT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(SpanContext::parse_traceparent)
    }

    /// Returns true if spans from this tracer are discarded.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Builds a tracer from its configuration parameters.
pub trait TracerKind: Send + Sync {
    /// Builds a tracer.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::InvalidTracerParams` if `params` are unusable.
    fn build(&self, params: &Value) -> TelemetryResult<Arc<dyn Tracer>>;
}

impl<F> TracerKind for F
where
    F: Fn(&Value) -> TelemetryResult<Arc<dyn Tracer>> + Send + Sync,
{
    fn build(&self, params: &Value) -> TelemetryResult<Arc<dyn Tracer>> {
        self(params)
    }
}

/// Named tracer kinds.
pub struct TracerRegistry {
    kinds: HashMap<String, Box<dyn TracerKind>>,
}

impl fmt::Debug for TracerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracerRegistry")
            .field("kinds", &self.names())
            .finish()
    }
}

impl Default for TracerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TracerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Creates a registry with the `noop` and `log` kinds.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("noop", |_: &Value| -> TelemetryResult<Arc<dyn Tracer>> {
            Ok(noop_tracer())
        });
        registry.register("log", |params: &Value| -> TelemetryResult<Arc<dyn Tracer>> {
            Ok(Arc::new(LogTracer::from_params(params)?))
        });
        registry
    }

    /// Registers a tracer kind.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or already registered.
    pub fn register(&mut self, name: &str, kind: impl TracerKind + 'static) {
        assert!(!name.is_empty(), "empty tracer kind name");
        assert!(
            !self.kinds.contains_key(name),
            "{name} tracer kind registered twice"
        );
        self.kinds.insert(name.to_string(), Box::new(kind));
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Returns the registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Builds the tracer registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::UnknownTracer` if nothing is registered under
    /// `name`, or the kind's own error if it rejects `params`.
    pub fn build(&self, name: &str, params: &Value) -> TelemetryResult<Arc<dyn Tracer>> {
        self.kinds
            .get(name)
            .ok_or_else(|| TelemetryError::UnknownTracer(name.to_string()))?
            .build(params)
    }
}

/// Returns a tracer that discards spans.
#[must_use]
pub fn noop_tracer() -> Arc<dyn Tracer> {
    Arc::new(NoopTracer)
}

/// Tracer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(&self, _operation: &str, parent: Option<SpanContext>) -> Box<dyn Span> {
        let context = parent.map_or_else(SpanContext::new_root, |p| p.child());
        Box::new(NoopSpan { context })
    }

    fn is_noop(&self) -> bool {
        true
    }
}

struct NoopSpan {
    context: SpanContext,
}

impl Span for NoopSpan {
    fn context(&self) -> SpanContext {
        self.context
    }

    fn set_tag(&mut self, _key: &'static str, _value: TagValue) {}

    fn finish(self: Box<Self>) {}
}

/// Tracer that logs finished spans.
#[derive(Debug, Clone)]
pub struct LogTracer {
    service: String,
}

impl LogTracer {
    /// Creates a log tracer for `service`.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    /// Builds a log tracer from `{"service": "..."}`.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::InvalidTracerParams` if `params` is neither
    /// null nor an object, or if `service` is not a string.
    pub fn from_params(params: &Value) -> TelemetryResult<Self> {
        match params {
            Value::Null => Ok(Self::new("stratum")),
            Value::Object(map) => match map.get("service") {
                None => Ok(Self::new("stratum")),
                Some(Value::String(s)) => Ok(Self::new(s.clone())),
                Some(other) => Err(TelemetryError::InvalidTracerParams(format!(
                    "service must be a string, got {other}"
                ))),
            },
            other => Err(TelemetryError::InvalidTracerParams(format!(
                "expected an object, got {other}"
            ))),
        }
    }

    /// Returns the service name attached to spans.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Tracer for LogTracer {
    fn start_span(&self, operation: &str, parent: Option<SpanContext>) -> Box<dyn Span> {
        let context = parent.map_or_else(SpanContext::new_root, |p| p.child());
        Box::new(LogSpan {
            service: self.service.clone(),
            operation: operation.to_string(),
            parent_span_id: parent.map(|p| p.span_id),
            context,
            started: Instant::now(),
            tags: Vec::new(),
        })
    }
}

struct LogSpan {
    service: String,
    operation: String,
    parent_span_id: Option<u64>,
    context: SpanContext,
    started: Instant,
    tags: Vec<(&'static str, TagValue)>,
}

impl Span for LogSpan {
    fn context(&self) -> SpanContext {
        self.context
    }

    fn set_tag(&mut self, key: &'static str, value: TagValue) {
        match self.tags.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.tags.push((key, value)),
        }
    }

    fn finish(self: Box<Self>) {
        let tags: serde_json::Map<String, Value> = self
            .tags
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(v)))
            .collect();

        tracing::info!(
            target: TRACE_TARGET,
            service = %self.service,
            operation = %self.operation,
            trace_id = %format!("{:016x}", self.context.trace_id),
            span_id = %format!("{:016x}", self.context.span_id),
            parent_span_id = ?self.parent_span_id.map(|id| format!("{id:016x}")),
            duration = self.started.elapsed().as_secs_f64(),
            tags = %serde_json::Value::Object(tags),
            "span finished"
        );
    }
}

fn random_id() -> u64 {
    let id = uuid::Uuid::now_v7().as_u64_pair().1;
    if id == 0 {
        1
    } else {
        id
    }
}
