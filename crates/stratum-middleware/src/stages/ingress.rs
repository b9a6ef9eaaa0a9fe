//! The ingress handler: root of every request.
//!
//! Ingress is not a [`Middleware`](crate::Middleware); it owns the raw
//! response sink and wraps the rest of the chain:
//!
//! 1. CORS (preflight requests end here with 204)
//! 2. trace span and request id (`X-Request-Id`)
//! 3. pooled response wrapper and request state
//! 4. the chain, under panic capture
//! 5. cleanup: panic recovery, access log, metrics, span tags, pool release
//!
//! A panic in the chain never escapes [`Ingress::serve`].

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use stratum_config::ServiceConfig;
use stratum_core::pool::DEFAULT_POOL_CAPACITY;
use stratum_core::{codes, headers, media, Pool};
use stratum_telemetry::{record_request, Span, TagValue, ACCESS_TARGET, SERVICE_TARGET};

use crate::codec::write_response;
use crate::context::{Exchange, RequestState, ServiceHandle};
use crate::middleware::Next;
use crate::panic::{self, Cancelled, Capturing};
use crate::response::{ResponseSink, ResponseWriter};
use crate::stages::cors::CorsPolicy;
use crate::types::Request;

/// Status recorded when the client went away.
pub const CANCELLED_STATUS: u16 = 418;

/// Message of the error written for a recovered panic.
const PANIC_MESSAGE: &str = "request handler panicked";

macro_rules! access_log {
    ($level:ident, $ex:expr, $status:expr, $latency:expr) => {{
        let ex: &Exchange = $ex;
        let request = ex.request();
        let caller_id = ex.state().caller_id();
        let latency = format!("{:.6}", $latency.as_secs_f64());
        tracing::$level!(
            target: ACCESS_TARGET,
            client_addr = %ex.remote_addr().map_or_else(|| "-".to_string(), |a| a.to_string()),
            forwarded_for = ex.header(headers::FORWARDED_FOR).unwrap_or_default(),
            proto = ?request.version(),
            method = %request.method(),
            uri = %request.uri(),
            status = $status,
            size = ex.response().size(),
            user_agent = ex.header(headers::USER_AGENT).unwrap_or_default(),
            request_id = ex.state().request_id(),
            api_version = ex.state().api_version(),
            latency = %latency,
            session_id = ex.session_id(),
            caller_id = (!caller_id.is_empty()).then_some(caller_id),
        )
    }};
}

struct Recovered {
    message: String,
    stack: String,
}

/// Outermost request handler.
pub struct Ingress {
    cors: Option<CorsPolicy>,
    debug_stacks: bool,
    stack_size: usize,
    writers: Arc<Pool<ResponseWriter>>,
    states: Arc<Pool<RequestState>>,
}

impl std::fmt::Debug for Ingress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingress")
            .field("cors", &self.cors.is_some())
            .field("debug_stacks", &self.debug_stacks)
            .field("idle_writers", &self.writers.idle())
            .field("idle_states", &self.states.idle())
            .finish()
    }
}

impl Ingress {
    /// Creates the ingress handler for a service configuration.
    ///
    /// Installs the process-wide panic hook on first use.
    #[must_use]
    pub fn new(config: &ServiceConfig) -> Self {
        panic::install_hook();
        Self {
            cors: CorsPolicy::from_config(&config.cors),
            debug_stacks: config.debug.stacks,
            stack_size: config.debug.stack_size,
            writers: Arc::new(Pool::new(DEFAULT_POOL_CAPACITY)),
            states: Arc::new(Pool::new(DEFAULT_POOL_CAPACITY)),
        }
    }

    /// Replaces the CORS policy.
    #[must_use]
    pub fn with_cors(mut self, cors: Option<CorsPolicy>) -> Self {
        self.cors = cors;
        self
    }

    /// Serves one request through `next`, returning the sink to send.
    pub async fn serve(
        &self,
        service: &ServiceHandle,
        request: Request,
        remote_addr: Option<SocketAddr>,
        mut sink: Box<dyn ResponseSink>,
        next: Next<'_>,
    ) -> Box<dyn ResponseSink> {
        let start = Instant::now();

        if let Some(cors) = &self.cors {
            if cors.apply(request.method(), request.headers(), sink.headers_mut()) {
                sink.write_head(StatusCode::NO_CONTENT);
                return sink;
            }
        }

        let tracer = service.tracer();
        let parent = tracer.extract(request.headers());
        let operation = format!("{} {}", request.method(), request.uri().path());
        let mut span = tracer.start_span(&operation, parent);
        let request_id = span.context().trace_id.to_string();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            sink.headers_mut().insert(headers::REQUEST_ID, value);
        }

        let mut writer = self.writers.acquire();
        writer.attach(sink);
        let mut state = self.states.acquire();
        state.init(&request_id);

        let mut ex = Exchange::new(service.clone(), request, remote_addr, writer, state);

        let outcome = AssertUnwindSafe(Capturing::new(Box::pin(next.run(&mut ex))))
            .catch_unwind()
            .await;
        let recovered = match outcome {
            Ok(()) => None,
            Err(payload) => self.recover(&mut ex, payload.as_ref()),
        };

        let latency = start.elapsed();
        let status = ex.response().effective_status();
        Self::log_access(&ex, status, latency);
        record_request(ex.request().method().as_str(), status, latency);

        if !tracer.is_noop() {
            Self::tag_span(span.as_mut(), &ex, status, recovered.as_ref());
        }
        span.finish();

        ex.into_sink()
    }

    fn recover(&self, ex: &mut Exchange, payload: &(dyn Any + Send)) -> Option<Recovered> {
        if payload.is::<Cancelled>() {
            tracing::debug!(
                target: SERVICE_TARGET,
                request_id = ex.state().request_id(),
                "client disconnected"
            );
            ex.response_mut().mark_status(CANCELLED_STATUS);
            return None;
        }

        let message = panic::payload_message(payload);
        let stack = panic::take_stack().unwrap_or_default();
        tracing::error!(
            target: SERVICE_TARGET,
            request_id = ex.state().request_id(),
            panic = %message,
            stack = %stack,
            "request handler panicked"
        );

        if !ex.response().is_written() {
            let mut err = ex.error(codes::INTERNAL, &[&PANIC_MESSAGE]);
            if self.debug_stacks {
                err = err.with_stack(panic::truncate_stack(stack.clone(), self.stack_size));
            }
            ex.response_mut()
                .headers_mut()
                .entry(CONTENT_TYPE)
                .or_insert(HeaderValue::from_static(media::JSON));
            write_response(ex, 500, err.into());
        }

        Some(Recovered { message, stack })
    }

    fn log_access(ex: &Exchange, status: u16, latency: Duration) {
        if ex.state().skip_info_log() && status < 400 {
            return;
        }
        if status >= 500 {
            access_log!(error, ex, status, latency);
        } else {
            access_log!(info, ex, status, latency);
        }
    }

    fn tag_span(span: &mut dyn Span, ex: &Exchange, status: u16, recovered: Option<&Recovered>) {
        let state = ex.state();
        span.set_tag("progress", state.progress().into());
        span.set_tag("http.method", ex.request().method().as_str().into());
        span.set_tag("http.url", ex.request().uri().to_string().into());
        span.set_tag("http.status_code", status.into());
        span.set_tag("http.response_size", ex.response().size().into());
        span.set_tag("http.request_id", state.request_id().into());
        span.set_tag("api_version", state.api_version().into());
        span.set_tag("session_id", ex.session_id().unwrap_or_default().into());
        span.set_tag("caller_id", state.caller_id().into());
        if let Some(recovered) = recovered {
            span.set_tag("panic", TagValue::from(recovered.message.as_str()));
            span.set_tag("stack", TagValue::from(recovered.stack.as_str()));
        }
    }
}
