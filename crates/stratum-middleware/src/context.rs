//! Per-request context threaded through the chain.
//!
//! Every handler in the chain receives the same [`Exchange`]: the request,
//! the tracking [`ResponseWriter`], the pooled [`RequestState`] and a
//! [`ServiceHandle`] to the owning service. The ingress handler creates the
//! exchange and returns its pooled parts when the request completes, so no
//! handler may keep a reference past its own return.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use stratum_config::ServiceConfig;
use stratum_core::{headers, Error, ErrorCatalog, Pool, Pooled, Recycle};
use stratum_router::Params;
use stratum_telemetry::{noop_tracer, Tracer};

use crate::response::{ResponseSink, ResponseWriter};
use crate::types::Request;

/// Shared, read-only view of the owning service.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    config: Arc<ServiceConfig>,
    catalog: Arc<ErrorCatalog>,
    tracer: Arc<dyn Tracer>,
}

impl ServiceHandle {
    /// Creates a handle.
    #[must_use]
    pub fn new(config: Arc<ServiceConfig>, catalog: Arc<ErrorCatalog>, tracer: Arc<dyn Tracer>) -> Self {
        Self {
            config,
            catalog,
            tracer,
        }
    }

    /// Creates a handle with an empty catalog and the noop tracer.
    #[must_use]
    pub fn from_config(config: ServiceConfig) -> Self {
        Self::new(Arc::new(config), Arc::new(ErrorCatalog::new()), noop_tracer())
    }

    /// Service configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Service error catalog.
    #[must_use]
    pub fn catalog(&self) -> &ErrorCatalog {
        &self.catalog
    }

    /// Service tracer.
    #[must_use]
    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }
}

/// Pooled per-request record.
///
/// Holds what downstream handlers learn about the request: the request id,
/// the resolved API version, a progress marker and caller metadata. The
/// detail map is only allocated on first use.
#[derive(Default)]
pub struct RequestState {
    request_id: String,
    progress: &'static str,
    api_version: u32,
    caller_id: String,
    skip_info_log: bool,
    details: Option<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl fmt::Debug for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestState")
            .field("request_id", &self.request_id)
            .field("progress", &self.progress)
            .field("api_version", &self.api_version)
            .field("caller_id", &self.caller_id)
            .field("skip_info_log", &self.skip_info_log)
            .field("details", &self.details.as_ref().map_or(0, HashMap::len))
            .finish()
    }
}

impl Recycle for RequestState {
    fn reset(&mut self) {
        self.request_id.clear();
        self.progress = "";
        self.api_version = 0;
        self.caller_id.clear();
        self.skip_info_log = false;
        self.details = None;
    }
}

impl RequestState {
    /// Starts a new request.
    pub fn init(&mut self, request_id: &str) {
        self.reset();
        self.request_id.push_str(request_id);
    }

    /// Request id, derived from the trace id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Last progress marker.
    #[must_use]
    pub fn progress(&self) -> &'static str {
        self.progress
    }

    /// Sets the progress marker reported in the span.
    pub fn set_progress(&mut self, progress: &'static str) {
        self.progress = progress;
    }

    /// Resolved API version, 0 until the version resolver ran.
    #[must_use]
    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Sets the resolved API version.
    pub fn set_api_version(&mut self, version: u32) {
        self.api_version = version;
    }

    /// Caller id, empty when unknown.
    #[must_use]
    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    /// Sets the caller id.
    pub fn set_caller_id(&mut self, caller_id: &str) {
        self.caller_id.clear();
        self.caller_id.push_str(caller_id);
    }

    /// Whether successful requests skip the access log.
    #[must_use]
    pub fn skip_info_log(&self) -> bool {
        self.skip_info_log
    }

    /// Suppresses the access log entry for successful requests.
    pub fn set_skip_info_log(&mut self, skip: bool) {
        self.skip_info_log = skip;
    }

    /// Returns a typed detail.
    #[must_use]
    pub fn detail<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.details
            .as_ref()?
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Stores a typed detail, replacing any previous value of the same type.
    pub fn set_detail<T: Any + Send + Sync>(&mut self, value: T) {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Removes and returns a typed detail.
    pub fn remove_detail<T: Any + Send + Sync>(&mut self) -> Option<T> {
        self.details
            .as_mut()?
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }
}

/// The request in flight, as seen by every handler of the chain.
pub struct Exchange {
    service: ServiceHandle,
    request: Request,
    remote_addr: Option<SocketAddr>,
    params: Params,
    response: Pooled<ResponseWriter>,
    state: Pooled<RequestState>,
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("remote_addr", &self.remote_addr)
            .field("response", &*self.response)
            .field("state", &*self.state)
            .finish_non_exhaustive()
    }
}

impl Exchange {
    /// Assembles an exchange from pooled parts.
    #[must_use]
    pub fn new(
        service: ServiceHandle,
        request: Request,
        remote_addr: Option<SocketAddr>,
        response: Pooled<ResponseWriter>,
        state: Pooled<RequestState>,
    ) -> Self {
        Self {
            service,
            request,
            remote_addr,
            params: Params::new(),
            response,
            state,
        }
    }

    /// Creates an exchange outside the ingress handler, writing into `sink`.
    ///
    /// Used to drive single handlers directly, e.g. in tests.
    #[must_use]
    pub fn standalone(service: ServiceHandle, request: Request, sink: Box<dyn ResponseSink>) -> Self {
        let mut response = Arc::new(Pool::<ResponseWriter>::new(1)).acquire();
        response.attach(sink);
        let state = Arc::new(Pool::<RequestState>::new(1)).acquire();
        Self::new(service, request, None, response, state)
    }

    /// Owning service.
    #[must_use]
    pub fn service(&self) -> &ServiceHandle {
        &self.service
    }

    /// The request.
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Mutable request.
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Peer address, when served from a socket.
    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Route parameters of the matched route.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Sets the route parameters.
    pub fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    /// Returns a route parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The response wrapper.
    #[must_use]
    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    /// Mutable response wrapper.
    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    /// Request-scoped state.
    #[must_use]
    pub fn state(&self) -> &RequestState {
        &self.state
    }

    /// Mutable request-scoped state.
    pub fn state_mut(&mut self) -> &mut RequestState {
        &mut self.state
    }

    /// Session id from the `X-Session-Id` header.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.header(headers::SESSION_ID)
    }

    /// Returns a request header as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Builds an error from the service catalog.
    #[must_use]
    pub fn error(&self, code: &str, args: &[&dyn fmt::Display]) -> Error {
        self.service.catalog().error(code, args)
    }

    /// Detaches the response sink and releases the pooled parts.
    #[must_use]
    pub fn into_sink(mut self) -> Box<dyn ResponseSink> {
        self.response.take_sink()
    }
}
