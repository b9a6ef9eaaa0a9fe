//! Service assembly.
//!
//! A [`Service`] is built from a [`ServiceConfig`], collects handlers and
//! routes while the application registers them, and is then frozen into an
//! immutable [`App`] that serves requests. Freezing consumes the service,
//! so the chain can only be frozen and served once.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stratum_config::ServiceConfig;
//! use stratum_server::Service;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stratum_server::ServiceError> {
//!     let mut service = Service::new(ServiceConfig::with_versions(1, 2))?;
//!     service.add_resource(2, "/users", Arc::new(Users::default()))?;
//!     service.run().await
//! }
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderValue, Method};
use stratum_config::{ConfigError, ServiceConfig, TraceConfig};
use stratum_core::{headers, ErrorCatalog};
use stratum_middleware::{
    BufferedSink, Chain, ChainBuilder, Ingress, Middleware, Negotiator, Request, Response,
    ResponseSink, ServiceHandle, VersionResolver,
};
use stratum_telemetry::{
    init_logging, install_prometheus, noop_tracer, render_metrics, TelemetryError, Tracer,
    TracerRegistry, SERVICE_TARGET,
};
use tokio::net::TcpListener;

use crate::dispatcher::{handler, mount, Dispatcher, Routes};
use crate::error::{ServiceError, ServiceResult};
use crate::resource::Resource;
use crate::server;
use crate::shutdown::ShutdownSignal;

/// Exposition format served on the metrics route.
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// A service under construction.
pub struct Service {
    config: ServiceConfig,
    catalog: ErrorCatalog,
    tracer: Arc<dyn Tracer>,
    chain: ChainBuilder,
    global: Routes,
    versions: Vec<Routes>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("addr", &self.config.addr)
            .field("versions", &(self.config.version.min..=self.config.version.max))
            .field("handlers", &self.chain.names())
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

impl Service {
    /// Creates a service with the default tracer kinds.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] if the configuration is invalid.
    pub fn new(config: ServiceConfig) -> ServiceResult<Self> {
        Self::with_tracers(config, &TracerRegistry::with_defaults())
    }

    /// Creates a service resolving the configured tracer in `tracers`.
    ///
    /// An unknown or failing tracer kind falls back to the noop tracer.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Config`] if the configuration is invalid.
    pub fn with_tracers(config: ServiceConfig, tracers: &TracerRegistry) -> ServiceResult<Self> {
        let config = config.finalize()?;
        let tracer = build_tracer(&config.trace, tracers);

        let mut chain = ChainBuilder::new();
        chain
            .append(Negotiator::new())
            .append(VersionResolver::from_config(&config.version));

        let versions = (config.version.min..=config.version.max)
            .map(|_| Routes::with_prefix(&config.prefix))
            .collect();

        Ok(Self {
            global: Routes::with_prefix(&config.prefix),
            versions,
            catalog: ErrorCatalog::new(),
            tracer,
            chain,
            config,
        })
    }

    /// The finalized configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The service tracer.
    #[must_use]
    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    /// Names of the chain handlers after the ingress handler, in order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// Adds a handler at the end of the chain, before the dispatcher.
    pub fn append_handler<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.chain.append(middleware);
        self
    }

    /// Adds a handler directly after the ingress handler.
    pub fn prepend_handler<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.chain.prepend(middleware);
        self
    }

    /// Same as [`append_handler`](Self::append_handler).
    pub fn add_handler<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.append_handler(middleware)
    }

    /// Route table of an API version.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::VersionOutOfRange`] if `version` is not
    /// supported.
    pub fn router(&mut self, version: u32) -> ServiceResult<&mut Routes> {
        let min = self.config.version.min;
        let max = self.config.version.max;
        if !(min..=max).contains(&version) {
            return Err(ServiceError::VersionOutOfRange { version, min, max });
        }
        let index = usize::try_from(version - min)
            .map_err(|_| ServiceError::VersionOutOfRange { version, min, max })?;
        self.versions
            .get_mut(index)
            .ok_or(ServiceError::VersionOutOfRange { version, min, max })
    }

    /// Version-independent route table, looked up first.
    pub fn global_router(&mut self) -> &mut Routes {
        &mut self.global
    }

    /// Wires a resource under `base` for one API version.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::VersionOutOfRange`] if `version` is not
    /// supported.
    ///
    /// # Panics
    ///
    /// Panics if one of the resource's routes is already registered.
    pub fn add_resource<R: Resource>(
        &mut self,
        version: u32,
        base: &str,
        resource: Arc<R>,
    ) -> ServiceResult<()> {
        mount(self.router(version)?, base, resource);
        tracing::debug!(target: SERVICE_TARGET, version, base, "resource registered");
        Ok(())
    }

    /// Service-specific error codes, consulted before the common table.
    pub fn error_catalog_mut(&mut self) -> &mut ErrorCatalog {
        &mut self.catalog
    }

    /// Installs the service and access log sinks.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Telemetry`] if a log file cannot be opened,
    /// the level is invalid or a global subscriber is already set.
    pub fn install_logging(&self) -> ServiceResult<()> {
        init_logging(&self.config.log.to_telemetry())?;
        Ok(())
    }

    /// Freezes the chain and routes.
    ///
    /// Adds the metrics route when metrics are enabled and appends the
    /// dispatcher as the last handler.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Telemetry`] if the metrics recorder cannot be
    /// installed.
    pub fn freeze(self) -> ServiceResult<App> {
        let Self {
            config,
            catalog,
            tracer,
            mut chain,
            mut global,
            versions,
        } = self;

        if config.metrics.enabled {
            install_prometheus()?;
            global.route(
                Method::GET,
                &config.metrics.uri_path,
                handler(|ex| Box::pin(async move { write_metrics(ex) })),
            );
        }

        chain.append(Dispatcher::new(global, versions, config.version.min));

        let ingress = Ingress::new(&config);
        let service = ServiceHandle::new(Arc::new(config), Arc::new(catalog), tracer);
        Ok(App {
            service,
            ingress,
            chain: chain.build(),
        })
    }

    /// Serves until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// See [`run_with_shutdown`](Self::run_with_shutdown).
    pub async fn run(self) -> ServiceResult<()> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Serves until `shutdown` fires, then drains open connections for up
    /// to `shutdown_timeout_secs`.
    ///
    /// Logging is installed unless a global subscriber already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if logging, metrics or the listener cannot be set
    /// up.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> ServiceResult<()> {
        match self.install_logging() {
            Ok(()) => {}
            Err(ServiceError::Telemetry(TelemetryError::LoggingInit(reason))) => {
                tracing::debug!(target: SERVICE_TARGET, %reason, "keeping existing log subscriber");
            }
            Err(err) => return Err(err),
        }

        let addr: SocketAddr = self.config.addr.parse().map_err(|_| {
            ConfigError::invalid_value("addr", format!("invalid socket address: {}", self.config.addr))
        })?;
        let drain = Duration::from_secs(self.config.shutdown_timeout_secs);
        let app = Arc::new(self.freeze()?);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServiceError::Bind { addr, source })?;
        tracing::info!(target: SERVICE_TARGET, %addr, "listening");

        server::serve(app, listener, shutdown, drain).await
    }
}

fn build_tracer(config: &TraceConfig, tracers: &TracerRegistry) -> Arc<dyn Tracer> {
    if !config.enabled {
        return noop_tracer();
    }
    match tracers.build(&config.tracer, &config.params) {
        Ok(tracer) => tracer,
        Err(err) => {
            tracing::warn!(
                target: SERVICE_TARGET,
                tracer = %config.tracer,
                error = %err,
                "tracer unavailable, tracing disabled"
            );
            noop_tracer()
        }
    }
}

fn write_metrics(ex: &mut stratum_middleware::Exchange) {
    let Some(text) = render_metrics() else {
        ex.response_mut().write_head(404);
        return;
    };
    let response = ex.response_mut();
    response
        .headers_mut()
        .insert(headers::CONTENT_TYPE, HeaderValue::from_static(METRICS_CONTENT_TYPE));
    response.write_head(200);
    if let Err(err) = response.write_body(text.as_bytes()) {
        tracing::debug!(target: SERVICE_TARGET, error = %err, "metrics write failed");
    }
}

/// A frozen service, ready to serve requests.
#[derive(Debug)]
pub struct App {
    service: ServiceHandle,
    ingress: Ingress,
    chain: Chain,
}

impl App {
    /// Shared service view handed to handlers.
    #[must_use]
    pub fn service(&self) -> &ServiceHandle {
        &self.service
    }

    /// Handler names after the ingress handler, in invocation order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// Runs one request through the chain in memory.
    pub async fn handle(&self, request: Request, remote_addr: Option<SocketAddr>) -> Response {
        self.handle_with(request, remote_addr, Box::new(BufferedSink::new()))
            .await
            .into_response()
    }

    /// Runs one request through the chain, writing into `sink`.
    pub async fn handle_with(
        &self,
        request: Request,
        remote_addr: Option<SocketAddr>,
        sink: Box<dyn ResponseSink>,
    ) -> Box<dyn ResponseSink> {
        self.ingress
            .serve(&self.service, request, remote_addr, sink, self.chain.head())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{CollectionLister, Reply};
    use stratum_middleware::{BoxFuture, Exchange, FnMiddleware};

    struct Empty;

    impl CollectionLister for Empty {
        fn list<'a>(&'a self, _ex: &'a mut Exchange) -> BoxFuture<'a, Reply> {
            Box::pin(async { Reply::ok(Vec::<String>::new()) })
        }
    }

    impl Resource for Empty {
        fn lister(&self) -> Option<&dyn CollectionLister> {
            Some(self)
        }
    }

    fn get(path: &str) -> Request {
        http::Request::builder().uri(path).body(bytes::Bytes::new()).unwrap()
    }

    fn noop(name: &'static str) -> impl Middleware {
        FnMiddleware::new(name, |ex, next| Box::pin(async move { next.run(ex).await }))
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = Service::new(ServiceConfig::with_versions(3, 1)).unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn test_builtin_handler_order() {
        let mut service = Service::new(ServiceConfig::default()).unwrap();
        service.append_handler(noop("auth"));
        service.prepend_handler(noop("first"));
        service.add_handler(noop("last"));
        assert_eq!(
            service.handler_names(),
            vec!["first", "negotiator", "version", "auth", "last"]
        );

        let app = service.freeze().unwrap();
        assert_eq!(app.handler_names().last(), Some(&"dispatcher"));
    }

    #[test]
    fn test_router_range() {
        let mut service = Service::new(ServiceConfig::with_versions(2, 4)).unwrap();
        assert!(service.router(2).is_ok());
        assert!(service.router(4).is_ok());
        assert!(matches!(
            service.router(5),
            Err(ServiceError::VersionOutOfRange { version: 5, min: 2, max: 4 })
        ));
        assert!(service.router(1).is_err());
        assert!(service.add_resource(9, "/empty", Arc::new(Empty)).is_err());
    }

    #[test]
    fn test_unknown_tracer_falls_back_to_noop() {
        let mut config = ServiceConfig::default();
        config.trace.enabled = true;
        config.trace.tracer = "zipkin".to_string();
        let service = Service::new(config).unwrap();
        assert!(service.tracer().is_noop());
    }

    #[test]
    fn test_log_tracer_is_built() {
        let mut config = ServiceConfig::default();
        config.trace.enabled = true;
        config.trace.tracer = "log".to_string();
        let service = Service::new(config).unwrap();
        assert!(!service.tracer().is_noop());
    }

    #[tokio::test]
    async fn test_prefix_applies_to_resources() {
        let mut config = ServiceConfig::default();
        config.prefix = "/api/".to_string();
        let mut service = Service::new(config).unwrap();
        service.add_resource(1, "/empty", Arc::new(Empty)).unwrap();
        let app = service.freeze().unwrap();

        let response = app.handle(get("/api/empty"), None).await;
        assert_eq!(response.status(), 200);
        let response = app.handle(get("/empty"), None).await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_metrics_route() {
        let mut config = ServiceConfig::default();
        config.metrics.enabled = true;
        let app = Service::new(config).unwrap().freeze().unwrap();

        let response = app.handle(get("/metrics"), None).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], METRICS_CONTENT_TYPE);
    }
}
