//! Driving a single route handler outside a service.

use std::sync::Arc;

use stratum_config::ServiceConfig;
use stratum_core::ErrorCatalog;
use stratum_middleware::stages::negotiate;
use stratum_middleware::{BufferedSink, Exchange, ServiceHandle};
use stratum_router::Params;
use stratum_server::RouteHandler;
use stratum_telemetry::noop_tracer;

use crate::error::TestError;
use crate::request::TestRequest;
use crate::response::TestResponse;

/// Runs `handler` against `request` with a default service.
///
/// The exchange looks as it would after the negotiator and version
/// resolver: the response Content-Type follows the request's `Accept`
/// header and the API version is 1. `params` are set as route parameters.
pub async fn dispatch(
    handler: &RouteHandler,
    request: TestRequest,
    params: &[(&str, &str)],
) -> Result<TestResponse, TestError> {
    let service = ServiceHandle::new(
        Arc::new(ServiceConfig::default()),
        Arc::new(ErrorCatalog::new()),
        noop_tracer(),
    );
    let request = request.into_request();
    let accept = request
        .headers()
        .get(http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut ex = Exchange::standalone(service, request, Box::new(BufferedSink::new()));
    ex.state_mut().set_api_version(1);
    if let Some(content_type) = negotiate(accept.as_deref()) {
        ex.response_mut().headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static(content_type),
        );
    }
    let mut route_params = Params::new();
    for &(name, value) in params {
        route_params.push(name, value);
    }
    ex.set_params(route_params);

    handler(&mut ex).await;

    TestResponse::from_http(ex.into_sink().into_response()).await
}
