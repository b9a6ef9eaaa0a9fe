//! HTTP/1.1 server loop.
//!
//! One task per accepted connection. Each request body is collected in full
//! before the chain runs; the response is buffered and sent when the chain
//! returns. On shutdown the listener stops accepting, open connections are
//! asked to finish their current request, and the loop waits for them up to
//! the drain timeout.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use stratum_middleware::{BufferedSink, Response};
use stratum_telemetry::SERVICE_TARGET;
use tokio::net::{TcpListener, TcpStream};

use crate::error::ServiceResult;
use crate::service::App;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Largest request body buffered for the chain; larger bodies get 413.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Accepts connections on `listener` until `shutdown` fires.
///
/// # Errors
///
/// Currently infallible once the listener is bound; accept errors are
/// logged and the loop keeps going.
pub async fn serve(
    app: Arc<App>,
    listener: TcpListener,
    shutdown: ShutdownSignal,
    drain: Duration,
) -> ServiceResult<()> {
    let tracker = ConnectionTracker::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote_addr)) => {
                    let app = Arc::clone(&app);
                    let token = tracker.acquire();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(err) = serve_connection(app, stream, remote_addr, shutdown).await {
                            tracing::debug!(
                                target: SERVICE_TARGET,
                                %remote_addr,
                                error = %err,
                                "connection error"
                            );
                        }
                        drop(token);
                    });
                }
                Err(err) => {
                    tracing::error!(target: SERVICE_TARGET, error = %err, "accept failed");
                }
            },
            () = shutdown.recv() => {
                tracing::info!(target: SERVICE_TARGET, "shutdown requested, no longer accepting");
                break;
            }
        }
    }
    drop(listener);

    tracing::info!(
        target: SERVICE_TARGET,
        active = tracker.active_connections(),
        timeout = ?drain,
        "draining connections"
    );
    if tokio::time::timeout(drain, tracker.wait_for_drain()).await.is_err() {
        tracing::warn!(
            target: SERVICE_TARGET,
            active = tracker.active_connections(),
            "drain timeout reached"
        );
    }
    tracing::info!(target: SERVICE_TARGET, "server stopped");
    Ok(())
}

async fn serve_connection(
    app: Arc<App>,
    stream: TcpStream,
    remote_addr: SocketAddr,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let service = service_fn(move |request: http::Request<Incoming>| {
        let app = Arc::clone(&app);
        async move { Ok::<_, Infallible>(handle(&app, request, remote_addr).await) }
    });

    let conn = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades();
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => result,
        () = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    }
}

/// Buffers `body`, failing with [`LengthLimitError`] past `limit` bytes.
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, BoxError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    Ok(Limited::new(body, limit).collect().await?.to_bytes())
}

fn body_error_status(err: &BoxError) -> StatusCode {
    if err.is::<LengthLimitError>() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn handle(app: &App, mut request: http::Request<Incoming>, remote_addr: SocketAddr) -> Response {
    let upgrade = hyper::upgrade::on(&mut request);
    let (parts, body) = request.into_parts();
    let body = match read_body(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(err) => {
            let status = body_error_status(&err);
            tracing::debug!(target: SERVICE_TARGET, %remote_addr, error = %err, "cannot read request body");
            let mut response = http::Response::new(Full::new(Bytes::new()));
            *response.status_mut() = status;
            return response;
        }
    };

    let request = http::Request::from_parts(parts, body);
    let sink = Box::new(BufferedSink::with_upgrade(Some(upgrade)));
    app.handle_with(request, Some(remote_addr), sink)
        .await
        .into_response()
}
