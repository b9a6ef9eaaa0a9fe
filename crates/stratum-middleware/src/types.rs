//! HTTP types used throughout the pipeline.

use bytes::Bytes;
use http_body_util::Full;

/// The HTTP request type seen by the pipeline.
///
/// Bodies are collected before the chain runs.
pub type Request = http::Request<Bytes>;

/// The HTTP response type produced by a [`BufferedSink`](crate::BufferedSink).
pub type Response = http::Response<Full<Bytes>>;

/// Returns the media type of a `Content-Type` value without parameters.
///
/// ```
/// use stratum_middleware::types::essence;
///
/// assert_eq!(essence("application/json; charset=utf-8"), "application/json");
/// assert_eq!(essence(" text/HTML "), "text/html");
/// ```
#[must_use]
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
