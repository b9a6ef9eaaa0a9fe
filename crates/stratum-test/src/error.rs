//! Test error types.

use thiserror::Error;

/// Errors that can occur while building requests or reading responses.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request building failed
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// Response body reading failed
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Form serialization failed
    #[error("form error: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),

    /// Body is not valid UTF-8
    #[error("body is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// The service could not be frozen
    #[error("service error: {0}")]
    Service(#[from] stratum_server::ServiceError),
}
