//! Reserved header names.
//!
//! Names are lowercase so they can be used directly with `http::HeaderMap`.

/// Request identifier, echoed on every response (derived from the trace id).
pub const REQUEST_ID: &str = "x-request-id";

/// Client session identifier.
pub const SESSION_ID: &str = "x-session-id";

/// Originating client addresses added by proxies.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Requested (request) and resolved (response) API version.
pub const API_VERSION: &str = "x-api-version";

/// Asks the service to suppress 2xx response bodies.
pub const INHIBIT_RESPONSE: &str = "x-inhibit-response";

/// W3C trace context propagation header.
pub const TRACEPARENT: &str = "traceparent";

/// Standard `Accept` header.
pub const ACCEPT: &str = "accept";

/// Standard `Content-Type` header.
pub const CONTENT_TYPE: &str = "content-type";

/// Standard `Location` header.
pub const LOCATION: &str = "location";

/// Standard `User-Agent` header.
pub const USER_AGENT: &str = "user-agent";
