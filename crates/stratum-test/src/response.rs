//! Test response wrapper.

use std::fmt;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use stratum_core::Error;

use crate::error::TestError;

/// A collected response with helpers for assertions.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Collects an HTTP response.
    pub async fn from_http<B>(response: http::Response<B>) -> Result<Self, TestError>
    where
        B: BodyExt,
        B::Error: fmt::Display,
    {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self::new(parts.status, parts.headers, body))
    }

    /// Creates a test response from raw parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(CONTENT_TYPE.as_str())
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as UTF-8 text.
    pub fn text(&self) -> Result<&str, TestError> {
        Ok(std::str::from_utf8(&self.body)?)
    }

    /// Deserializes the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the JSON body as an untyped value.
    pub fn json_value(&self) -> Result<serde_json::Value, TestError> {
        self.json()
    }

    /// Decodes a JSON error body.
    pub fn error(&self) -> Result<Error, TestError> {
        self.json()
    }

    /// Asserts that the status code equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "expected status {}, got {}: {}",
            expected,
            self.status,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header is missing or differs.
    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("header '{name}' not found"));
        assert_eq!(actual, expected, "header '{name}'");
        self
    }

    /// Asserts that the Content-Type starts with `expected`.
    ///
    /// # Panics
    ///
    /// Panics if Content-Type is missing or differs.
    pub fn assert_content_type(&self, expected: &str) -> &Self {
        let actual = self
            .content_type()
            .unwrap_or_else(|| panic!("Content-Type not found"));
        assert!(
            actual.starts_with(expected),
            "Content-Type: expected '{expected}', got '{actual}'"
        );
        self
    }

    /// Asserts that the body equals the expected string.
    ///
    /// # Panics
    ///
    /// Panics if the body differs.
    pub fn assert_body_eq(&self, expected: &str) -> &Self {
        assert_eq!(String::from_utf8_lossy(&self.body), expected, "body mismatch");
        self
    }

    /// Asserts that the body contains `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the body doesn't contain the substring.
    pub fn assert_body_contains(&self, expected: &str) -> &Self {
        let body = String::from_utf8_lossy(&self.body);
        assert!(body.contains(expected), "body should contain '{expected}', got: {body}");
        self
    }

    /// Asserts that the body is a JSON error with `code`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not an error or carries another code.
    pub fn assert_error_code(&self, code: &str) -> &Self {
        let err = self
            .error()
            .unwrap_or_else(|e| panic!("body is not an error: {e}"));
        assert_eq!(err.code, code, "error code mismatch: {}", err.message);
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &String::from_utf8_lossy(&self.body))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn response(status: u16, content_type: &str, body: &'static str) -> TestResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        TestResponse::new(StatusCode::from_u16(status).unwrap(), headers, Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn test_json_body() {
        let res = response(200, "application/json", r#"{"name":"ann"}"#);
        let value = res.json_value().unwrap();
        assert_eq!(value["name"], "ann");
        res.assert_status(200).assert_content_type("application/json");
    }

    #[test]
    fn test_error_body() {
        let res = response(400, "application/json", r#"{"code":"LOCKED","message":"busy"}"#);
        res.assert_error_code("LOCKED");
        assert_eq!(res.error().unwrap().message, "busy");
    }

    #[test]
    #[should_panic(expected = "expected status 201")]
    fn test_assert_status_mismatch() {
        response(200, "text/plain", "ok").assert_status(201);
    }

    #[test]
    fn test_text() {
        let res = response(200, "text/plain", "pong");
        assert_eq!(res.text().unwrap(), "pong");
        res.assert_body_eq("pong").assert_body_contains("on");
    }

    #[tokio::test]
    async fn test_from_http() {
        let http = http::Response::builder()
            .status(204)
            .header("x-request-id", "r-1")
            .body(http_body_util::Full::new(Bytes::new()))
            .unwrap();
        let res = TestResponse::from_http(http).await.unwrap();
        res.assert_status(204).assert_header("x-request-id", "r-1");
        assert!(res.body().is_empty());
    }
}
