//! Test request building.

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use serde::Serialize;
use stratum_core::{headers, media};
use stratum_middleware::Request;

use crate::error::TestError;

/// A request ready to be handed to a [`TestClient`](crate::TestClient).
#[derive(Debug, Clone)]
pub struct TestRequest {
    /// HTTP method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
}

impl TestRequest {
    /// Creates a new GET request.
    pub fn get(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::GET, uri)
    }

    /// Creates a new POST request.
    pub fn post(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::POST, uri)
    }

    /// Creates a new PUT request.
    pub fn put(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::PUT, uri)
    }

    /// Creates a new DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::DELETE, uri)
    }

    /// Creates a new OPTIONS request.
    pub fn options(uri: impl AsRef<str>) -> TestRequestBuilder {
        TestRequestBuilder::new(Method::OPTIONS, uri)
    }

    /// Converts this request into the pipeline request type.
    pub fn into_request(self) -> Request {
        let mut request = http::Request::new(self.body);
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.headers_mut() = self.headers;
        request
    }
}

/// Builder for constructing test requests.
///
/// Invalid header names, values or bodies are remembered and reported by
/// [`build`](Self::build).
#[must_use]
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    error: Option<TestError>,
}

impl TestRequestBuilder {
    /// Creates a new request builder.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            body: None,
            error: None,
        }
    }

    /// Sets a header on the request.
    ///
    /// # Example
    ///
    /// ```
    /// use stratum_test::TestRequest;
    ///
    /// let request = TestRequest::get("/users")
    ///     .header("x-session-id", "s-1")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.headers["x-session-id"], "s-1");
    /// ```
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::try_from(name.as_ref());
        let value = HeaderValue::try_from(value.as_ref());
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            (Err(err), _) => self.fail(TestError::RequestBuild(format!("invalid header name: {err}"))),
            (_, Err(err)) => self.fail(TestError::RequestBuild(format!("invalid header value: {err}"))),
        }
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    /// Sets the Accept header.
    pub fn accept(self, accept: impl AsRef<str>) -> Self {
        self.header(ACCEPT.as_str(), accept)
    }

    /// Requests a specific API version.
    pub fn api_version(self, version: u32) -> Self {
        self.header(headers::API_VERSION, version.to_string())
    }

    /// Asks for a 204 in place of a successful reply body.
    pub fn inhibit_response(self) -> Self {
        self.header(headers::INHIBIT_RESPONSE, "true")
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the request body as JSON and the matching Content-Type.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.body = Some(Bytes::from(bytes)),
            Err(err) => self.fail(err.into()),
        }
        self.content_type(media::JSON)
    }

    /// Sets the request body as form-urlencoded and the matching Content-Type.
    pub fn form<T: Serialize>(mut self, value: &T) -> Self {
        match serde_urlencoded::to_string(value) {
            Ok(encoded) => self.body = Some(Bytes::from(encoded)),
            Err(err) => self.fail(err.into()),
        }
        self.content_type(media::FORM_URLENCODED)
    }

    /// Builds the test request.
    pub fn build(self) -> Result<TestRequest, TestError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e| TestError::RequestBuild(format!("invalid URI: {e}")))?;

        Ok(TestRequest {
            method: self.method,
            uri,
            headers: self.headers,
            body: self.body.unwrap_or_default(),
        })
    }

    fn fail(&mut self, err: TestError) {
        self.error.get_or_insert(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_sets_content_type() {
        let request = TestRequest::post("/users")
            .json(&json!({"name": "ann"}))
            .build()
            .unwrap();
        assert_eq!(request.headers[CONTENT_TYPE], media::JSON);
        assert_eq!(&request.body[..], br#"{"name":"ann"}"#);
    }

    #[test]
    fn test_form_encodes_pairs() {
        let request = TestRequest::post("/users")
            .form(&[("name", "ann lee"), ("role", "admin")])
            .build()
            .unwrap();
        assert_eq!(request.headers[CONTENT_TYPE], media::FORM_URLENCODED);
        assert_eq!(&request.body[..], b"name=ann+lee&role=admin");
    }

    #[test]
    fn test_api_version_header() {
        let request = TestRequest::get("/").api_version(3).build().unwrap();
        assert_eq!(request.headers[headers::API_VERSION], "3");
    }

    #[test]
    fn test_invalid_header_reported_on_build() {
        let result = TestRequest::get("/").header("bad header", "x").build();
        assert!(matches!(result, Err(TestError::RequestBuild(_))));
    }

    #[test]
    fn test_invalid_uri() {
        let result = TestRequest::get("http://[::1").build();
        assert!(matches!(result, Err(TestError::RequestBuild(_))));
    }

    #[test]
    fn test_into_request() {
        let request = TestRequest::put("/users/ann")
            .body("raw")
            .build()
            .unwrap()
            .into_request();
        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.uri().path(), "/users/ann");
        assert_eq!(&request.body()[..], b"raw");
    }
}
