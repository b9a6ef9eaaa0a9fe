//! In-memory client driving a frozen service.

use std::net::SocketAddr;
use std::sync::Arc;

use http::Method;
use serde::Serialize;
use stratum_server::{App, Service};

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;

/// A client that sends requests through the full handler chain of an
/// [`App`] without binding a socket.
///
/// # Example
///
/// ```ignore
/// let client = TestClient::new(service)?;
/// let response = client.get("/users").api_version(2).send().await;
/// response.assert_status(200);
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct TestClient {
    app: Arc<App>,
    remote_addr: Option<SocketAddr>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Freezes `service` and wraps the resulting app.
    pub fn new(service: Service) -> Result<Self, TestError> {
        Ok(Self::from_app(service.freeze()?))
    }

    /// Wraps an already frozen app.
    pub fn from_app(app: App) -> Self {
        Self {
            app: Arc::new(app),
            remote_addr: None,
            default_headers: Vec::new(),
        }
    }

    /// The wrapped app.
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Pretends requests arrive from `addr`.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Creates a GET request builder.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Creates a POST request builder.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Creates a PUT request builder.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Creates an OPTIONS request builder.
    pub fn options(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::OPTIONS, uri)
    }

    /// Creates a request builder for any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let builder = self
            .default_headers
            .iter()
            .fold(TestRequestBuilder::new(method, uri), |builder, (name, value)| {
                builder.header(name, value)
            });
        TestClientRequest {
            client: self,
            builder,
        }
    }

    /// Sends a built request through the chain.
    pub async fn execute(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let response = self.app.handle(request.into_request(), self.remote_addr).await;
        TestResponse::from_http(response).await
    }
}

/// A request bound to a [`TestClient`].
#[must_use]
#[derive(Debug)]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl TestClientRequest<'_> {
    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the Accept header.
    pub fn accept(mut self, accept: impl AsRef<str>) -> Self {
        self.builder = self.builder.accept(accept);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.builder = self.builder.content_type(content_type);
        self
    }

    /// Requests a specific API version.
    pub fn api_version(mut self, version: u32) -> Self {
        self.builder = self.builder.api_version(version);
        self
    }

    /// Asks for a 204 in place of a successful reply body.
    pub fn inhibit_response(mut self) -> Self {
        self.builder = self.builder.inhibit_response();
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sets a form-urlencoded body.
    pub fn form<T: Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.form(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(self) -> TestResponse {
        self.try_send()
            .await
            .unwrap_or_else(|err| panic!("test request failed: {err}"))
    }

    /// Sends the request and returns a Result.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.execute(request).await
    }
}
