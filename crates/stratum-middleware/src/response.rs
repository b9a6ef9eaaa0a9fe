//! Response sinks and the tracking response wrapper.
//!
//! A [`ResponseSink`] is where a response is written: headers, a status line
//! and body bytes. [`ResponseWriter`] decorates a sink to remember whether
//! the head has gone out, the final status and the number of body bytes.
//!
//! ```
//! use stratum_middleware::{BufferedSink, ResponseWriter};
//!
//! let mut writer = ResponseWriter::default();
//! writer.attach(Box::new(BufferedSink::new()));
//!
//! writer.write_body(b"hello").unwrap();
//! writer.write_head(404); // ignored, the head is already out
//!
//! assert_eq!(writer.status(), 200);
//! assert_eq!(writer.size(), 5);
//! ```

use std::fmt;
use std::io;

use bytes::BytesMut;
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use hyper::upgrade::OnUpgrade;
use stratum_core::Recycle;

use crate::types::Response;

/// Destination of a response.
pub trait ResponseSink: Send {
    /// Response headers; changes after [`write_head`](Self::write_head) are lost.
    fn headers(&self) -> &HeaderMap;

    /// Mutable response headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Sends the status line and headers.
    fn write_head(&mut self, status: StatusCode);

    /// Appends body bytes.
    fn write_body(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Flushes buffered output.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Takes over the underlying connection, if the sink supports it.
    fn hijack(&mut self) -> Option<OnUpgrade> {
        None
    }

    /// Converts whatever was written into an HTTP response.
    fn into_response(self: Box<Self>) -> Response;
}

/// Sink that collects the response in memory.
#[derive(Default)]
pub struct BufferedSink {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
    upgrade: Option<OnUpgrade>,
}

impl fmt::Debug for BufferedSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedSink")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

impl BufferedSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink able to hand out the connection upgrade.
    #[must_use]
    pub fn with_upgrade(upgrade: Option<OnUpgrade>) -> Self {
        Self {
            upgrade,
            ..Self::default()
        }
    }

    /// Returns the status sent so far.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Returns the body collected so far.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl ResponseSink for BufferedSink {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_head(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write_body(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write_head(StatusCode::OK);
        self.body.extend_from_slice(data);
        Ok(data.len())
    }

    fn hijack(&mut self) -> Option<OnUpgrade> {
        self.upgrade.take()
    }

    fn into_response(self: Box<Self>) -> Response {
        let sink = *self;
        let mut response = http::Response::new(Full::new(sink.body.freeze()));
        *response.status_mut() = sink.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = sink.headers;
        response
    }
}

/// Response wrapper tracking status and size.
///
/// The status is 0 until the head is written, then fixed. A body write
/// before an explicit head write implies 200. Writers are pooled; a fresh
/// one holds an empty [`BufferedSink`] until [`attach`](Self::attach).
pub struct ResponseWriter {
    sink: Box<dyn ResponseSink>,
    status: u16,
    size: u64,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self {
            sink: Box::new(BufferedSink::new()),
            status: 0,
            size: 0,
        }
    }
}

impl fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("status", &self.status)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Recycle for ResponseWriter {
    fn reset(&mut self) {
        if self.status != 0 || self.size != 0 || !self.sink.headers().is_empty() {
            self.sink = Box::new(BufferedSink::new());
        }
        self.status = 0;
        self.size = 0;
    }
}

impl ResponseWriter {
    /// Wraps `sink`, replacing the current one.
    pub fn attach(&mut self, sink: Box<dyn ResponseSink>) {
        self.sink = sink;
        self.status = 0;
        self.size = 0;
    }

    /// Detaches the sink, leaving an empty one in its place.
    pub fn take_sink(&mut self) -> Box<dyn ResponseSink> {
        std::mem::replace(&mut self.sink, Box::new(BufferedSink::new()))
    }

    /// Status sent, or 0 if nothing was written.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Status to report: the sent status, or 200 when nothing was written.
    #[must_use]
    pub fn effective_status(&self) -> u16 {
        if self.status == 0 {
            200
        } else {
            self.status
        }
    }

    /// Body bytes written.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns true once the head has been sent.
    #[must_use]
    pub fn is_written(&self) -> bool {
        self.status != 0
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.sink.headers()
    }

    /// Mutable response headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.sink.headers_mut()
    }

    /// Sends the head. Only the first call has an effect.
    pub fn write_head(&mut self, status: u16) {
        if self.status != 0 {
            return;
        }
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.status = code.as_u16();
        self.sink.write_head(code);
    }

    /// Writes body bytes, sending a 200 head first if needed.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error.
    pub fn write_body(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.status == 0 {
            self.write_head(200);
        }
        let written = self.sink.write_body(data)?;
        self.size += written as u64;
        Ok(written)
    }

    /// Records a status without sending anything.
    ///
    /// Used when the client is gone and nothing can be delivered.
    pub fn mark_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Flushes the sink.
    ///
    /// # Errors
    ///
    /// Returns the sink's I/O error.
    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    /// Takes over the connection, if supported by the sink.
    pub fn hijack(&mut self) -> Option<OnUpgrade> {
        self.sink.hijack()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http_body_util::BodyExt;

    fn writer() -> ResponseWriter {
        let mut writer = ResponseWriter::default();
        writer.attach(Box::new(BufferedSink::new()));
        writer
    }

    #[test]
    fn test_unwritten() {
        let writer = writer();
        assert_eq!(writer.status(), 0);
        assert_eq!(writer.effective_status(), 200);
        assert!(!writer.is_written());
    }

    #[test]
    fn test_head_written_once() {
        let mut writer = writer();
        writer.write_head(201);
        writer.write_head(500);
        assert_eq!(writer.status(), 201);
    }

    #[test]
    fn test_body_implies_ok() {
        let mut writer = writer();
        writer.write_body(b"abc").unwrap();
        writer.write_body(b"de").unwrap();
        assert_eq!(writer.status(), 200);
        assert_eq!(writer.size(), 5);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut writer = writer();
        writer
            .headers_mut()
            .insert("x-test", HeaderValue::from_static("1"));
        writer.write_body(b"abc").unwrap();

        writer.reset();
        assert_eq!(writer.status(), 0);
        assert_eq!(writer.size(), 0);
        assert!(writer.headers().is_empty());
    }

    #[test]
    fn test_mark_status_does_not_write() {
        let mut writer = writer();
        writer.mark_status(418);
        assert_eq!(writer.status(), 418);
        let response = writer.take_sink().into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_into_response() {
        let mut writer = writer();
        writer
            .headers_mut()
            .insert("content-type", HeaderValue::from_static("text/plain"));
        writer.write_head(202);
        writer.write_body(b"queued").unwrap();

        let response = writer.take_sink().into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["content-type"], "text/plain");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"queued");
    }

    #[test]
    fn test_buffered_sink_has_no_upgrade() {
        let mut sink = BufferedSink::new();
        assert!(sink.hijack().is_none());
    }
}
