//! Response serialization and request body decoding.
//!
//! [`write_response`] renders a [`Payload`] in the representation chosen by
//! the content negotiator (the response `Content-Type`):
//!
//! | Content-Type        | Bytes / Text           | Value / Error                |
//! |---------------------|------------------------|------------------------------|
//! | `application/json`  | JSON string            | JSON                         |
//! | `application/xml`   | `<string>` element     | XML                          |
//! | `text/html`         | raw                    | HTML-escaped JSON            |
//! | anything else/unset | raw, default type set  | 406 Not Acceptable           |
//!
//! Bytes are base64 text when encoded as JSON or XML.
//!
//! [`read_request`] decodes the request body by its `Content-Type`: JSON,
//! XML, URL-encoded forms and the text fields of multipart forms.

use std::fmt;
use std::future::Future;

use base64::Engine;
use bytes::Bytes;
use futures_util::stream;
use http::header::{HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use stratum_core::{codes, headers, media, Error};
use stratum_telemetry::SERVICE_TARGET;

use crate::context::Exchange;
use crate::types::essence;

/// A value that can be rendered as JSON or XML.
///
/// Implemented for every `Serialize + Send` type.
pub trait Encodable: Send {
    /// Serializes as JSON.
    fn to_json(&self) -> Result<Vec<u8>, String>;

    /// Serializes as XML.
    fn to_xml(&self) -> Result<String, String>;
}

impl<T: Serialize + Send> Encodable for T {
    fn to_json(&self) -> Result<Vec<u8>, String> {
        serde_json::to_vec(self).map_err(|e| e.to_string())
    }

    fn to_xml(&self) -> Result<String, String> {
        quick_xml::se::to_string(self).map_err(|e| e.to_string())
    }
}

/// Body of a response.
pub enum Payload {
    /// No body.
    Empty,
    /// Opaque bytes.
    Bytes(Bytes),
    /// Text.
    Text(String),
    /// A serializable value.
    Value(Box<dyn Encodable>),
    /// A structured error.
    Error(Error),
    /// A foreign failure, reported as an internal error.
    Failure(String),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Value(_) => f.write_str("Value(..)"),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Failure(m) => f.debug_tuple("Failure").field(m).finish(),
        }
    }
}

impl Payload {
    /// Wraps a serializable value.
    pub fn value<T: Serialize + Send + 'static>(value: T) -> Self {
        Self::Value(Box::new(value))
    }

    /// Wraps a foreign error.
    pub fn failure(err: impl fmt::Display) -> Self {
        Self::Failure(err.to_string())
    }

    /// Returns true for [`Payload::Error`] and [`Payload::Failure`].
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Failure(_))
    }
}

impl From<Error> for Payload {
    fn from(err: Error) -> Self {
        Self::Error(err)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

#[derive(Clone, Copy)]
enum Format {
    Json,
    Xml,
}

/// Writes `body` with `status` in the negotiated representation.
///
/// When the request carried the inhibit header (echoed by the negotiator), a
/// 2xx reply becomes 204 without a body; otherwise the header is dropped.
pub fn write_response(ex: &mut Exchange, status: u16, body: Payload) {
    let body = match body {
        Payload::Failure(message) => Payload::Error(ex.error(codes::INTERNAL, &[&message])),
        other => other,
    };

    if ex.response().headers().contains_key(headers::INHIBIT_RESPONSE) {
        if (200..300).contains(&status) {
            ex.response_mut().write_head(204);
            return;
        }
        ex.response_mut()
            .headers_mut()
            .remove(headers::INHIBIT_RESPONSE);
    }

    let content_type = ex
        .response()
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(essence)
        .unwrap_or_default();

    match content_type.as_str() {
        media::JSON => write_encoded(ex, status, &body, Format::Json),
        media::XML => write_encoded(ex, status, &body, Format::Xml),
        media::HTML => write_html(ex, status, body),
        _ => write_raw(ex, status, body),
    }
}

fn write_encoded(ex: &mut Exchange, status: u16, body: &Payload, format: Format) {
    match encode(body, format) {
        Ok(None) => ex.response_mut().write_head(status),
        Ok(Some(bytes)) => send(ex, status, &bytes),
        Err(message) => {
            tracing::error!(target: SERVICE_TARGET, error = %message, "response serialization failed");
            let err = ex.error(codes::SERIALIZATION_FAILED, &[&message]);
            match encode_error(&err, format) {
                Ok(bytes) => send(ex, 500, &bytes),
                Err(_) => send(ex, 500, message.as_bytes()),
            }
        }
    }
}

fn write_html(ex: &mut Exchange, status: u16, body: Payload) {
    match body {
        Payload::Empty => ex.response_mut().write_head(status),
        Payload::Bytes(bytes) => send(ex, status, &bytes),
        Payload::Text(text) => send(ex, status, text.as_bytes()),
        other => match encode(&other, Format::Json) {
            Ok(Some(json)) => {
                let escaped = html_escape_json(&String::from_utf8_lossy(&json));
                send(ex, status, escaped.as_bytes());
            }
            Ok(None) => ex.response_mut().write_head(status),
            Err(message) => {
                let err = ex.error(codes::SERIALIZATION_FAILED, &[&message]);
                match encode_error(&err, Format::Json) {
                    Ok(bytes) => {
                        let escaped = html_escape_json(&String::from_utf8_lossy(&bytes));
                        send(ex, 500, escaped.as_bytes());
                    }
                    Err(_) => send(ex, 500, message.as_bytes()),
                }
            }
        },
    }
}

fn write_raw(ex: &mut Exchange, status: u16, body: Payload) {
    match body {
        Payload::Empty => ex.response_mut().write_head(status),
        Payload::Bytes(bytes) => {
            default_content_type(ex, media::OCTET_STREAM);
            send(ex, status, &bytes);
        }
        Payload::Text(text) => {
            default_content_type(ex, media::PLAIN);
            send(ex, status, text.as_bytes());
        }
        Payload::Value(_) | Payload::Error(_) | Payload::Failure(_) => {
            ex.response_mut().write_head(406);
        }
    }
}

fn default_content_type(ex: &mut Exchange, content_type: &'static str) {
    ex.response_mut()
        .headers_mut()
        .entry(CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(content_type));
}

fn send(ex: &mut Exchange, status: u16, bytes: &[u8]) {
    let response = ex.response_mut();
    response.write_head(status);
    if let Err(err) = response.write_body(bytes) {
        tracing::debug!(target: SERVICE_TARGET, error = %err, "response body write failed");
    }
}

fn encode(body: &Payload, format: Format) -> Result<Option<Vec<u8>>, String> {
    let bytes = match (body, format) {
        (Payload::Empty, _) => return Ok(None),
        (Payload::Bytes(bytes), Format::Json) => {
            serde_json::to_vec(&base64::engine::general_purpose::STANDARD.encode(bytes))
                .map_err(|e| e.to_string())?
        }
        (Payload::Bytes(bytes), Format::Xml) => quick_xml::se::to_string_with_root(
            "string",
            &base64::engine::general_purpose::STANDARD.encode(bytes),
        )
        .map_err(|e| e.to_string())?
        .into_bytes(),
        (Payload::Text(text), Format::Json) => {
            serde_json::to_vec(text).map_err(|e| e.to_string())?
        }
        (Payload::Text(text), Format::Xml) => quick_xml::se::to_string_with_root("string", text)
            .map_err(|e| e.to_string())?
            .into_bytes(),
        (Payload::Value(value), Format::Json) => value.to_json()?,
        (Payload::Value(value), Format::Xml) => value.to_xml()?.into_bytes(),
        (Payload::Error(err), _) => encode_error(err, format)?,
        (Payload::Failure(message), _) => encode_error(&Error::internal(message), format)?,
    };
    Ok(Some(bytes))
}

fn encode_error(err: &Error, format: Format) -> Result<Vec<u8>, String> {
    match format {
        Format::Json => serde_json::to_vec(err).map_err(|e| e.to_string()),
        Format::Xml => quick_xml::se::to_string(err)
            .map(String::into_bytes)
            .map_err(|e| e.to_string()),
    }
}

/// Makes encoded JSON safe to embed in HTML.
///
/// `<`, `>`, `&`, U+2028 and U+2029 are rewritten as `\uXXXX` escapes. They
/// can only occur inside JSON strings, so the output is still valid JSON
/// describing the same value.
#[must_use]
pub fn html_escape_json(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Decodes the request body into `T` by its `Content-Type`.
///
/// A request without a body type returns `blank` unchanged, as does an
/// empty JSON body. Otherwise the decoded body replaces `blank`.
///
/// The returned future does not borrow the exchange.
///
/// # Errors
///
/// Returns `UNSUPPORTED_MEDIA_TYPE` for types other than JSON, XML,
/// URL-encoded and multipart forms, and `DESERIALIZATION_FAILED` if the body
/// does not decode.
pub fn read_request<T>(ex: &Exchange, blank: T) -> impl Future<Output = Result<T, Error>> + Send
where
    T: DeserializeOwned + Send,
{
    let decoded = decode(ex, blank);
    let service = ex.service().clone();
    async move {
        match decoded? {
            Decoded::Ready(value) => Ok(value),
            Decoded::Multipart { body, boundary } => {
                let failed = |e: &dyn fmt::Display| {
                    service.catalog().error(codes::DESERIALIZATION_FAILED, &[e])
                };
                let fields = match multipart_fields(body, boundary).await {
                    Ok(fields) => fields,
                    Err(e) => return Err(failed(&e)),
                };
                let encoded = serde_urlencoded::to_string(&fields).map_err(|e| failed(&e))?;
                serde_urlencoded::from_str(&encoded).map_err(|e| failed(&e))
            }
        }
    }
}

enum Decoded<T> {
    Ready(T),
    Multipart { body: Bytes, boundary: String },
}

fn decode<T: DeserializeOwned>(ex: &Exchange, blank: T) -> Result<Decoded<T>, Error> {
    let Some(content_type) = ex
        .header(headers::CONTENT_TYPE)
        .filter(|v| !v.trim().is_empty())
    else {
        return Ok(Decoded::Ready(blank));
    };

    let Ok(mime) = content_type.parse::<mime::Mime>() else {
        return Err(ex.error(codes::UNSUPPORTED_MEDIA_TYPE, &[&content_type]));
    };

    let body = ex.request().body();
    let failed = |e: &dyn fmt::Display| ex.error(codes::DESERIALIZATION_FAILED, &[e]);

    let value = match mime.essence_str() {
        media::JSON if body.is_empty() => blank,
        media::JSON => serde_json::from_slice(body).map_err(|e| failed(&e))?,
        media::XML => {
            let text = std::str::from_utf8(body).map_err(|e| failed(&e))?;
            quick_xml::de::from_str(text).map_err(|e| failed(&e))?
        }
        media::FORM_URLENCODED => serde_urlencoded::from_bytes(body).map_err(|e| failed(&e))?,
        media::MULTIPART_FORM_DATA => {
            let boundary = mime
                .get_param(mime::BOUNDARY)
                .map(|b| b.as_str().to_string())
                .ok_or_else(|| failed(&"missing multipart boundary"))?;
            return Ok(Decoded::Multipart {
                body: body.clone(),
                boundary,
            });
        }
        other => return Err(ex.error(codes::UNSUPPORTED_MEDIA_TYPE, &[&other])),
    };
    Ok(Decoded::Ready(value))
}

async fn multipart_fields(
    body: Bytes,
    boundary: String,
) -> Result<Vec<(String, String)>, multer::Error> {
    let chunks = stream::once(async move { Ok::<Bytes, std::convert::Infallible>(body) });
    let mut multipart = multer::Multipart::new(chunks, boundary);

    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() {
            continue;
        }
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await?;
        fields.push((name, value));
    }
    Ok(fields)
}
