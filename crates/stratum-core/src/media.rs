//! Media types understood by the codec and the content negotiator.

/// `text/css`
pub const CSS: &str = "text/css";
/// `text/csv`
pub const CSV: &str = "text/csv";
/// `image/gif`
pub const GIF: &str = "image/gif";
/// `text/html`
pub const HTML: &str = "text/html";
/// `application/json`
pub const JSON: &str = "application/json";
/// `multipart/form-data`
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
/// `application/octet-stream`
pub const OCTET_STREAM: &str = "application/octet-stream";
/// `text/plain`
pub const PLAIN: &str = "text/plain";
/// `image/png`
pub const PNG: &str = "image/png";
/// `application/x-www-form-urlencoded`
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
/// `application/xml`
pub const XML: &str = "application/xml";

/// Representations a service can produce, in server preference order.
///
/// The first entry is the default when a request carries no `Accept` header.
pub const ACCEPTED: &[&str] = &[JSON, CSS, PLAIN, XML, HTML, GIF, PNG, OCTET_STREAM];
