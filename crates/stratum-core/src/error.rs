//! Wire error type and error-code catalogs.
//!
//! Every 4xx and 5xx body produced by Stratum is an [`Error`]: a stable
//! machine-readable `code`, a formatted human-readable `message`, and an
//! optional diagnostic `stack`.
//!
//! Messages are produced by a two-level lookup:
//!
//! 1. the service-specific [`ErrorCatalog`] (if one is supplied),
//! 2. the built-in common table (see [`codes`]),
//! 3. a failsafe that reports [`codes::UNKNOWN`] with the caller's original
//!    code as the only format argument.
//!
//! Building an error therefore never fails.
//!
//! # Format strings
//!
//! Formats use positional `{}` placeholders, substituted in order. When no
//! arguments are given the format is used verbatim.
//!
//! ```
//! use stratum_core::{codes, Error};
//!
//! let err = Error::new(codes::API_VERSION_TOO_OLD, &[&2]);
//! assert_eq!(err.code, "API_VERSION_TOO_OLD");
//! assert_eq!(err.message, "The minimum supported API version number is 2");
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Stable error codes understood by every Stratum service.
pub mod codes {
    /// Failsafe code for unregistered codes.
    pub const UNKNOWN: &str = "UNKNOWN_ERROR";
    /// Unexpected internal failure (panics, foreign errors).
    pub const INTERNAL: &str = "INTERNAL_ERROR";
    /// The request body's media type cannot be decoded.
    pub const UNSUPPORTED_MEDIA_TYPE: &str = "UNSUPPORTED_MEDIA_TYPE";
    /// The response value could not be encoded.
    pub const SERIALIZATION_FAILED: &str = "SERIALIZATION_FAILED";
    /// The request body could not be decoded.
    pub const DESERIALIZATION_FAILED: &str = "DESERIALIZATION_FAILED";
    /// Path identity and body identity disagree.
    pub const RESOURCE_ID_MISMATCH: &str = "RESOURCE_ID_MISMATCH";
    /// The version header is not a positive integer.
    pub const API_VERSION_INVALID: &str = "API_VERSION_INVALID";
    /// The requested version is below the supported minimum.
    pub const API_VERSION_TOO_OLD: &str = "API_VERSION_TOO_OLD";
    /// The requested version is above the supported maximum.
    pub const API_VERSION_TOO_NEW: &str = "API_VERSION_TOO_NEW";
    /// Domain validation failure.
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    /// A lock could not be obtained.
    pub const LOCKED: &str = "LOCKED";
    /// A concurrent update won.
    pub const UPDATE_PREEMPTED: &str = "UPDATE_PREEMPTED";
    /// Unknown view name.
    pub const INVALID_VIEW_NAME: &str = "INVALID_VIEW_NAME";
    /// A view parameter is missing.
    pub const MISSING_VIEW_PARAMETER: &str = "MISSING_VIEW_PARAMETER";
    /// A view parameter is malformed.
    pub const INVALID_VIEW_PARAMETER: &str = "INVALID_VIEW_PARAMETER";
    /// A query or body parameter has an invalid value.
    pub const INVALID_PARAMETER_VALUE: &str = "INVALID_PARAMETER_VALUE";
}

/// Returns the common format string for a code, if it is a built-in code.
#[must_use]
pub fn common_format(code: &str) -> Option<&'static str> {
    let format = match code {
        codes::UNKNOWN => "Unknown error: {}",
        codes::INTERNAL => "Internal error: {}",
        codes::UNSUPPORTED_MEDIA_TYPE => "Unsupported media type: {}",
        codes::SERIALIZATION_FAILED => "Serialization failed: {}",
        codes::DESERIALIZATION_FAILED => "Deserialization failed: {}",
        codes::RESOURCE_ID_MISMATCH => "Resource identifier in URL doesn't match value in body",
        codes::API_VERSION_INVALID => "API versions are positive integers",
        codes::API_VERSION_TOO_OLD => "The minimum supported API version number is {}",
        codes::API_VERSION_TOO_NEW => "The maximum supported API version number is {}",
        codes::VALIDATION_FAILED => "Validation failed: {}",
        codes::LOCKED => "Lock error: {}",
        codes::UPDATE_PREEMPTED => "Update was preempted: {}",
        codes::INVALID_VIEW_NAME => "Invalid view name",
        codes::MISSING_VIEW_PARAMETER => "Missing view parameter: {}",
        codes::INVALID_VIEW_PARAMETER => "Invalid view parameter: {}",
        codes::INVALID_PARAMETER_VALUE => "Invalid parameter value: {} -> {}",
        _ => return None,
    };
    Some(format)
}

/// Transfer object serialized as the body of 4xx and 5xx responses.
///
/// Serializes as `{"code": ..., "message": ..., "stack": ...}` in JSON and as
/// an `<error>` element in XML. The stack is omitted when empty.
#[derive(ThisError, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "error")]
#[error("{message}")]
pub struct Error {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional diagnostic stack trace.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stack: String,
}

impl Error {
    /// Builds an error from the common table only.
    #[must_use]
    pub fn new(code: &str, args: &[&dyn fmt::Display]) -> Self {
        build(None, code, args)
    }

    /// Wraps an arbitrary error as an [`codes::INTERNAL`] error.
    #[must_use]
    pub fn internal(err: &dyn fmt::Display) -> Self {
        Self::new(codes::INTERNAL, &[err])
    }

    /// Attaches a diagnostic stack.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }
}

/// Service-specific code → format table consulted before the common table.
///
/// Catalogs are built once at startup and shared read-only afterwards.
///
/// # Example
///
/// ```
/// use stratum_core::ErrorCatalog;
///
/// let catalog = ErrorCatalog::new().with("QUOTA_EXCEEDED", "Quota of {} exceeded");
///
/// let err = catalog.error("QUOTA_EXCEEDED", &[&10]);
/// assert_eq!(err.message, "Quota of 10 exceeded");
///
/// let err = catalog.error("NOT_A_CODE", &[]);
/// assert_eq!(err.code, "UNKNOWN_ERROR");
/// assert_eq!(err.message, "Unknown error: NOT_A_CODE");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ErrorCatalog {
    formats: HashMap<String, String>,
}

impl ErrorCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service-specific code.
    ///
    /// A service code may shadow a common code.
    ///
    /// # Panics
    ///
    /// Panics if `code` is empty or already registered in this catalog.
    pub fn register(&mut self, code: impl Into<String>, format: impl Into<String>) {
        let code = code.into();
        assert!(!code.is_empty(), "empty error code");
        assert!(
            !self.formats.contains_key(&code),
            "{code} error code registered twice"
        );
        self.formats.insert(code, format.into());
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, code: impl Into<String>, format: impl Into<String>) -> Self {
        self.register(code, format);
        self
    }

    /// Returns the format for `code`, falling back to the common table.
    #[must_use]
    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.formats
            .get(code)
            .map(String::as_str)
            .or_else(|| common_format(code))
    }

    /// Returns the number of service-specific codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Returns true if no service-specific codes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Builds an error, consulting this catalog first.
    #[must_use]
    pub fn error(&self, code: &str, args: &[&dyn fmt::Display]) -> Error {
        build(Some(self), code, args)
    }
}

fn build(catalog: Option<&ErrorCatalog>, code: &str, args: &[&dyn fmt::Display]) -> Error {
    let format = match catalog {
        Some(catalog) => catalog.lookup(code),
        None => common_format(code),
    };

    match format {
        Some(format) => Error {
            code: code.to_string(),
            message: render(format, args),
            stack: String::new(),
        },
        None => Error {
            code: codes::UNKNOWN.to_string(),
            message: render(common_format(codes::UNKNOWN).unwrap_or("{}"), &[&code]),
            stack: String::new(),
        },
    }
}

/// Substitutes `{}` placeholders in order.
///
/// Placeholders without a matching argument are kept literally; surplus
/// arguments are ignored.
fn render(format: &str, args: &[&dyn fmt::Display]) -> String {
    if args.is_empty() {
        return format.to_string();
    }

    let mut out = String::with_capacity(format.len() + 16);
    let mut args = args.iter();
    let mut rest = format;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(&arg.to_string()),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_code_with_args() {
        let err = Error::new(codes::INVALID_PARAMETER_VALUE, &[&"limit", &"-1"]);
        assert_eq!(err.code, codes::INVALID_PARAMETER_VALUE);
        assert_eq!(err.message, "Invalid parameter value: limit -> -1");
        assert!(err.stack.is_empty());
    }

    #[test]
    fn test_common_code_without_args() {
        let err = Error::new(codes::RESOURCE_ID_MISMATCH, &[]);
        assert_eq!(
            err.message,
            "Resource identifier in URL doesn't match value in body"
        );
    }

    #[test]
    fn test_format_kept_verbatim_without_args() {
        let err = Error::new(codes::LOCKED, &[]);
        assert_eq!(err.message, "Lock error: {}");
    }

    #[test]
    fn test_unknown_code_failsafe() {
        let err = Error::new("BOGUS", &[&1, &2]);
        assert_eq!(err.code, codes::UNKNOWN);
        assert_eq!(err.message, "Unknown error: BOGUS");
    }

    #[test]
    fn test_catalog_consulted_first() {
        let catalog = ErrorCatalog::new().with(codes::LOCKED, "Resource {} is locked");
        let err = catalog.error(codes::LOCKED, &[&"printer"]);
        assert_eq!(err.code, codes::LOCKED);
        assert_eq!(err.message, "Resource printer is locked");
    }

    #[test]
    fn test_catalog_falls_back_to_common() {
        let catalog = ErrorCatalog::new().with("CUSTOM", "Custom");
        let err = catalog.error(codes::VALIDATION_FAILED, &[&"name is required"]);
        assert_eq!(err.message, "Validation failed: name is required");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_registration_panics() {
        let _ = ErrorCatalog::new().with("DUP", "a").with("DUP", "b");
    }

    #[test]
    #[should_panic(expected = "empty error code")]
    fn test_empty_code_panics() {
        let _ = ErrorCatalog::new().with("", "a");
    }

    #[test]
    fn test_missing_args_keep_placeholder() {
        assert_eq!(render("{} -> {}", &[&"a"]), "a -> {}");
        assert_eq!(render("no placeholders", &[&"a"]), "no placeholders");
    }

    #[test]
    fn test_json_shape() {
        let err = Error::new(codes::API_VERSION_INVALID, &[]);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "API_VERSION_INVALID");
        assert!(json.get("stack").is_none());

        let err = err.with_stack("main.rs:1");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["stack"], "main.rs:1");
    }

    #[test]
    fn test_xml_root_element() {
        let err = Error::new(codes::API_VERSION_TOO_NEW, &[&3]);
        let xml = quick_xml::se::to_string(&err).unwrap();
        assert!(xml.starts_with("<error>"), "{xml}");
        assert!(xml.contains("<code>API_VERSION_TOO_NEW</code>"));
        assert!(!xml.contains("<stack>"));
    }

    #[test]
    fn test_display_is_message() {
        let err = Error::internal(&"boom");
        assert_eq!(err.to_string(), "Internal error: boom");
    }

    proptest::proptest! {
        #[test]
        fn test_build_never_fails(code in "[A-Z_]{0,24}", arg in ".*") {
            let err = Error::new(&code, &[&arg]);
            proptest::prop_assert!(!err.code.is_empty());
        }
    }
}
