//! CORS (Cross-Origin Resource Sharing) policy.
//!
//! The policy runs inside the ingress handler before anything else. It adds
//! `Access-Control-*` headers for allowed origins; an `OPTIONS` request is
//! a preflight and is answered with `204 No Content` without running the
//! chain. A disallowed origin gets no CORS headers, which makes the browser
//! reject the response.
//!
//! ## Example
//!
//! ```
//! use http::Method;
//! use std::time::Duration;
//! use stratum_middleware::stages::CorsPolicy;
//!
//! let cors = CorsPolicy::builder()
//!     .allow_origin("https://app.example.com")
//!     .allow_methods([Method::GET, Method::POST])
//!     .allow_headers(["Content-Type", "X-Api-Version"])
//!     .max_age(Duration::from_secs(600))
//!     .build();
//!
//! assert!(cors.origins().is_allowed("https://app.example.com"));
//! assert!(!cors.origins().is_allowed("https://evil.example.com"));
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use http::{HeaderMap, HeaderValue, Method};
use stratum_config::CorsConfig;

/// CORS header names.
pub mod headers {
    /// `Access-Control-Allow-Origin` header.
    pub const ALLOW_ORIGIN: &str = "access-control-allow-origin";
    /// `Access-Control-Allow-Methods` header.
    pub const ALLOW_METHODS: &str = "access-control-allow-methods";
    /// `Access-Control-Allow-Headers` header.
    pub const ALLOW_HEADERS: &str = "access-control-allow-headers";
    /// `Access-Control-Allow-Credentials` header.
    pub const ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
    /// `Access-Control-Max-Age` header.
    pub const MAX_AGE: &str = "access-control-max-age";
    /// `Access-Control-Expose-Headers` header.
    pub const EXPOSE_HEADERS: &str = "access-control-expose-headers";
    /// `Access-Control-Request-Headers` header (preflight).
    pub const REQUEST_HEADERS: &str = "access-control-request-headers";
    /// `Origin` header.
    pub const ORIGIN: &str = "origin";
    /// `Vary` header.
    pub const VARY: &str = "vary";
}

/// The set of allowed origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// Any origin (`*`).
    Any,
    /// Listed origins only.
    List(BTreeSet<String>),
}

impl AllowedOrigins {
    /// Checks if an origin is allowed.
    #[must_use]
    pub fn is_allowed(&self, origin: &str) -> bool {
        match self {
            Self::Any => true,
            Self::List(origins) => origins.contains(origin),
        }
    }
}

/// A compiled CORS policy.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: AllowedOrigins,
    methods: Vec<Method>,
    allowed_headers: BTreeSet<String>,
    exposed_headers: BTreeSet<String>,
    allow_credentials: bool,
    max_age: Option<Duration>,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            origins: AllowedOrigins::Any,
            methods: vec![Method::GET, Method::POST, Method::PUT, Method::DELETE],
            allowed_headers: BTreeSet::new(),
            exposed_headers: BTreeSet::new(),
            allow_credentials: false,
            max_age: None,
        }
    }
}

impl CorsPolicy {
    /// Creates a builder starting from the default policy.
    #[must_use]
    pub fn builder() -> CorsBuilder {
        CorsBuilder::default()
    }

    /// Compiles the policy from configuration.
    ///
    /// Unparsable method names are skipped. Returns `None` when CORS is
    /// disabled.
    #[must_use]
    pub fn from_config(config: &CorsConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let origins = if config.allowed_origins.iter().any(|o| o == "*") {
            AllowedOrigins::Any
        } else {
            AllowedOrigins::List(config.allowed_origins.iter().cloned().collect())
        };

        let mut builder = CorsBuilder::default()
            .allow_headers(&config.allowed_headers)
            .expose_headers(&config.exposed_headers)
            .allow_credentials(config.allow_credentials);
        builder.policy.origins = origins;
        if !config.allowed_methods.is_empty() {
            builder = builder.allow_methods(
                config
                    .allowed_methods
                    .iter()
                    .filter_map(|m| m.to_ascii_uppercase().parse::<Method>().ok()),
            );
        }
        if let Some(secs) = config.max_age_secs {
            builder = builder.max_age(Duration::from_secs(secs));
        }
        Some(builder.build())
    }

    /// Allowed origins.
    #[must_use]
    pub fn origins(&self) -> &AllowedOrigins {
        &self.origins
    }

    /// Allowed methods.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Adds CORS headers for the request to `response`.
    ///
    /// Returns true if the request is a preflight, in which case the caller
    /// answers 204 and stops.
    pub fn apply(&self, method: &Method, request: &HeaderMap, response: &mut HeaderMap) -> bool {
        let preflight = *method == Method::OPTIONS;

        let Some(origin) = request.get(headers::ORIGIN).and_then(|v| v.to_str().ok()) else {
            return preflight;
        };
        if !self.origins.is_allowed(origin) {
            return preflight;
        }

        let allow_origin = match (&self.origins, self.allow_credentials) {
            (AllowedOrigins::Any, false) => Some(HeaderValue::from_static("*")),
            _ => HeaderValue::from_str(origin).ok(),
        };
        if let Some(value) = allow_origin {
            response.insert(headers::ALLOW_ORIGIN, value);
            if value_is_origin(&self.origins, self.allow_credentials) {
                response.append(headers::VARY, HeaderValue::from_static("origin"));
            }
        }
        if self.allow_credentials {
            response.insert(headers::ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }

        if preflight {
            self.preflight_headers(request, response);
        } else {
            insert_joined(response, headers::EXPOSE_HEADERS, &self.exposed_headers);
        }
        preflight
    }

    fn preflight_headers(&self, request: &HeaderMap, response: &mut HeaderMap) {
        let methods = self
            .methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&methods) {
            response.insert(headers::ALLOW_METHODS, value);
        }

        if self.allowed_headers.is_empty() {
            // Echo what the browser asked for.
            if let Some(requested) = request.get(headers::REQUEST_HEADERS) {
                response.insert(headers::ALLOW_HEADERS, requested.clone());
            }
        } else {
            insert_joined(response, headers::ALLOW_HEADERS, &self.allowed_headers);
        }

        if let Some(max_age) = self.max_age {
            response.insert(headers::MAX_AGE, HeaderValue::from(max_age.as_secs()));
        }
    }
}

fn value_is_origin(origins: &AllowedOrigins, credentials: bool) -> bool {
    !matches!(origins, AllowedOrigins::Any) || credentials
}

fn insert_joined(response: &mut HeaderMap, name: &'static str, values: &BTreeSet<String>) {
    if values.is_empty() {
        return;
    }
    let joined = values.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    if let Ok(value) = HeaderValue::from_str(&joined) {
        response.insert(name, value);
    }
}

/// Builder for [`CorsPolicy`].
#[derive(Debug, Clone, Default)]
pub struct CorsBuilder {
    policy: CorsPolicy,
}

impl CorsBuilder {
    /// Restricts origins to an explicit list, adding `origin` to it.
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        match &mut self.policy.origins {
            AllowedOrigins::List(origins) => {
                origins.insert(origin.into());
            }
            any @ AllowedOrigins::Any => {
                *any = AllowedOrigins::List(BTreeSet::from([origin.into()]));
            }
        }
        self
    }

    /// Allows any origin.
    ///
    /// With credentials enabled the request origin is echoed instead of `*`.
    #[must_use]
    pub fn allow_any_origin(mut self) -> Self {
        self.policy.origins = AllowedOrigins::Any;
        self
    }

    /// Sets the allowed methods.
    #[must_use]
    pub fn allow_methods<I>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        self.policy.methods = methods.into_iter().collect();
        self
    }

    /// Sets the allowed request headers.
    ///
    /// When empty, a preflight echoes `Access-Control-Request-Headers`.
    #[must_use]
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.allowed_headers = headers
            .into_iter()
            .map(|h| h.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Sets the headers exposed to scripts.
    #[must_use]
    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.policy.exposed_headers = headers
            .into_iter()
            .map(|h| h.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Allows credentials.
    #[must_use]
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.policy.allow_credentials = allow;
        self
    }

    /// Sets the preflight cache duration.
    #[must_use]
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.policy.max_age = Some(max_age);
        self
    }

    /// Builds the policy.
    #[must_use]
    pub fn build(self) -> CorsPolicy {
        self.policy
    }
}
