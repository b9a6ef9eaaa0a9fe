//! API version resolution.
//!
//! Reads `X-Api-Version`, checks it against the configured range and
//! records it in the request state. A missing header selects the newest
//! version.
//!
//! | header            | outcome                       |
//! |-------------------|-------------------------------|
//! | absent            | `max`                         |
//! | not an integer ≥1 | 400 `API_VERSION_INVALID`     |
//! | below `min`       | 410 `API_VERSION_TOO_OLD`     |
//! | above `max`       | 501 `API_VERSION_TOO_NEW`     |

use http::header::HeaderValue;
use stratum_config::VersionConfig;
use stratum_core::{codes, headers, Error};

use crate::codec::write_response;
use crate::context::Exchange;
use crate::middleware::{BoxFuture, Middleware, Next};

/// Why a requested version was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionRejection {
    /// Not a positive integer.
    Invalid,
    /// Below the minimum.
    TooOld,
    /// Above the maximum.
    TooNew,
}

impl VersionRejection {
    /// HTTP status of the rejection.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::Invalid => 400,
            Self::TooOld => 410,
            Self::TooNew => 501,
        }
    }
}

/// Resolves and enforces the API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionResolver {
    min: u32,
    max: u32,
}

impl VersionResolver {
    /// Creates a resolver for `[min, max]`.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Creates a resolver from configuration.
    #[must_use]
    pub const fn from_config(config: &VersionConfig) -> Self {
        Self::new(config.min, config.max)
    }

    /// Resolves a header value to a version.
    ///
    /// # Errors
    ///
    /// Returns the rejection reason for invalid or out-of-range versions.
    ///
    /// ```
    /// use stratum_middleware::stages::{VersionRejection, VersionResolver};
    ///
    /// let resolver = VersionResolver::new(2, 42);
    /// assert_eq!(resolver.resolve(None), Ok(42));
    /// assert_eq!(resolver.resolve(Some("7")), Ok(7));
    /// assert_eq!(resolver.resolve(Some("0")), Err(VersionRejection::Invalid));
    /// assert_eq!(resolver.resolve(Some("1")), Err(VersionRejection::TooOld));
    /// assert_eq!(resolver.resolve(Some("43")), Err(VersionRejection::TooNew));
    /// ```
    pub fn resolve(&self, header: Option<&str>) -> Result<u32, VersionRejection> {
        let Some(raw) = header else {
            return Ok(self.max);
        };
        let version = match raw.trim().parse::<u32>() {
            Ok(v) if v >= 1 => v,
            _ => return Err(VersionRejection::Invalid),
        };
        if version < self.min {
            return Err(VersionRejection::TooOld);
        }
        if version > self.max {
            return Err(VersionRejection::TooNew);
        }
        Ok(version)
    }

    fn rejection_error(&self, ex: &Exchange, rejection: VersionRejection) -> Error {
        match rejection {
            VersionRejection::Invalid => ex.error(codes::API_VERSION_INVALID, &[]),
            VersionRejection::TooOld => ex.error(codes::API_VERSION_TOO_OLD, &[&self.min]),
            VersionRejection::TooNew => ex.error(codes::API_VERSION_TOO_NEW, &[&self.max]),
        }
    }
}

impl Middleware for VersionResolver {
    fn name(&self) -> &'static str {
        "version"
    }

    fn handle<'a>(&'a self, ex: &'a mut Exchange, next: Next<'a>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            ex.state_mut().set_progress("version.begin");
            match self.resolve(ex.header(headers::API_VERSION)) {
                Ok(version) => {
                    ex.response_mut()
                        .headers_mut()
                        .insert(headers::API_VERSION, HeaderValue::from(version));
                    ex.state_mut().set_api_version(version);
                    next.run(ex).await;
                }
                Err(rejection) => {
                    ex.state_mut().set_progress("version.rejected");
                    let err = self.rejection_error(ex, rejection);
                    write_response(ex, rejection.status(), err.into());
                }
            }
        })
    }
}
