//! Built-in pipeline stages.
//!
//! Every service runs these in a fixed order:
//!
//! 1. [`Ingress`] - CORS, tracing, panic recovery, access log, pooling
//! 2. [`Negotiator`] - response `Content-Type` from `Accept`
//! 3. [`VersionResolver`] - `X-Api-Version` range enforcement
//!
//! Service handlers follow, then the resource dispatcher.

pub mod cors;
pub mod ingress;
pub mod negotiator;
pub mod version;

pub use cors::{AllowedOrigins, CorsBuilder, CorsPolicy};
pub use ingress::{Ingress, CANCELLED_STATUS};
pub use negotiator::{negotiate, Negotiator};
pub use version::{VersionRejection, VersionResolver};
