//! # Stratum Middleware
//!
//! The request pipeline of a Stratum service.
//!
//! ## Pipeline
//!
//! ```text
//! Request → Ingress → Negotiator → VersionResolver → service handlers → Dispatcher
//!              ↑                                                            ↓
//!              └── panic recovery, access log, metrics, span ←──────────────┘
//! ```
//!
//! | Stage             | Purpose                                                 |
//! |-------------------|---------------------------------------------------------|
//! | Ingress           | CORS, trace span, request id, pooled state, recovery    |
//! | Negotiator        | `Accept` → response `Content-Type`                      |
//! | VersionResolver   | `X-Api-Version` → request state, 400/410/501 rejections |
//!
//! Handlers are [`Middleware`] values collected in a [`ChainBuilder`] and
//! frozen into a [`Chain`]. Each receives the request [`Exchange`] and the
//! [`Next`] link; the last link is a no-op.
//!
//! Responses go through [`write_response`], which serializes a [`Payload`]
//! in the negotiated representation. [`read_request`] decodes request
//! bodies.
//!
//! ## Example
//!
//! ```
//! use stratum_middleware::stages::negotiate;
//!
//! assert_eq!(negotiate(Some("application/xml, */*;q=0.1")), Some("application/xml"));
//! ```

#![doc(html_root_url = "https://docs.rs/stratum-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod chain;
pub mod codec;
pub mod context;
pub mod middleware;
pub mod panic;
pub mod response;
pub mod stages;
pub mod types;

pub use chain::{BoxedMiddleware, Chain, ChainBuilder};
pub use codec::{read_request, write_response, Encodable, Payload};
pub use context::{Exchange, RequestState, ServiceHandle};
pub use middleware::{BoxFuture, FnMiddleware, Middleware, Next};
pub use panic::{cancel, Cancelled};
pub use response::{BufferedSink, ResponseSink, ResponseWriter};
pub use stages::{CorsPolicy, Ingress, Negotiator, VersionResolver};
pub use types::{Request, Response};
