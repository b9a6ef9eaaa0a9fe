//! Radix tree router for Stratum route tables.
//!
//! The router maps `(method, path pattern)` pairs to handlers of any type
//! `H`. Stratum keeps one router per supported API version plus a global
//! router for operational endpoints; each stores boxed handler closures.
//!
//! # Features
//!
//! - **Radix Tree Matching**: O(k) path lookup
//! - **Path Parameters**: `/users/{id}`, `/users/{id}/{action}`
//! - **Wildcards**: catch-all routes (`/files/*path`)
//! - **404 vs 405**: [`Resolution`] tells a missing path from a missing method
//! - **Prefix Groups**: every pattern can be mounted under a common prefix
//!
//! # Example
//!
//! ```rust
//! use stratum_router::{MethodRouter, Resolution, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router.insert("/users", MethodRouter::new().get(1).post(2));
//! router.insert("/users/{id}", MethodRouter::new().get(3));
//!
//! if let Resolution::Found(m) = router.resolve(&Method::GET, "/users/123") {
//!     assert_eq!(*m.handler, 3);
//!     assert_eq!(m.params.get("id"), Some("123"));
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//!                    (root)
//!                      │
//!                   "users"
//!              [GET, POST, DELETE]
//!              ┌───────┴───────┐
//!            "all"           "{id}"
//!              │        [GET, PUT, DELETE]
//!           "count"            │
//!            [GET]         "{action}"
//!                            [POST]
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod method_router;
mod node;
mod params;
mod router;

pub use method_router::MethodRouter;
pub use params::Params;
pub use router::{Resolution, RouteMatch, Router};
