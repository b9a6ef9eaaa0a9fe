//! # Stratum Server
//!
//! Versioned resource dispatch and the HTTP server of a Stratum service.
//!
//! - [`Service`]: collects handlers, route tables and resources, then
//!   freezes into an [`App`]
//! - [`resource`]: capability traits a resource implements
//! - [`Dispatcher`]: global table first, then the table of the request's
//!   API version; 404 and 405 with `Allow`
//! - HTTP/1.1 via Hyper with graceful shutdown
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stratum_config::ServiceConfig;
//! use stratum_server::{NotImplementedResource, Service};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stratum_server::ServiceError> {
//!     let mut service = Service::new(ServiceConfig::with_versions(1, 3))?;
//!     service.add_resource(3, "/reports", Arc::new(NotImplementedResource))?;
//!     service.run().await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/stratum-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod dispatcher;
mod error;
mod not_implemented;
pub mod resource;
pub mod server;
mod service;
pub mod shutdown;

pub use dispatcher::{handler, Dispatcher, RouteHandler, Routes};
pub use error::{ServiceError, ServiceResult};
pub use not_implemented::NotImplementedResource;
pub use resource::{Reply, Resource};
pub use service::{App, Service};
pub use shutdown::ShutdownSignal;
