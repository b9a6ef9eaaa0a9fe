//! # Stratum
//!
//! **Versioned REST services over HTTP/1.1**
//!
//! - Ordered handler chain behind a fixed ingress handler
//! - Content negotiation and API version resolution on every request
//! - Resources mounted per API version, wired from the capabilities they
//!   implement
//! - Structured logs, Prometheus metrics and pluggable tracers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stratum::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ServiceError> {
//!     let config = ConfigLoader::new().with_file("service.toml")?.load()?;
//!     let mut service = Service::new(config)?;
//!     service.add_resource(1, "/users", Arc::new(Users::default()))?;
//!     service.run().await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → Ingress → Negotiator → VersionResolver → user handlers → Dispatcher
//!                                                                       ↓
//!                                              global table, then version table
//! ```

#![doc(html_root_url = "https://docs.rs/stratum/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use stratum_config as config;
pub use stratum_core as core;
pub use stratum_middleware as middleware;
pub use stratum_router as router;
pub use stratum_server as server;
pub use stratum_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use stratum::prelude::*;
/// ```
pub mod prelude {
    pub use stratum_config::{ConfigError, ConfigLoader, ServiceConfig};
    pub use stratum_core::{codes, Error, ErrorCatalog};
    pub use stratum_middleware::{
        read_request, write_response, BoxFuture, Exchange, FnMiddleware, Middleware, Next, Payload,
    };
    pub use stratum_server::resource::{
        CollectionActioner, CollectionCounter, CollectionCreator, CollectionDeleter,
        CollectionGetter, CollectionLister, CollectionUpdater, CreateRoute, Items,
        SingletonActioner, SingletonGetter, SingletonUpdateRoute, SingletonUpdater, UpdateRoute,
    };
    pub use stratum_server::{
        handler, NotImplementedResource, Reply, Resource, Service, ServiceError, ServiceResult,
        ShutdownSignal,
    };
}
