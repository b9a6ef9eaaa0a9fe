//! # Stratum Core
//!
//! Core types shared by every Stratum crate:
//!
//! - [`Error`] - the wire error carried by 4xx/5xx bodies
//! - [`ErrorCatalog`] - service-specific error formats layered over [`codes`]
//! - [`headers`] - reserved header names
//! - [`media`] - media types and the supported representation table
//! - [`pool`] - bounded object pools for per-request records

#![doc(html_root_url = "https://docs.rs/stratum-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod headers;
pub mod media;
pub mod pool;

pub use error::{codes, common_format, Error, ErrorCatalog};
pub use pool::{Pool, Pooled, Recycle};
