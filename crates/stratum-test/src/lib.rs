//! # Stratum Test
//!
//! In-memory testing for Stratum services. Requests run through the full
//! handler chain of a frozen [`App`](stratum_server::App) without binding a
//! port; single route handlers can be driven with [`dispatch`].
//!
//! ## Example
//!
//! ```ignore
//! use stratum_test::TestClient;
//!
//! #[tokio::test]
//! async fn test_get_user() {
//!     let client = TestClient::new(service()).unwrap();
//!
//!     client
//!         .get("/users/ann")
//!         .api_version(2)
//!         .accept("application/json")
//!         .send()
//!         .await
//!         .assert_status(200)
//!         .assert_content_type("application/json");
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/stratum-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod handler;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use handler::dispatch;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
