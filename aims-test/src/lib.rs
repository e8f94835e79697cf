//! Test utilities for the AIMS client
//!
//! - [`RecordingClient`]: an in-memory [`ApiClient`](aims_core::ApiClient)
//!   that records every call and answers from a queue
//! - [`MockServer`]: an HTTP stub on a random local port for exercising
//!   real transports
//!
//! ## Usage
//!
//! ```rust,no_run
//! use aims_test::MockServer;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_roles() {
//!     let server = MockServer::start().await.unwrap();
//!     server.mock("GET", "/aims/v1/roles", 200, json!({"roles": []}));
//!
//!     // point a client at server.url() ...
//!
//!     assert_eq!(server.requests().len(), 1);
//! }
//! ```

pub mod recording;
pub mod server;

pub use recording::{RecordedCall, RecordingClient};
pub use server::{MockServer, ReceivedRequest, TestError};
