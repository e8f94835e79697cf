//! Core types and traits for the AIMS client
//!
//! This crate provides the request descriptor, the client trait every
//! transport implements, and the error types shared by all AIMS crates.

pub mod client;
pub mod error;
pub mod request;
pub mod request_id;

pub use client::{ApiClient, Verb};
pub use error::{ApiError, Error, ErrorCode};
pub use request::{check_segment, encode_segment, ApiRequest, Params};
pub use request_id::RequestId;

/// Service name used by every AIMS endpoint
pub const SERVICE_NAME: &str = "aims";

/// API version segment used when none is given
pub const DEFAULT_SERVICE_VERSION: &str = "v1";
