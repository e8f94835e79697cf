//! reqwest transport for the AIMS client
//!
//! [`HttpClient`] implements [`ApiClient`](aims_core::ApiClient) over HTTPS.
//! It resolves endpoint URLs, attaches the session token obtained from
//! `authenticate`, and maps failed responses to [`aims_core::Error`].
//! It does not retry, cache, or refresh tokens.

pub mod client;
pub mod config;
pub mod session;

pub use client::HttpClient;
pub use config::HttpConfig;
pub use session::{Session, AUTH_TOKEN_HEADER, REQUEST_ID_HEADER, SESSION_TOKEN_HEADER};
