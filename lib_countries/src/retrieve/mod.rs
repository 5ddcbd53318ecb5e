//! # Data Retrieval Module
//!
//! Generic HTTP retrieval used by the upstream sources. Request building,
//! timeouts and error capture live here so the sources only deal with
//! payload checks and endpoint ordering.

/// Generic HTTP API client with timeout and optional retry middleware.
pub mod ky_http;

pub use ky_http::{ApiClient, ApiResponse, ClientOptions};
