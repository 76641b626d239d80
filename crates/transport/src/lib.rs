//! HTTP transport for the DENUE API
//!
//! Defines the `Transport` trait that decouples the fetcher from the HTTP
//! stack. `HttpTransport` is the production implementation: a pooled reqwest
//! client that retries idempotent GETs with exponential backoff on transient
//! statuses and connection-level failures. Retries here are invisible to the
//! caller, which only sees the final response or error.

pub mod error;
pub mod http;
pub mod retry;

pub use error::{Result, TransportError};
pub use http::HttpTransport;
pub use retry::RetryPolicy;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Final response of a GET after transport-level retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// How an unsuccessful HTTP status reflects on the credential that made the call.
///
/// - Unauthorized counts against the credential (401/403)
/// - Transient is never attributed to the credential (5xx, 429, 404, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    Transient,
    Unauthorized,
}

/// Classify a non-success status. Only 401 and 403 blame the credential.
pub fn classify_status(status: u16) -> ErrorClassification {
    match status {
        401 | 403 => ErrorClassification::Unauthorized,
        _ => ErrorClassification::Transient,
    }
}

/// Abstraction over the HTTP GET used by the fetcher.
///
/// Uses a `Pin<Box<dyn Future>>` return type for dyn-compatibility
/// (`Arc<dyn Transport>`), so tests can substitute scripted transports.
pub trait Transport: Send + Sync {
    /// Issue a GET and return the final status and body. `timeout` bounds
    /// each attempt. Non-success statuses are returned as `Ok`; only
    /// network-level failures are errors.
    fn get<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>>;
}
