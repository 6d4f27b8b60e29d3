//! HTTP transport seam.
//!
//! The request pipeline talks to the wire through the [`Transport`] trait so
//! the retry, authentication and envelope logic can be exercised without a
//! network.
//!
//! - [`client::ReqwestTransport`] - production transport over `reqwest`
//! - `fake::FakeTransport` - scripted in-process transport for tests, built
//!   under `cfg(test)` or the `test-util` feature
//!
//! A transport reports an error only when no HTTP response was received at
//! all. Any response, including 4xx and 5xx, is returned as
//! [`HttpResponse`] and interpreted by the pipeline.

pub mod client;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use thiserror::Error;
use url::Url;

pub use client::ReqwestTransport;

/// Network-level failures: the request produced no HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The attempt did not complete within the request timeout.
    #[error("Request timed out")]
    Timeout,

    /// The server could not be reached.
    #[error("Unable to reach the server: {0}")]
    Connect(String),

    /// Any other failure before a complete response was read.
    #[error("Network error: {0}")]
    Network(String),
}

/// A fully built outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including query string.
    pub url: Url,
    /// Headers, including authorization when a session is present.
    pub headers: HeaderMap,
    /// JSON body.
    pub body: Option<serde_json::Value>,
    /// Zero for the first attempt, incremented for each retry.
    pub attempt: u32,
}

impl HttpRequest {
    /// Whether this attempt is itself a retry.
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        self.attempt > 0
    }
}

/// A received HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Raw response body.
    pub body: String,
}

/// Sends a single request attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one attempt of `request`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response was received.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
