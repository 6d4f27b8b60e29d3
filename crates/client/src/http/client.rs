//! `reqwest`-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use super::{HttpRequest, HttpResponse, Transport, TransportError};

/// Production transport over a shared `reqwest::Client`.
///
/// The client-wide timeout bounds each attempt; the pipeline counts a
/// timed-out attempt as a network-level failure.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose attempts time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] if the HTTP client fails to build
    /// (e.g. the TLS backend cannot be initialized).
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        trace!(status = %status, bytes = body.len(), "Received response");

        Ok(HttpResponse { status, body })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
