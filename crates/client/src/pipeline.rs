//! The request pipeline: the single chokepoint for backend calls.
//!
//! [`ApiClient::dispatch`] is the only way the rest of the crate talks to the
//! backend. Per logical call it:
//!
//! 1. attaches `Authorization: Bearer <token>` when the session holds one,
//!    plus an `x-request-id` shared by every attempt;
//! 2. retries network-level failures (no response at all) with a fixed
//!    backoff, up to the [`RetryPolicy`] cap. HTTP error statuses are never
//!    retried;
//! 3. tears the session down on a 401, unless the request or the current
//!    route belongs to the authentication flow;
//! 4. unwraps the `{success, data, message}` envelope and decodes `data` into
//!    the endpoint's wire type.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Instrument, debug, error, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::api::Envelope;
use crate::error::ClientError;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::session::Session;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =============================================================================
// RetryPolicy
// =============================================================================

/// Bounded retry for network-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// No retries at all.
    pub const NONE: Self = Self {
        max_retries: 0,
        backoff: Duration::ZERO,
    };

    /// Delay before the next attempt, or `None` once the cap is reached.
    #[must_use]
    pub const fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt < self.max_retries {
            Some(self.backoff)
        } else {
            None
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

// =============================================================================
// ApiRequest
// =============================================================================

/// A logical backend call, relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    auth_flow: bool,
}

impl ApiRequest {
    /// Create a request for `method path`.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            auth_flow: false,
        }
    }

    /// `GET path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `DELETE path`.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set the JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Mark the request as part of the authentication flow: a 401 answer
    /// means "bad credentials", not "session expired".
    #[must_use]
    pub const fn auth_flow(mut self) -> Self {
        self.auth_flow = true;
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the API base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the marketplace REST backend.
///
/// Cheaply cloneable; all clones share the transport and session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    transport: Arc<dyn Transport>,
    base_url: Url,
    session: Session,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Create a client over `transport`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: Url,
        session: Session,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                transport,
                base_url,
                session,
                retry,
            }),
        }
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// The API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Send `request` and decode the envelope's `data` into `T`.
    ///
    /// A missing `data` decodes as JSON `null`, so `T = Option<_>` or
    /// `serde::de::IgnoredAny` accept endpoints that return none.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] once retries are exhausted
    /// - [`ClientError::Unauthorized`] for HTTP 401
    /// - [`ClientError::Status`] for any other non-2xx status
    /// - [`ClientError::Rejected`] for a 2xx envelope with `success: false`
    /// - [`ClientError::Malformed`] if the body does not decode
    pub async fn dispatch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let request_id = Uuid::new_v4().to_string();
        let epoch = self.inner.session.epoch();
        let span = info_span!(
            "api_request",
            method = %request.method,
            path = %request.path,
            request_id = %request_id,
        );

        async move {
            let response = self.execute(&request, &request_id).await?;
            self.interpret(&request, response, epoch).await
        }
        .instrument(span)
        .await
    }

    /// Send attempts until one gets a response or the retry cap is reached.
    async fn execute(
        &self,
        request: &ApiRequest,
        request_id: &str,
    ) -> Result<HttpResponse, ClientError> {
        let mut attempt = 0;
        loop {
            let http = self.build(request, request_id, attempt).await?;
            let is_retry = http.is_retry();

            match self.inner.transport.send(http).await {
                Ok(response) => return Ok(response),
                Err(err) => match self.inner.retry.next_delay(attempt) {
                    Some(delay) => {
                        debug!(error = %err, attempt, is_retry, ?delay, "Network failure, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        warn!(error = %err, attempts = attempt + 1, "Network failure, giving up");
                        return Err(ClientError::Transport(err));
                    }
                },
            }
        }
    }

    /// Build one attempt. The token is read per attempt so a teardown between
    /// attempts is honoured.
    async fn build(
        &self,
        request: &ApiRequest,
        request_id: &str,
        attempt: u32,
    ) -> Result<HttpRequest, ClientError> {
        let mut url = join_url(&self.inner.base_url, &request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            REQUEST_ID_HEADER,
            HeaderValue::from_str(request_id).map_err(|e| ClientError::InvalidRequest(e.to_string()))?,
        );

        if let Some(token) = self.inner.session.token().await {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|_| ClientError::InvalidRequest("token is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(HttpRequest {
            method: request.method.clone(),
            url,
            headers,
            body: request.body.clone(),
            attempt,
        })
    }

    /// Map a response to a result, applying 401 teardown to the session of
    /// `epoch` only.
    async fn interpret<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        response: HttpResponse,
        epoch: u64,
    ) -> Result<T, ClientError> {
        let status = response.status;
        let envelope = serde_json::from_str::<Envelope>(&response.body);
        let message = envelope.as_ref().ok().and_then(|e| e.message.clone());

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(request, epoch).await;
            return Err(ClientError::Unauthorized { message });
        }

        if !status.is_success() {
            debug!(status = %status, message = ?message, "Request failed");
            return Err(ClientError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = envelope.map_err(|e| {
            error!(
                error = %e,
                body = %response.body.chars().take(500).collect::<String>(),
                "Response is not a JSON envelope"
            );
            ClientError::Malformed(format!("invalid envelope: {e}"))
        })?;

        if !envelope.success {
            return Err(ClientError::Rejected {
                message: envelope.message,
            });
        }

        serde_json::from_value(envelope.data.unwrap_or(Value::Null)).map_err(|e| {
            warn!(error = %e, "Response data does not match the expected shape");
            ClientError::Malformed(e.to_string())
        })
    }

    async fn handle_unauthorized(&self, request: &ApiRequest, epoch: u64) {
        let session = &self.inner.session;
        if request.auth_flow || session.in_auth_flow() {
            debug!("401 inside the authentication flow; keeping session state");
            return;
        }
        if session.teardown_if_epoch(epoch).await {
            warn!("Server rejected the session token; signed out locally");
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

/// Append `path` to the base URL, keeping the base's own path prefix.
fn join_url(base: &Url, path: &str) -> Result<Url, ClientError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| ClientError::InvalidRequest(format!("{joined}: {e}")))
}
