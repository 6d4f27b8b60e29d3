//! Scripted in-process transport for tests.
//!
//! [`FakeTransport`] replaces the network with a table of routes keyed by
//! method and path (relative to [`FAKE_BASE_URL`]). Each route answers from a
//! queue of one-shot replies first and then from an optional standing reply.
//! Every attempt is recorded so tests can assert exactly which calls were
//! made, and how often.
//!
//! # Example
//!
//! ```
//! use bazaar_client::http::fake::{FakeReply, FakeTransport};
//! use reqwest::Method;
//! use serde_json::json;
//!
//! let fake = FakeTransport::new();
//! fake.respond(Method::GET, "/carts", FakeReply::ok(json!({ "items": [] })));
//! fake.enqueue(Method::POST, "/carts/add", FakeReply::network_error());
//! assert_eq!(fake.calls(&Method::GET, "/carts"), 0);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

use super::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::pipeline::REQUEST_ID_HEADER;

/// Base URL a client must be configured with to be served by the fake.
pub const FAKE_BASE_URL: &str = "http://bazaar.test/api";

const FAKE_BASE_PATH: &str = "/api";

/// What a route answers with.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// An HTTP response with a JSON body.
    Respond {
        /// Status code.
        status: u16,
        /// Body, serialized as JSON.
        body: Value,
    },
    /// A network-level failure.
    Fail(TransportError),
}

/// A reply, optionally delivered after a delay.
#[derive(Debug, Clone)]
pub struct FakeReply {
    outcome: FakeOutcome,
    delay: Duration,
}

impl FakeReply {
    /// `200` with the `{success: true, data}` envelope.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self::status(200, json!({ "success": true, "data": data }))
    }

    /// An error envelope `{success: false, message}` with the given status.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::status(status, json!({ "success": false, "message": message }))
    }

    /// An arbitrary status and raw JSON body.
    #[must_use]
    pub const fn status(status: u16, body: Value) -> Self {
        Self {
            outcome: FakeOutcome::Respond { status, body },
            delay: Duration::ZERO,
        }
    }

    /// A connection-level failure with no response.
    #[must_use]
    pub fn network_error() -> Self {
        Self {
            outcome: FakeOutcome::Fail(TransportError::Connect("connection refused".to_string())),
            delay: Duration::ZERO,
        }
    }

    /// A timed-out attempt.
    #[must_use]
    pub const fn timeout() -> Self {
        Self {
            outcome: FakeOutcome::Fail(TransportError::Timeout),
            delay: Duration::ZERO,
        }
    }

    /// Deliver this reply only after `delay` (virtual time under a paused
    /// Tokio clock).
    #[must_use]
    pub const fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One attempt the fake received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to [`FAKE_BASE_URL`].
    pub path: String,
    /// Query pairs in order.
    pub query: Vec<(String, String)>,
    /// Raw `Authorization` header, if any.
    pub authorization: Option<String>,
    /// `x-request-id` header, if any.
    pub request_id: Option<String>,
    /// JSON body.
    pub body: Option<Value>,
    /// Attempt number (0 for the first).
    pub attempt: u32,
}

#[derive(Debug)]
struct Route {
    method: Method,
    path: String,
    queued: VecDeque<FakeReply>,
    standing: Option<FakeReply>,
}

#[derive(Debug, Default)]
struct FakeState {
    routes: Vec<Route>,
    requests: Vec<RecordedRequest>,
}

/// In-process [`Transport`] answering from scripted routes.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    /// Create a fake with no routes: every request gets a `404` envelope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the standing reply for `method path`, used whenever the route's
    /// one-shot queue is empty.
    pub fn respond(&self, method: Method, path: &str, reply: FakeReply) {
        self.with_route(method, path, |route| route.standing = Some(reply));
    }

    /// Queue a one-shot reply for `method path`.
    pub fn enqueue(&self, method: Method, path: &str, reply: FakeReply) {
        self.with_route(method, path, |route| route.queued.push_back(reply));
    }

    /// All attempts received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of attempts received for `method path`.
    #[must_use]
    pub fn calls(&self, method: &Method, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| &r.method == method && r.path == path)
            .count()
    }

    /// Total number of attempts received.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.lock().requests.len()
    }

    fn with_route(&self, method: Method, path: &str, f: impl FnOnce(&mut Route)) {
        let mut state = self.lock();
        if let Some(route) = state
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            f(route);
            return;
        }
        let mut route = Route {
            method,
            path: path.to_string(),
            queued: VecDeque::new(),
            standing: None,
        };
        f(&mut route);
        state.routes.push(route);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let full_path = request.url.path();
        let path = full_path
            .strip_prefix(FAKE_BASE_PATH)
            .unwrap_or(full_path)
            .to_string();

        let reply = {
            let mut state = self.lock();
            state.requests.push(RecordedRequest {
                method: request.method.clone(),
                path: path.clone(),
                query: request
                    .url
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect(),
                authorization: request
                    .headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from),
                request_id: request
                    .headers
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from),
                body: request.body.clone(),
                attempt: request.attempt,
            });

            state
                .routes
                .iter_mut()
                .find(|r| r.method == request.method && r.path == path)
                .and_then(|route| route.queued.pop_front().or_else(|| route.standing.clone()))
        };

        let reply = reply.unwrap_or_else(|| {
            FakeReply::error(404, &format!("no fake route for {} {path}", request.method))
        });

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        match reply.outcome {
            FakeOutcome::Respond { status, body } => Ok(HttpResponse {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                body: body.to_string(),
            }),
            FakeOutcome::Fail(err) => Err(err),
        }
    }
}
