//! Unified client error with user-facing message normalization.
//!
//! Every failure a caller can observe is a [`ClientError`]. Callers that need
//! to show something to the user should call [`ClientError::user_message`]
//! rather than inspecting variants: it resolves the server's message first,
//! then the transport's, then a generic fallback.

use bazaar_core::QuantityError;
use thiserror::Error;

use crate::http::TransportError;
use crate::session::StoreError;

/// Shown when nothing more specific is available.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Shown for any 5xx response.
pub const SERVER_FAULT_MESSAGE: &str =
    "The server ran into a problem. Please try again in a moment.";

/// Shown for cart/wishlist/follow actions attempted without a session.
pub const LOGIN_REQUIRED_MESSAGE: &str = "Please log in to continue.";

/// Errors surfaced by the Bazaar client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No response was received, after all retries.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server rejected the session (HTTP 401).
    #[error("Unauthorized: {}", message.as_deref().unwrap_or("authentication required"))]
    Unauthorized {
        /// Server-provided message.
        message: Option<String>,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {}", message.as_deref().unwrap_or("no message"))]
    Status {
        /// HTTP status code.
        status: u16,
        /// Server-provided message.
        message: Option<String>,
    },

    /// A 2xx response whose envelope reported `success: false`.
    #[error("Rejected: {}", message.as_deref().unwrap_or("no message"))]
    Rejected {
        /// Server-provided message.
        message: Option<String>,
    },

    /// The response body did not match the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The operation needs a signed-in session and none is present.
    #[error("No active session")]
    NoSession,

    /// A cart quantity below 1 was requested.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// Reading or writing the persisted session failed.
    #[error("Session storage error: {0}")]
    Store(#[from] StoreError),

    /// The request could not be built (bad path, bad header value).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// The message the server attached to the failure, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message }
            | Self::Status { message, .. }
            | Self::Rejected { message } => message.as_deref().filter(|m| !m.trim().is_empty()),
            _ => None,
        }
    }

    /// HTTP status, for errors that came from a response.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure came from the server rather than the client.
    #[must_use]
    pub const fn is_server_fault(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status >= 500)
    }

    /// A human-readable message suitable for a transient notice.
    ///
    /// Priority: server-provided message, then transport-level message, then
    /// a generic fallback. Server faults (5xx) always use the generic server
    /// message so internal details never reach the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.is_server_fault() {
            return SERVER_FAULT_MESSAGE.to_string();
        }
        if let Some(message) = self.server_message() {
            return message.to_string();
        }
        match self {
            Self::Transport(err) => err.to_string(),
            Self::NoSession => LOGIN_REQUIRED_MESSAGE.to_string(),
            Self::InvalidQuantity(_) => "Quantity must be at least 1.".to_string(),
            Self::Unauthorized { .. } => "Your session has expired. Please log in again.".to_string(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_takes_priority() {
        let err = ClientError::Status {
            status: 422,
            message: Some("Product is out of stock".to_string()),
        };
        assert_eq!(err.user_message(), "Product is out of stock");
    }

    #[test]
    fn test_transport_message_when_no_server_message() {
        let err = ClientError::Transport(TransportError::Timeout);
        assert_eq!(err.user_message(), "Request timed out");
    }

    #[test]
    fn test_generic_fallback() {
        let err = ClientError::Status {
            status: 404,
            message: None,
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);

        let err = ClientError::Malformed("missing items".to_string());
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_blank_server_message_is_ignored() {
        let err = ClientError::Rejected {
            message: Some("   ".to_string()),
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_server_fault_hides_details() {
        let err = ClientError::Status {
            status: 500,
            message: Some("MongoError: connection pool closed".to_string()),
        };
        assert!(err.is_server_fault());
        assert_eq!(err.user_message(), SERVER_FAULT_MESSAGE);
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::Status {
            status: 400,
            message: Some("bad".to_string()),
        };
        assert_eq!(err.to_string(), "HTTP 400: bad");
        assert_eq!(err.status(), Some(400));
        assert_eq!(ClientError::NoSession.user_message(), LOGIN_REQUIRED_MESSAGE);
    }
}
