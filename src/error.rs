//! Error types for the dashboard API client.
//!
//! Every public operation returns [`Result`], whose error side is
//! [`ClientError`]. The variants separate the failure kinds callers react to
//! differently:
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | [`ClientError::Connectivity`] | No candidate endpoint could be reached |
//! | [`ClientError::Http`] | The server answered with a non-2xx status |
//! | [`ClientError::SessionExpired`] | Authentication is lost for good; credential cleared |
//! | [`ClientError::Cancelled`] | The caller aborted the request |

use serde_json::Value;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors produced by the API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Every candidate endpoint failed at the network level.
    #[error("cannot reach server at {url}: {message}")]
    Connectivity {
        /// Last URL attempted
        url: String,
        /// Underlying transport error
        message: String,
    },

    /// Server reachable but answered with a non-success status.
    #[error("{message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Message synthesized from the response body
        message: String,
        /// Parsed response body (raw text as a JSON string when not JSON)
        body: Value,
    },

    /// The session could not be recovered after a 401.
    #[error("session expired, please sign in again")]
    SessionExpired,

    /// The caller's cancellation token fired before the request completed.
    #[error("request cancelled")]
    Cancelled,

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Credential storage could not be read or written.
    #[error("credential storage error: {0}")]
    Storage(String),

    /// The request could not be built (bad header, unserializable body, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A successful response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// True when no server could be reached at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClientError::Connectivity { .. })
    }

    /// True for the terminal authentication failure.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired)
    }

    /// True when the caller cancelled the request.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    /// HTTP status of an [`ClientError::Http`] error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}
