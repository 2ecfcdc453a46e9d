//! Error types for the Travel Companion client

use thiserror::Error;

use crate::backend::BackendError;
use crate::storage::StorageError;
use crate::transport::ResponseBody;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error
#[derive(Debug, Error)]
pub enum ClientError {
    /// Server rejected the credential (401 or 403).
    ///
    /// The session signal has already been raised when this is returned,
    /// so callers must not surface it as a per-call message.
    #[error("Session rejected by server (HTTP {status})")]
    Auth { status: u16 },

    /// Any other non-2xx response
    #[error("Request failed with HTTP {status}")]
    Request { status: u16, body: ResponseBody },

    /// No response was received
    #[error("Network error: {0}")]
    Network(#[from] BackendError),

    /// Response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Persisted session storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input rejected before any request was made
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl ClientError {
    /// Whether this is the distinguished authentication failure.
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth { .. })
    }

    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Auth { status } | ClientError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message provided by the server in the error body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Request { body, .. } => body.message(),
            _ => None,
        }
    }

    /// Text to show the user for this failure.
    ///
    /// Returns `None` for [`ClientError::Auth`]: the re-authentication prompt
    /// driven by the session signal covers it.
    pub fn user_message(&self, fallback: &str) -> Option<String> {
        match self {
            ClientError::Auth { .. } => None,
            ClientError::Invalid(reason) => Some(reason.clone()),
            other => Some(
                other
                    .server_message()
                    .map(str::to_owned)
                    .unwrap_or_else(|| fallback.to_owned()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = ClientError::Request {
            status: 400,
            body: ResponseBody::Json(json!({"status": 400, "message": "Username already taken"})),
        };
        assert_eq!(
            err.user_message("Registration failed").as_deref(),
            Some("Username already taken")
        );
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_user_message_falls_back() {
        let err = ClientError::Request {
            status: 500,
            body: ResponseBody::Text("Internal Server Error".into()),
        };
        assert_eq!(err.user_message("Failed to add place").as_deref(), Some("Failed to add place"));

        let err = ClientError::Network(BackendError::Connection("refused".into()));
        assert_eq!(err.user_message("Failed to add place").as_deref(), Some("Failed to add place"));
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_auth_error_has_no_user_message() {
        let err = ClientError::Auth { status: 401 };
        assert!(err.is_auth());
        assert!(err.user_message("anything").is_none());
    }
}
