//! Error types for the ADT command-line client.

use thiserror::Error;

/// Result type alias for ADT client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ADT client.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Session Errors =====
    #[error("Authentication failed for user {user}: {message}")]
    Authentication { user: String, message: String },

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("CSRF token rejected by the server")]
    CsrfRejected,

    #[error("ADT session expired")]
    SessionExpired,

    // ===== Server Errors =====
    #[error("ADT error: {status} {status_text} - {message}")]
    Adt {
        status: u16,
        status_text: String,
        message: String,
    },

    // ===== Codec Errors =====
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // ===== Resource Errors =====
    #[error("Operation {operation} is not supported for object kind {kind}")]
    UnsupportedObjectKind { kind: String, operation: String },

    #[error("No abapGit repository linked to package {0}")]
    RepoNotFound(String),

    // ===== Polling Errors =====
    #[error("Timeout: operation did not reach a terminal state within {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Cancelled: operation was interrupted")]
    Cancelled,

    // ===== Transport Errors =====
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    // ===== Ambient Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an ADT error from HTTP response details.
    pub fn adt(status: u16, status_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adt {
            status,
            status_text: status_text.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn authentication(user: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Authentication {
            user: user.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported-kind error from resource model inputs.
    pub fn unsupported(kind: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedObjectKind {
            kind: kind.into(),
            operation: operation.into(),
        }
    }

    /// Check whether this error is recoverable inside the session layer
    /// by a single token refresh or re-login. Everything else propagates
    /// to the operation modules untouched.
    pub fn is_session_recoverable(&self) -> bool {
        matches!(self, Self::CsrfRejected | Self::SessionExpired)
    }

    /// Check whether this error is fatal for the whole invocation rather
    /// than for a single object or request.
    pub fn is_fatal_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}
