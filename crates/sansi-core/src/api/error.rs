use std::time::Duration;

use thiserror::Error;

/// Shown when the backend rejects the session without saying why.
pub const DEFAULT_SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Every way a request can fail. The `Display` text is meant to be shown
/// to the user as is.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    SessionExpired(String),

    #[error("The server did not respond within {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Unable to reach the server: {0}")]
    NetworkUnreachable(#[source] reqwest::Error),

    #[error("{message}")]
    ApplicationError { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Could not save the session: {0}")]
    Storage(String),
}

/// Fieldless view of [`ApiError`] for matching on the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SessionExpired,
    Timeout,
    NetworkUnreachable,
    ApplicationError,
    InvalidRequest,
    InvalidResponse,
    Storage,
}

/// Maximum length for response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::SessionExpired(_) => ErrorKind::SessionExpired,
            ApiError::Timeout(_) => ErrorKind::Timeout,
            ApiError::NetworkUnreachable(_) => ErrorKind::NetworkUnreachable,
            ApiError::ApplicationError { .. } => ErrorKind::ApplicationError,
            ApiError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ApiError::InvalidResponse(_) => ErrorKind::InvalidResponse,
            ApiError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        self.kind() == ErrorKind::SessionExpired
    }

    /// HTTP status for failures the server answered, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApplicationError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}
