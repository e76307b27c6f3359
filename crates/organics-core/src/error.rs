//! Operation-level error types.
//!
//! `ApiError` describes what happened on the wire; the types here describe
//! what an operation reports to its caller. They are `Clone` so a single
//! in-flight fetch can hand the same outcome to every caller that joined it.

use serde::Serialize;
use thiserror::Error;

use crate::api::ApiError;

/// Failure taxonomy shared by every fallible operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed local input; nothing was sent over the network.
    Validation,
    /// The login endpoint rejected the identifier/secret pair.
    InvalidCredentials,
    /// The session credential is no longer accepted; the session has ended.
    AuthRejected,
    /// Network failure, timeout, or a non-auth HTTP failure.
    Transport,
    /// Well-formed unsuccessful response with a server-provided reason.
    Server,
}

/// Outcome of a failed `SessionManager::login`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    MalformedRequest(String),

    #[error("{0}")]
    Unreachable(String),
}

impl LoginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoginError::Validation(_) => ErrorKind::Validation,
            LoginError::InvalidCredentials => ErrorKind::InvalidCredentials,
            LoginError::MalformedRequest(_) => ErrorKind::Server,
            LoginError::Unreachable(_) => ErrorKind::Transport,
        }
    }
}

impl From<ApiError> for LoginError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => LoginError::InvalidCredentials,
            ApiError::Validation(detail) => LoginError::MalformedRequest(detail),
            ref e if e.is_timeout() => {
                LoginError::Unreachable("Connection timed out. Please try again.".to_string())
            }
            ref e if e.is_connectivity() => LoginError::Unreachable(
                "Unable to connect to server. Check your internet connection.".to_string(),
            ),
            other => LoginError::Unreachable(format!("Login failed: {}", other)),
        }
    }
}

/// Outcome of a failed account sync operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Session expired - please sign in again")]
    AuthRejected,

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Server(String),

    #[error("Account sync has been stopped")]
    Cancelled,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::NotAuthenticated => ErrorKind::Validation,
            SyncError::AuthRejected => ErrorKind::AuthRejected,
            SyncError::Transport(_) | SyncError::Cancelled => ErrorKind::Transport,
            SyncError::Server(_) => ErrorKind::Server,
        }
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => SyncError::AuthRejected,
            ApiError::Validation(detail) => SyncError::Server(detail),
            ApiError::NotFound(detail) | ApiError::AccessDenied(detail) => SyncError::Server(detail),
            ref e if e.is_timeout() => {
                SyncError::Transport("Connection timed out. Please try again.".to_string())
            }
            ref e if e.is_connectivity() => SyncError::Transport(
                "Unable to connect to server. Check your internet connection.".to_string(),
            ),
            other => SyncError::Transport(other.to_string()),
        }
    }
}
