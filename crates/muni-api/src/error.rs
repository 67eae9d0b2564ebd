//! API error types

use muni_session::{SessionError, TransportError};
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Connection error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    DuplicateEmail(String),

    #[error("Registration failed with status {0}")]
    RegistrationFailed(StatusCode),

    #[error("Signed in but the backend returned no access token")]
    MissingToken,

    #[error("Not authorized; sign in again")]
    Unauthorized,

    #[error("Request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Rejected by the backend: {0}")]
    Rejected(String),

    #[error("Search query is empty")]
    EmptyQuery,

    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
}

impl ApiError {
    /// The session ended and the user has to sign in again
    pub fn is_session_expired(&self) -> bool {
        match self {
            ApiError::Session(e) => e.is_session_expired(),
            ApiError::Unauthorized => true,
            _ => false,
        }
    }

    /// The backend could not be reached at all
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ApiError::Transport(_) | ApiError::Session(SessionError::Transport(_))
        )
    }
}
