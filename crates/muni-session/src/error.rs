//! Session error types

use reqwest::StatusCode;
use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(#[from] muni_storage::StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid response body: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("No refresh token stored")]
    MissingRefreshToken,

    #[error("Token refresh rejected with status {0}")]
    RefreshRejected(StatusCode),

    #[error("Token refresh response carried no access token")]
    MissingAccessToken,

    #[error("Session ended while the refresh was in flight")]
    SessionEnded,

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    /// A renewal failed; tokens were cleared and the user was sent to sign in
    #[error("Session expired: {0}")]
    Expired(Box<SessionError>),
}

impl SessionError {
    pub(crate) fn expired(cause: SessionError) -> Self {
        match cause {
            SessionError::Expired(_) => cause,
            other => SessionError::Expired(Box::new(other)),
        }
    }

    /// Whether this failure ended the session (tokens cleared, user redirected)
    pub fn is_session_expired(&self) -> bool {
        matches!(self, SessionError::Expired(_))
    }
}
