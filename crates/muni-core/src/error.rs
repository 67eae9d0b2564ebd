//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] muni_storage::StorageError),

    #[error("Session error: {0}")]
    Session(#[from] muni_session::SessionError),

    #[error("Transport error: {0}")]
    Transport(#[from] muni_session::TransportError),

    #[error("API error: {0}")]
    Api(#[from] muni_api::ApiError),

    #[error("Configuration error: {0}")]
    Config(String),
}

// Filesystem failures only occur while preparing the data directory
impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}
