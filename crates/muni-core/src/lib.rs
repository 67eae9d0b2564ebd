//! Muni Docs Core
//!
//! Configuration and wiring for the document-management client: storage,
//! session manager and API client assembled from one `Config`.

mod client;
mod config;
mod error;

pub use client::Client;
pub use config::{Config, API_BASE_URL_ENV, API_BASE_URL_SETTING, DEFAULT_API_BASE_URL};
pub use error::CoreError;

// Re-export the layers a front end talks to
pub use muni_api::{
    ApiClient, ApiError, DisplayStatus, Document, DocumentQuery, SearchAnswer, SearchSource,
    SignUpOutcome, UploadFile, UploadOutcome,
};
pub use muni_session::{
    ApiBase, LoggingNavigator, Navigator, RefreshPolicy, RefreshSchedule, SessionError,
    SessionManager, SessionStart,
};
pub use muni_storage::{Database, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
