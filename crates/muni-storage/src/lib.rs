//! Muni Docs Storage Layer
//!
//! SQLite-based persistence for client state that must survive restarts:
//! - Per-origin local storage (the token pair lives here)
//! - Application settings (e.g. the API base URL override)

mod database;
mod error;
mod local_storage;
mod migrations;

pub use database::Database;
pub use error::StorageError;
pub use local_storage::LocalStorage;

pub type Result<T> = std::result::Result<T, StorageError>;
