//! Muni Docs API Client
//!
//! Typed access to the backend:
//! - Sign-in and sign-up (unauthenticated; tokens handed to the session)
//! - Document listing, upload, public URL and summary
//! - Retrieval-augmented search over the uploaded documents
//!
//! Every authenticated call goes through `SessionManager::authorized_fetch`,
//! so token renewal stays invisible here.

mod auth;
mod client;
mod documents;
mod error;
mod search;

pub use auth::SignUpOutcome;
pub use client::ApiClient;
pub use documents::{
    DisplayStatus, Document, DocumentQuery, UploadFile, UploadOutcome, ALLOWED_EXTENSIONS,
    ALLOWED_MIME_TYPES, MAX_UPLOAD_BYTES,
};
pub use error::ApiError;
pub use search::{SearchAnswer, SearchSource};

pub type Result<T> = std::result::Result<T, ApiError>;
