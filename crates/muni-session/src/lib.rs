//! Muni Docs Session Management
//!
//! Owns the access/refresh token pair for the signed-in user:
//! - Tokens persist in per-origin local storage and survive restarts
//! - The access token is renewed 60s before it expires (never sooner than 5s out)
//! - A 401 on an authenticated request triggers one renewal and one retry
//! - Every unrecoverable failure clears the tokens and sends the user to sign in
//!
//! Storage, network, clock and navigation are injected so the whole lifecycle
//! can be driven deterministically in tests.

mod claims;
mod clock;
mod endpoint;
mod error;
mod manager;
mod navigator;
mod policy;
mod transport;
mod vault;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use claims::{decode_claims, Claims};
pub use clock::{Clock, SystemClock};
pub use endpoint::ApiBase;
pub use error::SessionError;
pub use manager::{RefreshSchedule, SessionManager, SessionStart};
pub use navigator::{LoggingNavigator, Navigator};
pub use policy::{RefreshPlan, RefreshPolicy};
pub use transport::{
    ApiRequest, ApiResponse, FilePart, HttpTransport, ReqwestTransport, RequestBody,
    TransportError,
};
pub use vault::{
    token_fingerprint, IssuedTokens, TokenPair, TokenResponse, TokenStore, TokenVault,
    ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};

pub type Result<T> = std::result::Result<T, SessionError>;
