//! Persisted token pair

use muni_storage::LocalStorage;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::Result;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Placeholder some older page builds wrote instead of a real token
const UNDEFINED_PLACEHOLDER: &str = "undefined";

/// Durable string storage keyed by fixed names
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;
    fn remove_many(&self, keys: &[&str]) -> Result<()>;
}

impl TokenStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_item(key)?)
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        Ok(self.set_items(entries)?)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        Ok(self.remove_items(keys)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// An access token that can actually be presented to the backend
    pub fn usable_access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty() && *t != UNDEFINED_PLACEHOLDER)
    }
}

/// Token-bearing body of the sign-in, sign-up and refresh endpoints.
///
/// The backend either nests the pair under `session` or returns it flat;
/// nested values take precedence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    session: Option<SessionTokens>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SessionTokens {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    pub fn access_token(&self) -> Option<&str> {
        let nested = self.session.as_ref().and_then(|s| s.access_token.as_deref());
        non_empty(nested).or_else(|| non_empty(self.access_token.as_deref()))
    }

    pub fn refresh_token(&self) -> Option<&str> {
        let nested = self
            .session
            .as_ref()
            .and_then(|s| s.refresh_token.as_deref());
        non_empty(nested).or_else(|| non_empty(self.refresh_token.as_deref()))
    }

    /// The tokens carried by this response, if it carries an access token
    pub fn into_issued(self) -> Option<IssuedTokens> {
        let access_token = self.access_token()?.to_string();
        let refresh_token = self.refresh_token().map(str::to_string);
        Some(IssuedTokens {
            access_token,
            refresh_token,
        })
    }
}

/// Tokens handed out by a successful sign-in, sign-up or refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Short stable identifier for a token, safe to log
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// Reads and writes the token pair as a unit
#[derive(Clone)]
pub struct TokenVault {
    store: Arc<dyn TokenStore>,
}

impl TokenVault {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.store.get(ACCESS_TOKEN_KEY)?,
            refresh_token: self.store.get(REFRESH_TOKEN_KEY)?,
        })
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    /// Store a new access token; the refresh token is replaced only when given
    pub fn store(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        match refresh_token {
            Some(refresh) => self
                .store
                .set_many(&[(ACCESS_TOKEN_KEY, access_token), (REFRESH_TOKEN_KEY, refresh)]),
            None => self.store.set_many(&[(ACCESS_TOKEN_KEY, access_token)]),
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY])
    }
}
