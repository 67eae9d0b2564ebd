//! Client configuration

use muni_session::{ApiBase, RefreshPolicy};
use muni_storage::Database;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::Result;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

/// Environment variable overriding the backend base URL
pub const API_BASE_URL_ENV: &str = "MUNI_API_BASE_URL";

/// Setting key persisting the backend base URL between runs
pub const API_BASE_URL_SETTING: &str = "api_base_url";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Storage partition for tokens; the backend's origin when unset
    pub origin: Option<String>,
    /// Backend base URL; takes precedence over the persisted setting
    pub api_base_url: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    #[serde(skip)]
    pub refresh: RefreshPolicy,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("muni.db"),
            origin: None,
            api_base_url: None,
            request_timeout_secs: 30,
            refresh: RefreshPolicy::default(),
        }
    }

    /// Default configuration with the base URL taken from the environment
    pub fn from_env() -> Self {
        Self {
            api_base_url: std::env::var(API_BASE_URL_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty()),
            ..Self::default()
        }
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("muni-docs"))
            .unwrap_or_else(|| PathBuf::from(".muni-docs"))
    }

    /// Backend base URL: explicit override, then persisted setting, then default
    pub fn resolve_api_base(&self, db: &Database) -> Result<ApiBase> {
        let configured = match self.api_base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => Some(url.to_string()),
            None => db
                .get_setting(API_BASE_URL_SETTING)?
                .filter(|u| !u.trim().is_empty()),
        };

        let base = ApiBase::parse(configured.as_deref().unwrap_or(DEFAULT_API_BASE_URL))?;
        tracing::debug!(api_base = %base, "Resolved API base URL");
        Ok(base)
    }

    /// Validate and persist a base URL for later runs
    pub fn save_api_base_url(db: &Database, input: &str) -> Result<ApiBase> {
        let base = ApiBase::parse(input)?;
        db.set_setting(API_BASE_URL_SETTING, &base.to_string())?;
        tracing::info!(api_base = %base, "Saved API base URL");
        Ok(base)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
