//! Shared client state and response handling

use muni_session::{ApiRequest, ApiResponse, HttpTransport, SessionManager};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::Result;

/// `{error, detail}` body the backend attaches to failures
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorBody {
    /// `error`, followed by `detail` when present
    pub fn message(self) -> Option<String> {
        let error = self.error.filter(|e| !e.is_empty())?;
        Some(match self.detail.filter(|d| !d.is_empty()) {
            Some(detail) => format!("{error}: {detail}"),
            None => error,
        })
    }
}

pub struct ApiClient {
    pub(crate) session: SessionManager,
    /// Used directly for the unauthenticated auth endpoints
    pub(crate) transport: Arc<dyn HttpTransport>,
}

impl ApiClient {
    pub fn new(session: SessionManager) -> Self {
        let transport = session.transport();
        Self { session, transport }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> url::Url {
        self.session.api_base().endpoint(segments)
    }

    /// Authenticated request whose failure statuses become errors.
    ///
    /// A 401/403 that survives the session's renewal ends the session.
    pub(crate) async fn send_authorized(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let response = self.session.authorized_fetch(request).await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(url = %request.url, status = status.as_u16(), "Access denied after renewal");
            self.session.logout();
            return Err(ApiError::Unauthorized);
        }

        Ok(response)
    }
}

impl Clone for ApiClient {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

pub(crate) fn status_error(response: &ApiResponse) -> ApiError {
    ApiError::Status {
        status: response.status(),
        body: response.text(),
    }
}
