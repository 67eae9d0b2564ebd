//! Retrieval-augmented search over the user's documents

use muni_session::ApiRequest;
use serde::{Deserialize, Serialize};

use crate::client::{status_error, ApiClient};
use crate::error::ApiError;
use crate::Result;

const DEFAULT_SOURCE_NAME: &str = "Documento";

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchAnswer {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SearchSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchSource {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SearchSource {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_SOURCE_NAME)
    }
}

impl ApiClient {
    pub async fn search(&self, query: &str) -> Result<SearchAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::EmptyQuery);
        }

        let request = ApiRequest::post(self.endpoint(&["api", "v1", "search"]))
            .json(&SearchRequest { query })?;
        let response = self.send_authorized(&request).await?;
        if !response.is_success() {
            return Err(status_error(&response));
        }

        let answer: SearchAnswer = response.json()?;
        tracing::debug!(sources = answer.sources.len(), "Search answered");
        Ok(answer)
    }
}
