//! Backend base URL and endpoint construction

use url::Url;

use crate::error::SessionError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase(Url);

impl ApiBase {
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input.trim())
            .map_err(|e| SessionError::InvalidBaseUrl(format!("{input}: {e}")))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SessionError::InvalidBaseUrl(format!(
                "{input}: scheme must be http or https"
            )));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(SessionError::InvalidBaseUrl(format!("{input}: missing host")));
        }

        Ok(Self(url))
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Storage origin for tokens issued by this backend
    pub fn origin(&self) -> String {
        self.0.origin().ascii_serialization()
    }

    /// Append path segments (each percent-encoded) to the base path
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.0.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl std::fmt::Display for ApiBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str().trim_end_matches('/'))
    }
}
