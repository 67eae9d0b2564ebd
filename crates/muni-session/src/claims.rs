//! Access-token claim decoding
//!
//! Only the payload segment is read; signatures are the backend's business.
//! A token that is not three dot-separated segments, whose payload is not
//! base64url, or whose payload is not a JSON object decodes to `None`.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Deserialize;

/// base64url that tolerates both padded and unpadded payloads
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    /// Expiry as seconds since the Unix epoch
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// Expiry in milliseconds since the Unix epoch; a zero `exp` means none
    pub fn expires_at_millis(&self) -> Option<i64> {
        self.exp
            .filter(|exp| exp.is_finite() && *exp != 0.0)
            .map(|exp| (exp * 1000.0) as i64)
    }
}

pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = PAYLOAD_ENGINE.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}
