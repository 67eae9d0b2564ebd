//! Test doubles for the session seams
//!
//! Enabled for this crate's tests and, through the `testing` feature, for
//! dependent crates' tests.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use muni_storage::{Database, LocalStorage};
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::endpoint::ApiBase;
use crate::manager::SessionManager;
use crate::navigator::Navigator;
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, TransportError};
use crate::vault::{TokenPair, TokenVault};

/// Unix time (ms) every test session starts at; a whole number of seconds
pub const TEST_EPOCH_MILLIS: i64 = 1_700_000_000_000;

pub const TEST_BASE_URL: &str = "http://localhost:3000";

type Handler = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Transport answering from a closure and recording every request.
///
/// Each send yields to the scheduler first (and sleeps for the configured
/// latency) so concurrent callers genuinely interleave.
pub struct FakeTransport {
    handler: Box<Handler>,
    latency: Option<Duration>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            latency: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.url.path() == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().push(request.clone());
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        (self.handler)(request)
    }
}

pub fn json_response(status: u16, body: serde_json::Value) -> Result<ApiResponse, TransportError> {
    let status = StatusCode::from_u16(status).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    Ok(ApiResponse::new(status, body.to_string()))
}

pub fn status_response(status: u16) -> Result<ApiResponse, TransportError> {
    let status = StatusCode::from_u16(status).map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
    Ok(ApiResponse::new(status, Vec::new()))
}

pub fn connection_refused() -> Result<ApiResponse, TransportError> {
    Err(TransportError::Connection("connection refused".to_string()))
}

/// Wall clock that advances with tokio's (possibly paused) timer clock
pub struct TokioClock {
    origin_millis: i64,
    start: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(origin_millis: i64) -> Self {
        Self {
            origin_millis,
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now_millis(&self) -> i64 {
        self.origin_millis + self.start.elapsed().as_millis() as i64
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    redirects: AtomicUsize,
}

impl RecordingNavigator {
    pub fn redirects(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn redirect_to_sign_in(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Unsigned JWT-shaped token expiring at `exp_secs` (Unix seconds)
pub fn jwt_with_exp(exp_secs: i64) -> String {
    jwt_with_claims(&serde_json::json!({ "exp": exp_secs, "sub": "user-1" }))
}

/// Unsigned JWT-shaped token expiring `secs` after [`TEST_EPOCH_MILLIS`]
pub fn jwt_expiring_in(secs: i64) -> String {
    jwt_with_exp(TEST_EPOCH_MILLIS / 1000 + secs)
}

pub fn jwt_with_claims(claims: &serde_json::Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode("signature")
    )
}

/// A session manager wired to fakes and an in-memory database
pub struct TestSession {
    pub manager: SessionManager,
    pub transport: Arc<FakeTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub storage: LocalStorage,
    pub vault: TokenVault,
}

impl TestSession {
    /// Must be called inside a tokio runtime
    pub fn new(transport: FakeTransport) -> Self {
        let db = Database::open_in_memory().expect("in-memory database");
        let api_base = ApiBase::parse(TEST_BASE_URL).expect("test base url");
        let storage = db.local_storage(api_base.origin());
        let transport = Arc::new(transport);
        let navigator = Arc::new(RecordingNavigator::default());

        let manager = SessionManager::new(Arc::new(storage.clone()), transport.clone(), api_base)
            .with_clock(Arc::new(TokioClock::new(TEST_EPOCH_MILLIS)))
            .with_navigator(navigator.clone());
        let vault = TokenVault::new(Arc::new(storage.clone()));

        Self {
            manager,
            transport,
            navigator,
            storage,
            vault,
        }
    }

    pub fn with_tokens(self, access_token: &str, refresh_token: Option<&str>) -> Self {
        self.vault
            .store(access_token, refresh_token)
            .expect("seed tokens");
        self
    }

    pub fn tokens(&self) -> TokenPair {
        self.vault.load().expect("load tokens")
    }
}
