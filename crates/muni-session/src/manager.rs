//! Session Manager
//!
//! Keeps the access token alive: renews it on a timer ahead of expiry, renews
//! it on demand when the backend answers 401, and ends the session (clear
//! tokens, redirect to sign-in) whenever renewal is impossible.

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::claims::decode_claims;
use crate::clock::{Clock, SystemClock};
use crate::endpoint::ApiBase;
use crate::error::SessionError;
use crate::navigator::{LoggingNavigator, Navigator};
use crate::policy::{RefreshPlan, RefreshPolicy};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::vault::{token_fingerprint, IssuedTokens, TokenResponse, TokenStore, TokenVault};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStart {
    Authenticated(RefreshSchedule),
    /// No usable token was stored; the user was sent to sign in
    Unauthenticated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSchedule {
    /// The access token carries no decodable expiry; only 401s trigger renewal
    NoExpiry,
    /// The token was at or near expiry and a renewal already ran
    Immediate,
    Scheduled(Duration),
}

struct PendingRefresh {
    id: u64,
    delay: Duration,
    handle: JoinHandle<()>,
}

enum Renewal {
    /// This caller exchanged the refresh token
    Renewed(String),
    /// Another caller renewed while this one waited at the gate
    Reused(String),
}

impl Renewal {
    fn access_token(&self) -> &str {
        match self {
            Renewal::Renewed(token) | Renewal::Reused(token) => token,
        }
    }
}

pub struct SessionManager {
    vault: TokenVault,
    transport: Arc<dyn HttpTransport>,
    api_base: ApiBase,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
    policy: RefreshPolicy,
    /// At most one proactive renewal timer
    pending: Arc<Mutex<Option<PendingRefresh>>>,
    next_timer_id: Arc<AtomicU64>,
    /// Bumped on logout so renewals completing afterwards are discarded
    epoch: Arc<AtomicU64>,
    /// Serializes refresh-token exchanges
    renewal_gate: Arc<tokio::sync::Mutex<()>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn HttpTransport>,
        api_base: ApiBase,
    ) -> Self {
        Self {
            vault: TokenVault::new(store),
            transport,
            api_base,
            clock: Arc::new(SystemClock),
            navigator: Arc::new(LoggingNavigator),
            policy: RefreshPolicy::default(),
            pending: Arc::new(Mutex::new(None)),
            next_timer_id: Arc::new(AtomicU64::new(0)),
            epoch: Arc::new(AtomicU64::new(0)),
            renewal_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn api_base(&self) -> &ApiBase {
        &self.api_base
    }

    /// Transport for calls that must not carry credentials (sign-in, sign-up)
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::clone(&self.transport)
    }

    pub fn vault(&self) -> &TokenVault {
        &self.vault
    }

    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.vault.load()?.usable_access_token().is_some())
    }

    /// Delay of the pending proactive renewal, if one is armed
    pub fn pending_refresh_delay(&self) -> Option<Duration> {
        self.pending.lock().as_ref().map(|p| p.delay)
    }

    /// Restore the persisted session at startup
    pub async fn initialize(&self) -> Result<SessionStart> {
        let tokens = self.vault.load()?;

        if tokens.usable_access_token().is_none() {
            tracing::info!("No usable access token stored; redirecting to sign-in");
            self.logout();
            return Ok(SessionStart::Unauthenticated);
        }

        let schedule = self.schedule_proactive_refresh().await;

        tracing::info!(schedule = ?schedule, "Initialized session");

        Ok(SessionStart::Authenticated(schedule))
    }

    /// Persist tokens from a sign-in or sign-up and start renewing them
    pub async fn establish(&self, tokens: &IssuedTokens) -> Result<RefreshSchedule> {
        self.vault
            .store(&tokens.access_token, tokens.refresh_token.as_deref())?;

        tracing::info!(
            token = %token_fingerprint(&tokens.access_token),
            has_refresh_token = tokens.refresh_token.is_some(),
            "Established session"
        );

        Ok(self.schedule_proactive_refresh().await)
    }

    /// Replace any pending renewal with one derived from the current token.
    ///
    /// A token within the immediate threshold of expiry is renewed before this
    /// returns. Boxed because renewal reschedules in turn.
    pub fn schedule_proactive_refresh(&self) -> BoxFuture<'_, RefreshSchedule> {
        async move {
            self.cancel_pending();

            let access_token = match self.vault.access_token() {
                Ok(token) => token,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read access token");
                    return RefreshSchedule::NoExpiry;
                }
            };

            let Some(expires_at) = access_token
                .as_deref()
                .and_then(decode_claims)
                .and_then(|claims| claims.expires_at_millis())
            else {
                tracing::debug!("Access token has no decodable expiry; relying on 401 renewal");
                return RefreshSchedule::NoExpiry;
            };

            let time_to_expiry = expires_at.saturating_sub(self.clock.now_millis());

            match self.policy.plan(time_to_expiry) {
                RefreshPlan::Immediate => {
                    tracing::info!(
                        time_to_expiry_ms = time_to_expiry,
                        "Access token at or near expiry; renewing now"
                    );
                    // A failed renewal has already ended the session
                    let _ = self.refresh().await;
                    RefreshSchedule::Immediate
                }
                RefreshPlan::After(delay) => {
                    self.arm_timer(delay);
                    RefreshSchedule::Scheduled(delay)
                }
            }
        }
        .boxed()
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Any failure ends the session; there is no retry.
    pub async fn refresh(&self) -> Result<()> {
        let renewal = match self.vault.access_token() {
            Ok(current) => self.renew(current.as_deref()).await,
            Err(e) => Err(e),
        };

        match renewal {
            Ok(Renewal::Renewed(_)) => {
                self.schedule_proactive_refresh().await;
                Ok(())
            }
            Ok(Renewal::Reused(_)) => Ok(()),
            Err(e) => Err(self.end_session(e)),
        }
    }

    /// Clear the session and send the user to sign in. Safe to repeat.
    pub fn logout(&self) {
        self.cancel_pending();
        self.epoch.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.vault.clear() {
            tracing::error!(error = %e, "Failed to clear stored tokens");
        }

        tracing::info!("Session cleared");
        self.navigator.redirect_to_sign_in();
    }

    /// Stop background renewal without touching the stored tokens
    pub fn dispose(&self) {
        self.cancel_pending();
    }

    /// Send `request` with the stored access token, renewing once on 401.
    ///
    /// Responses other than 401 (and whatever the single retry returns) are
    /// handed back untouched for the caller to interpret.
    pub async fn authorized_fetch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let token = self.vault.access_token()?.filter(|t| !t.is_empty());

        let response = self
            .transport
            .send(&request.with_bearer(token.as_deref()))
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::info!(url = %request.url, "Request unauthorized; renewing access token");

        let renewal = match self.renew(token.as_deref()).await {
            Ok(renewal) => renewal,
            Err(e) => return Err(self.end_session(e)),
        };

        if let Renewal::Renewed(_) = renewal {
            self.schedule_proactive_refresh().await;
        }

        let retried = self
            .transport
            .send(&request.with_bearer(Some(renewal.access_token())))
            .await?;

        tracing::debug!(
            url = %request.url,
            status = retried.status().as_u16(),
            "Retried request after renewal"
        );

        Ok(retried)
    }

    async fn renew(&self, rejected: Option<&str>) -> Result<Renewal> {
        let _gate = self.renewal_gate.lock().await;

        let tokens = self.vault.load()?;

        if let Some(current) = tokens.access_token.as_deref().filter(|t| !t.is_empty()) {
            if Some(current) != rejected {
                tracing::debug!(
                    token = %token_fingerprint(current),
                    "Access token already renewed by a concurrent caller"
                );
                return Ok(Renewal::Reused(current.to_string()));
            }
        }

        let refresh_token = tokens
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::MissingRefreshToken)?;

        let epoch = self.epoch.load(Ordering::SeqCst);

        let request = ApiRequest::post(self.api_base.endpoint(&["api", "auth", "refresh"]))
            .json(&serde_json::json!({ "refreshToken": refresh_token }))?;
        let response = self.transport.send(&request).await?;

        if !response.is_success() {
            return Err(SessionError::RefreshRejected(response.status()));
        }

        let issued = response
            .json::<TokenResponse>()?
            .into_issued()
            .ok_or(SessionError::MissingAccessToken)?;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::info!("Discarding token renewal that completed after logout");
            return Err(SessionError::SessionEnded);
        }

        self.vault
            .store(&issued.access_token, issued.refresh_token.as_deref())?;

        // Logout may have slipped in between the check and the write
        if self.epoch.load(Ordering::SeqCst) != epoch {
            self.vault.clear()?;
            return Err(SessionError::SessionEnded);
        }

        tracing::info!(
            token = %token_fingerprint(&issued.access_token),
            rotated_refresh_token = issued.refresh_token.is_some(),
            "Access token renewed"
        );

        Ok(Renewal::Renewed(issued.access_token))
    }

    fn end_session(&self, cause: SessionError) -> SessionError {
        // SessionEnded means a logout already happened
        if !matches!(cause, SessionError::SessionEnded) {
            tracing::warn!(error = %cause, "Token renewal failed; ending session");
            self.logout();
        }
        SessionError::expired(cause)
    }

    fn arm_timer(&self, delay: Duration) {
        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let manager = self.clone();

        // Hold the slot while spawning so the timer cannot release it before it exists
        let mut pending = self.pending.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.release_pending(id);
            tracing::debug!("Proactive refresh timer fired");
            let _ = manager.refresh().await;
        });

        if let Some(previous) = pending.replace(PendingRefresh { id, delay, handle }) {
            previous.handle.abort();
        }
        drop(pending);

        tracing::debug!(delay_ms = delay.as_millis() as u64, "Scheduled proactive token refresh");
    }

    /// Detach a fired timer from the slot so rescheduling cannot abort it mid-renewal
    fn release_pending(&self, id: u64) {
        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|p| p.id == id) {
            pending.take();
        }
    }

    fn cancel_pending(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.handle.abort();
            tracing::debug!("Cancelled pending proactive refresh");
        }
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            vault: self.vault.clone(),
            transport: Arc::clone(&self.transport),
            api_base: self.api_base.clone(),
            clock: Arc::clone(&self.clock),
            navigator: Arc::clone(&self.navigator),
            policy: self.policy,
            pending: Arc::clone(&self.pending),
            next_timer_id: Arc::clone(&self.next_timer_id),
            epoch: Arc::clone(&self.epoch),
            renewal_gate: Arc::clone(&self.renewal_gate),
        }
    }
}
