//! Sign-in and sign-up
//!
//! These endpoints are called without credentials, straight on the
//! transport; the issued tokens are handed to the session manager.

use muni_session::{ApiRequest, RefreshSchedule, TokenResponse};
use reqwest::StatusCode;
use serde::Serialize;

use crate::client::{ApiClient, ErrorBody};
use crate::error::ApiError;
use crate::Result;

const DUPLICATE_EMAIL_MESSAGE: &str = "El correo ya existe, utiliza otro";

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(RefreshSchedule),
    /// The account exists but no token could be obtained; sign in manually
    RegisteredSignInRequired,
}

impl ApiClient {
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<RefreshSchedule> {
        let response = self.post_credentials("signin", email, password).await?;
        if !response.is_success() {
            tracing::info!(status = response.status().as_u16(), "Sign-in rejected");
            return Err(ApiError::InvalidCredentials);
        }

        let tokens = response
            .json::<TokenResponse>()?
            .into_issued()
            .ok_or(ApiError::MissingToken)?;

        Ok(self.session.establish(&tokens).await?)
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let response = self.post_credentials("signup", email, password).await?;
        let status = response.status();

        if status == StatusCode::CONFLICT {
            let message = response
                .json::<ErrorBody>()
                .ok()
                .and_then(|body| body.error)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DUPLICATE_EMAIL_MESSAGE.to_string());
            return Err(ApiError::DuplicateEmail(message));
        }
        if !status.is_success() {
            return Err(ApiError::RegistrationFailed(status));
        }

        if let Some(tokens) = response.json::<TokenResponse>()?.into_issued() {
            let schedule = self.session.establish(&tokens).await?;
            return Ok(SignUpOutcome::SignedIn(schedule));
        }

        tracing::info!("Sign-up returned no token, signing in");
        match self.sign_in(email, password).await {
            Ok(schedule) => Ok(SignUpOutcome::SignedIn(schedule)),
            Err(e @ ApiError::Session(_)) => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Sign-in after sign-up failed");
                Ok(SignUpOutcome::RegisteredSignInRequired)
            }
        }
    }

    async fn post_credentials(
        &self,
        action: &str,
        email: &str,
        password: &str,
    ) -> Result<muni_session::ApiResponse> {
        let request = ApiRequest::post(self.endpoint(&["api", "auth", action]))
            .json(&Credentials { email, password })?;
        Ok(self.transport.send(&request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muni_session::testing::{
        json_response, status_response, jwt_expiring_in, FakeTransport, TestSession,
    };
    use muni_session::RequestBody;
    use serde_json::json;
    use std::time::Duration;

    fn client(transport: FakeTransport) -> (ApiClient, TestSession) {
        let session = TestSession::new(transport);
        (ApiClient::new(session.manager.clone()), session)
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_stores_tokens_and_schedules() {
        let access = jwt_expiring_in(3600);
        let body = json!({ "session": { "access_token": &access, "refresh_token": "r1" } });
        let (client, session) = client(FakeTransport::new(move |_| json_response(200, body.clone())));

        let schedule = client.sign_in("ana@muni.gob", "secret").await.unwrap();

        assert_eq!(schedule, RefreshSchedule::Scheduled(Duration::from_secs(3540)));
        let tokens = session.tokens();
        assert_eq!(tokens.access_token.as_deref(), Some(access.as_str()));
        assert_eq!(tokens.refresh_token.as_deref(), Some("r1"));

        let requests = session.transport.requests_to("/api/auth/signin");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header_value("Authorization"), None);
        assert_eq!(
            requests[0].body,
            RequestBody::Json(br#"{"email":"ana@muni.gob","password":"secret"}"#.to_vec())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_rejected() {
        let (client, session) = client(FakeTransport::new(|_| {
            json_response(400, json!({ "error": "Invalid login credentials" }))
        }));

        let err = client.sign_in("ana@muni.gob", "wrong").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
        assert_eq!(session.tokens().access_token, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_without_token() {
        let (client, _session) =
            client(FakeTransport::new(|_| json_response(200, json!({ "user": { "id": 1 } }))));

        let err = client.sign_in("ana@muni.gob", "secret").await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_up_duplicate_email() {
        let (client, _session) = client(FakeTransport::new(|_| {
            json_response(409, json!({ "error": "Email already registered" }))
        }));

        match client.sign_up("ana@muni.gob", "secret").await.unwrap_err() {
            ApiError::DuplicateEmail(message) => assert_eq!(message, "Email already registered"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_up_duplicate_email_without_body() {
        let (client, _session) = client(FakeTransport::new(|_| status_response(409)));

        match client.sign_up("ana@muni.gob", "secret").await.unwrap_err() {
            ApiError::DuplicateEmail(message) => assert_eq!(message, DUPLICATE_EMAIL_MESSAGE),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_up_other_failure() {
        let (client, _session) = client(FakeTransport::new(|_| status_response(422)));

        let err = client.sign_up("ana@muni.gob", "short").await.unwrap_err();
        assert!(matches!(err, ApiError::RegistrationFailed(s) if s == StatusCode::UNPROCESSABLE_ENTITY));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_up_with_token_signs_in() {
        let access = jwt_expiring_in(3600);
        let body = json!({ "access_token": &access, "refresh_token": "r1" });
        let (client, session) = client(FakeTransport::new(move |_| json_response(201, body.clone())));

        let outcome = client.sign_up("ana@muni.gob", "secret").await.unwrap();

        assert!(matches!(outcome, SignUpOutcome::SignedIn(_)));
        assert_eq!(session.tokens().refresh_token.as_deref(), Some("r1"));
        assert!(session.transport.requests_to("/api/auth/signin").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_up_without_token_falls_back_to_sign_in() {
        let access = jwt_expiring_in(3600);
        let signin = json!({ "session": { "access_token": &access, "refresh_token": "r2" } });
        let (client, session) = client(FakeTransport::new(move |request| {
            match request.url.path() {
                "/api/auth/signup" => json_response(200, json!({ "user": { "id": 7 } })),
                _ => json_response(200, signin.clone()),
            }
        }));

        let outcome = client.sign_up("ana@muni.gob", "secret").await.unwrap();

        assert!(matches!(outcome, SignUpOutcome::SignedIn(_)));
        assert_eq!(session.transport.requests_to("/api/auth/signin").len(), 1);
        assert_eq!(session.tokens().access_token.as_deref(), Some(access.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_up_when_fallback_sign_in_fails() {
        let (client, session) = client(FakeTransport::new(|request| match request.url.path() {
            "/api/auth/signup" => json_response(200, json!({ "user": { "id": 7 } })),
            _ => status_response(400),
        }));

        let outcome = client.sign_up("ana@muni.gob", "secret").await.unwrap();

        assert_eq!(outcome, SignUpOutcome::RegisteredSignInRequired);
        assert_eq!(session.tokens().access_token, None);
        assert_eq!(session.navigator.redirects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failure() {
        let (client, _session) =
            client(FakeTransport::new(|_| muni_session::testing::connection_refused()));

        let err = client.sign_in("ana@muni.gob", "secret").await.unwrap_err();
        assert!(err.is_connectivity());
    }
}
