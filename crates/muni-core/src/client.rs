//! Client facade

use muni_api::ApiClient;
use muni_session::{
    ApiBase, HttpTransport, LoggingNavigator, Navigator, ReqwestTransport, SessionManager,
    SessionStart, SystemClock,
};
use muni_storage::Database;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::Result;

/// Storage, session and API client sharing one configuration
pub struct Client {
    config: Config,
    db: Database,
    api_base: ApiBase,
    session: SessionManager,
    api: ApiClient,
}

impl Client {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_navigator(config, Arc::new(LoggingNavigator))
    }

    pub fn with_navigator(config: Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let transport =
            ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        Self::with_transport(config, Arc::new(transport), navigator)
    }

    pub fn with_transport(
        config: Config,
        transport: Arc<dyn HttpTransport>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&config.database_path)?;
        let api_base = config.resolve_api_base(&db)?;
        let origin = config.origin.clone().unwrap_or_else(|| api_base.origin());
        let storage = db.local_storage(origin.clone());

        let session = SessionManager::new(Arc::new(storage), transport, api_base.clone())
            .with_clock(Arc::new(SystemClock))
            .with_navigator(navigator)
            .with_policy(config.refresh);
        let api = ApiClient::new(session.clone());

        tracing::info!(
            database = %config.database_path.display(),
            api_base = %api_base,
            origin = %origin,
            "Client initialized"
        );

        Ok(Self {
            config,
            db,
            api_base,
            session,
            api,
        })
    }

    /// Restore the stored session and start proactive renewal
    pub async fn start(&self) -> Result<SessionStart> {
        Ok(self.session.initialize().await?)
    }

    /// Stop background renewal; stored tokens are kept
    pub fn shutdown(&self) {
        self.session.dispose();
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn api_base(&self) -> &ApiBase {
        &self.api_base
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl Clone for Client {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            db: self.db.clone(),
            api_base: self.api_base.clone(),
            session: self.session.clone(),
            api: self.api.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muni_session::testing::{
        json_response, jwt_with_claims, FakeTransport, RecordingNavigator,
    };
    use muni_session::RefreshSchedule;
    use serde_json::json;

    fn temp_config(name: &str) -> Config {
        let dir = std::env::temp_dir().join(format!("muni-core-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let mut config = Config::new(dir);
        config.api_base_url = Some("http://localhost:3000".to_string());
        config
    }

    fn cleanup(config: &Config) {
        if let Some(dir) = config.database_path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    fn build(config: Config, transport: Arc<FakeTransport>) -> (Client, Arc<RecordingNavigator>) {
        let navigator = Arc::new(RecordingNavigator::default());
        let client = Client::with_transport(config, transport, navigator.clone()).unwrap();
        (client, navigator)
    }

    #[tokio::test]
    async fn test_start_without_tokens_redirects() {
        let transport = Arc::new(FakeTransport::new(|_| json_response(200, json!({}))));
        let (client, navigator) = build(temp_config("anonymous"), transport.clone());

        assert_eq!(client.start().await.unwrap(), SessionStart::Unauthenticated);
        assert_eq!(navigator.redirects(), 1);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_session_survives_restart() {
        let access = jwt_with_claims(&json!({ "sub": "user-1" }));
        let body = json!({ "access_token": &access, "refresh_token": "r1" });
        let transport = Arc::new(FakeTransport::new(move |_| json_response(200, body.clone())));
        let config = temp_config("restart");

        let (client, _) = build(config.clone(), transport.clone());
        client.api().sign_in("ana@muni.gob", "secret").await.unwrap();
        client.shutdown();
        drop(client);

        let (restarted, navigator) = build(config.clone(), transport);
        assert_eq!(
            restarted.start().await.unwrap(),
            SessionStart::Authenticated(RefreshSchedule::NoExpiry)
        );
        assert_eq!(navigator.redirects(), 0);
        assert!(restarted.session().is_authenticated().unwrap());

        cleanup(&config);
    }

    #[tokio::test]
    async fn test_tokens_partitioned_by_backend_origin() {
        let access = jwt_with_claims(&json!({ "sub": "user-1" }));
        let body = json!({ "access_token": &access });
        let transport = Arc::new(FakeTransport::new(move |_| json_response(200, body.clone())));
        let config = temp_config("origin");

        let (client, _) = build(config.clone(), transport.clone());
        client.api().sign_in("ana@muni.gob", "secret").await.unwrap();
        assert_eq!(client.api_base().origin(), "http://localhost:3000");
        drop(client);

        let mut other = config.clone();
        other.api_base_url = Some("https://docs.muni.gob".to_string());
        let (other_client, navigator) = build(other, transport);

        assert_eq!(
            other_client.start().await.unwrap(),
            SessionStart::Unauthenticated
        );
        assert_eq!(navigator.redirects(), 1);

        cleanup(&config);
    }
}
