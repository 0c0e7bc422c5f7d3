//! # API Client
//!
//! HTTP client for the hosted auth and REST API, plus the provider-side
//! session it owns.
//!
//! The session is persisted in the durable key/value store under
//! [`SESSION_STORAGE_KEY`] so that a new process resumes the previous login,
//! and it is refreshed automatically shortly before the access token expires.

use std::sync::Arc;
use std::time::Duration;

use lib_auth::provider::SESSION_CHANNEL_CAPACITY;
use lib_auth::KeyValueStore;
use lib_core::{AppError, Config, Result};
use lib_utils::now_secs;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{ProviderSession, SessionChange, SessionEvent};
use tokio::sync::{broadcast, Mutex};

use super::wire::{ErrorBody, TokenResponse};

/// Store slot holding the provider session as JSON.
pub const SESSION_STORAGE_KEY: &str = "sb-auth-token";

/// Sent as `x-client-info` on every request.
const CLIENT_INFO: &str = concat!("tradeprem-client/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Access tokens expiring within this many seconds are refreshed before use.
const REFRESH_LEEWAY_SECS: i64 = 60;

/// HTTP client for communicating with the backend.
///
/// Holds a connection pool and the current provider session. Share it
/// behind an `Arc`; it implements the identity, credentials and profile
/// traits of `lib-auth`.
pub struct ApiClient {
    pub(crate) client: Client,
    base_url: String,
    anon_key: String,
    store: Arc<dyn KeyValueStore>,
    session: RwLock<Option<ProviderSession>>,
    changes: broadcast::Sender<SessionChange>,
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    /// Create a client for `base_url`, resuming any session persisted in `store`.
    ///
    /// The client is configured with a 10 second timeout to prevent hangs.
    pub fn new(
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let anon_key = anon_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&anon_key)
                .map_err(|e| AppError::Config(format!("Invalid anon key: {}", e)))?,
        );
        headers.insert("x-client-info", HeaderValue::from_static(CLIENT_INFO));

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let session = load_session(store.as_ref());
        let (changes, _) = broadcast::channel(SESSION_CHANNEL_CAPACITY);

        tracing::debug!(
            base_url = %base_url,
            resumed_session = session.is_some(),
            "API client created"
        );

        Ok(Self {
            client,
            base_url,
            anon_key,
            store,
            session: RwLock::new(session),
            changes,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn from_config(config: &Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        Self::new(&config.backend_url, &config.anon_key, store)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bearer for data requests: the session's access token, or the anon key when signed out.
    pub(crate) fn bearer(&self) -> String {
        self.session
            .read()
            .as_ref()
            .map(|session| session.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone())
    }

    /// Current provider session, without refreshing it.
    pub fn session(&self) -> Option<ProviderSession> {
        self.session.read().clone()
    }

    pub(crate) fn changes(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    /// Replace the session, persist it, and notify subscribers with `event`.
    pub(crate) fn set_session(&self, session: Option<ProviderSession>, event: SessionEvent) {
        *self.session.write() = session.clone();
        self.persist(session.as_ref());

        tracing::debug!(event = ?event, has_session = session.is_some(), "Provider session changed");
        // No subscribers is fine
        let _ = self.changes.send(SessionChange { event, session });
    }

    fn persist(&self, session: Option<&ProviderSession>) {
        let result = match session {
            Some(session) => serde_json::to_string(session)
                .map_err(AppError::from)
                .and_then(|json| self.store.set(SESSION_STORAGE_KEY, &json)),
            None => self.store.remove(SESSION_STORAGE_KEY),
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist provider session");
        }
    }

    /// The current session, refreshed first if its access token is about to expire.
    ///
    /// A refresh the backend rejects ends the session (`SignedOut`) and yields
    /// `None`; a refresh that cannot reach the backend is an error and the
    /// session is kept for the next attempt.
    pub(crate) async fn valid_session(&self) -> Result<Option<ProviderSession>> {
        let current = self.session();
        match current {
            Some(session) if !session.expires_within(now_secs(), REFRESH_LEEWAY_SECS) => {
                return Ok(Some(session))
            }
            None => return Ok(None),
            Some(_) => {}
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        let current = self.session();
        let session = match current {
            Some(session) if !session.expires_within(now_secs(), REFRESH_LEEWAY_SECS) => {
                return Ok(Some(session))
            }
            Some(session) => session,
            None => return Ok(None),
        };

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            tracing::info!(user_id = %session.user.id, "Session expired without a refresh token");
            self.set_session(None, SessionEvent::SignedOut);
            return Ok(None);
        };

        match self.refresh(refresh_token).await {
            Ok(fresh) => {
                tracing::info!(user_id = %fresh.user.id, "Access token refreshed");
                self.set_session(Some(fresh.clone()), SessionEvent::TokenRefreshed);
                Ok(Some(fresh))
            }
            Err(AppError::Auth(message)) => {
                tracing::warn!(error = %message, "Refresh token rejected; signing out");
                self.set_session(None, SessionEvent::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    #[tracing::instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<ProviderSession> {
        let response = self
            .client
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| network_error(e, "Token refresh"))?;

        let token: TokenResponse = read_json(response, "Token refresh").await?;
        Ok(token.into_session(now_secs()))
    }
}

fn load_session(store: &dyn KeyValueStore) -> Option<ProviderSession> {
    let raw = match store.get(SESSION_STORAGE_KEY) {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read persisted provider session");
            return None;
        }
    };

    match serde_json::from_str::<ProviderSession>(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::warn!(error = %e, "Discarding unreadable provider session");
            if let Err(e) = store.remove(SESSION_STORAGE_KEY) {
                tracing::warn!(error = %e, "Failed to remove provider session");
            }
            None
        }
    }
}

pub(crate) fn network_error(e: reqwest::Error, context: &str) -> AppError {
    tracing::error!(error = %e, "{} network error", context);
    AppError::Api(format!("Network error: {}", e))
}

/// Decode a successful response body, or turn a failed one into an error.
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response, context: &str) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from(response, context).await);
    }

    response.json::<T>().await.map_err(|e| {
        tracing::error!(error = %e, "{} response parse error", context);
        AppError::Decoding(format!("Failed to parse response: {}", e))
    })
}

pub(crate) async fn error_from(response: Response, context: &str) -> AppError {
    let status = response.status();
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(ErrorBody::into_message);

    status_error(status, message, context)
}

/// Map a failed status to an error: rejections become `Auth`, everything else `Api`.
pub(crate) fn status_error(status: StatusCode, message: Option<String>, context: &str) -> AppError {
    let message = message.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    });

    tracing::warn!(status = status.as_u16(), error = %message, "{} failed", context);

    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::UNPROCESSABLE_ENTITY => AppError::Auth(message),
        _ => AppError::Api(format!("{} failed ({}): {}", context, status.as_u16(), message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_auth::MemoryStore;
    use shared::User;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(expires_at: Option<i64>, refresh_token: Option<&str>) -> ProviderSession {
        ProviderSession {
            access_token: "at".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at,
            user: User::new("u1"),
        }
    }

    fn client_with(store: Arc<MemoryStore>) -> ApiClient {
        ApiClient::new("http://127.0.0.1:9/", "anon", store).unwrap()
    }

    #[test]
    fn test_new_resumes_persisted_session() {
        let store = Arc::new(MemoryStore::new());
        let persisted = session(None, Some("rt"));
        store
            .set(SESSION_STORAGE_KEY, &serde_json::to_string(&persisted).unwrap())
            .unwrap();

        let client = client_with(store);

        assert_eq!(client.session(), Some(persisted));
        assert_eq!(client.bearer(), "at");
        assert_eq!(client.url("/auth/v1/user"), "http://127.0.0.1:9/auth/v1/user");
    }

    #[test]
    fn test_unreadable_persisted_session_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        store.set(SESSION_STORAGE_KEY, "{broken").unwrap();

        let client = client_with(store.clone());

        assert!(client.session().is_none());
        assert_eq!(client.bearer(), "anon");
        assert!(!store.contains_key(SESSION_STORAGE_KEY));
    }

    #[test]
    fn test_set_session_persists_and_notifies() {
        let store = Arc::new(MemoryStore::new());
        let client = client_with(store.clone());
        let mut changes = client.changes();

        client.set_session(Some(session(None, None)), SessionEvent::SignedIn);
        assert!(store.contains_key(SESSION_STORAGE_KEY));
        let change = changes.try_recv().unwrap();
        assert_eq!(change.event, SessionEvent::SignedIn);

        client.set_session(None, SessionEvent::SignedOut);
        assert!(!store.contains_key(SESSION_STORAGE_KEY));
        assert!(changes.try_recv().unwrap().session.is_none());
    }

    #[tokio::test]
    async fn test_valid_session_skips_refresh_when_not_expiring() {
        let client = client_with(Arc::new(MemoryStore::new()));
        let fresh = session(Some(now_secs() + 3600), Some("rt"));
        client.set_session(Some(fresh.clone()), SessionEvent::SignedIn);

        let current = client.valid_session().await.unwrap();

        assert_eq!(current, Some(fresh));
    }

    #[tokio::test]
    async fn test_expired_session_without_refresh_token_signs_out() {
        let store = Arc::new(MemoryStore::new());
        let client = client_with(store.clone());
        client.set_session(Some(session(Some(now_secs() - 10), None)), SessionEvent::SignedIn);
        let mut changes = client.changes();

        let current = client.valid_session().await.unwrap();

        assert!(current.is_none());
        assert_eq!(changes.try_recv().unwrap().event, SessionEvent::SignedOut);
        assert!(!store.contains_key(SESSION_STORAGE_KEY));
    }

    #[tokio::test]
    async fn test_expiring_session_is_refreshed() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(serde_json::json!({ "refresh_token": "rt" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-2",
                "refresh_token": "rt-2",
                "expires_in": 3600,
                "user": { "id": "u1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = ApiClient::new(server.uri(), "anon", store.clone()).unwrap();
        client.set_session(Some(session(Some(now_secs() + 10), Some("rt"))), SessionEvent::SignedIn);
        let mut changes = client.changes();

        // Act
        let current = client.valid_session().await.unwrap().unwrap();

        // Assert
        assert_eq!(current.access_token, "at-2");
        assert_eq!(current.refresh_token.as_deref(), Some("rt-2"));
        assert_eq!(changes.try_recv().unwrap().event, SessionEvent::TokenRefreshed);
        assert_eq!(load_session(store.as_ref()), Some(current));
    }

    #[tokio::test]
    async fn test_rejected_refresh_signs_out() {
        // Arrange
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid Refresh Token: Already Used"
            })))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStore::new());
        let client = ApiClient::new(server.uri(), "anon", store.clone()).unwrap();
        client.set_session(Some(session(Some(now_secs() - 10), Some("rt"))), SessionEvent::SignedIn);
        let mut changes = client.changes();

        // Act
        let current = client.valid_session().await.unwrap();

        // Assert
        assert!(current.is_none());
        assert!(client.session().is_none());
        assert_eq!(changes.try_recv().unwrap().event, SessionEvent::SignedOut);
        assert!(!store.contains_key(SESSION_STORAGE_KEY));
    }

    #[tokio::test]
    async fn test_unreachable_refresh_keeps_session() {
        // Arrange
        // Bind then release a port so that nothing listens on it
        let base_url = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let store = Arc::new(MemoryStore::new());
        let client = ApiClient::new(base_url, "anon", store.clone()).unwrap();
        let expiring = session(Some(now_secs() - 10), Some("rt"));
        client.set_session(Some(expiring.clone()), SessionEvent::SignedIn);
        let mut changes = client.changes();

        // Act
        let result = client.valid_session().await;

        // Assert
        assert!(matches!(result, Err(AppError::Api(_))));
        assert_eq!(client.session(), Some(expiring));
        assert!(changes.try_recv().is_err());
        assert!(store.contains_key(SESSION_STORAGE_KEY));
    }

    #[test]
    fn test_status_error_classification() {
        let rejected = status_error(
            StatusCode::BAD_REQUEST,
            Some("Invalid login credentials".to_string()),
            "Sign in",
        );
        assert!(matches!(rejected, AppError::Auth(msg) if msg == "Invalid login credentials"));

        let outage = status_error(StatusCode::BAD_GATEWAY, None, "Fetch user");
        assert!(matches!(outage, AppError::Api(msg) if msg == "Fetch user failed (502): Bad Gateway"));
    }
}
