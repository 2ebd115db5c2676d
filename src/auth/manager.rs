//! Credential lifecycle: login, proactive refresh, single-flight, clear.
//!
//! # States
//!
//! ```text
//! ANONYMOUS ──login──▶ AUTHENTICATED ──(refresh in flight)──▶ AUTHENTICATED      (new token)
//!     ▲                                                   └──▶ AUTHENTICATED-STALE (old token kept)
//!     └──────────────────────────── clear ◀────────────────────┘
//! ```
//!
//! Nothing but the store and the in-flight handle carries this state: the
//! token is read through from the [`CredentialStore`] on every access, and
//! "refreshing" means a handle exists in the manager's slot.
//!
//! # Single-flight
//!
//! [`CredentialManager::refresh`] keeps at most one refresh call on the wire.
//! The first caller creates a [`Shared`] future and parks it in the slot;
//! every concurrent caller clones and awaits that same future, so they all
//! observe the one outcome. A guard inside the future empties the slot when
//! it settles, before any waiter resumes.

use super::store::{CredentialStore, StoredCredential};
use super::token::{now_epoch_seconds, Credential};
use crate::client::utils::{error_message, parse_body};
use crate::client::{candidates, ClientConfig, Dispatcher, RequestInit};
use crate::error::{ClientError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderValue, Method};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Login endpoint, relative to the API base.
pub const LOGIN_PATH: &str = "/auth/login";

/// Refresh endpoint, relative to the API base.
pub const REFRESH_PATH: &str = "/auth/refresh";

type RefreshFuture = Shared<BoxFuture<'static, Option<String>>>;

struct InFlight {
    id: u64,
    handle: RefreshFuture,
}

struct Inner {
    config: Arc<ClientConfig>,
    dispatcher: Dispatcher,
    store: Arc<dyn CredentialStore>,
    in_flight: Mutex<Option<InFlight>>,
    next_id: AtomicU64,
}

/// Owner of the bearer credential.
///
/// Construct one per process and share clones; clones share the store and
/// the in-flight refresh slot.
#[derive(Clone)]
pub struct CredentialManager {
    inner: Arc<Inner>,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(default)]
    user: Value,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token")]
    token: Option<String>,
}

impl CredentialManager {
    /// Create the manager over `store`, sending auth calls through `dispatcher`.
    pub fn new(
        config: Arc<ClientConfig>,
        dispatcher: Dispatcher,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                dispatcher,
                store,
                in_flight: Mutex::new(None),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// The persisted token, read fresh from the store.
    pub async fn current_token(&self) -> Option<String> {
        self.load().await.map(|stored| stored.token)
    }

    /// The persisted token with its decoded expiry.
    pub async fn credential(&self) -> Option<Credential> {
        self.current_token().await.map(Credential::from_token)
    }

    /// The signed-in user's record as stored at login.
    pub async fn user(&self) -> Option<Value> {
        self.load().await.map(|stored| stored.user)
    }

    /// A token fit for the next request.
    ///
    /// `None` when signed out. If the token expires within the configured
    /// margin, this is the outcome of [`refresh`](Self::refresh); otherwise
    /// the stored token unchanged.
    pub async fn ensure_fresh(&self) -> Option<String> {
        let credential = self.credential().await?;
        let margin = Duration::from_secs(self.inner.config.refresh_margin_secs);

        if !credential.expires_within(margin, now_epoch_seconds()) {
            return Some(credential.access_token);
        }

        tracing::debug!(
            expiry = ?credential.expiry_epoch_seconds,
            "access token close to expiry, refreshing"
        );
        self.refresh().await
    }

    /// Exchange the current token for a new one.
    ///
    /// Joins the refresh already in flight if there is one. Returns the new
    /// token, or `None` on any failure, in which case the stored credential
    /// is left as it was.
    pub async fn refresh(&self) -> Option<String> {
        let handle = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(flight) => {
                    tracing::debug!(refresh = flight.id, "joining in-flight token refresh");
                    flight.handle.clone()
                }
                None => {
                    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                    let handle = self.spawn_refresh(id);
                    *slot = Some(InFlight {
                        id,
                        handle: handle.clone(),
                    });
                    handle
                }
            }
        };
        handle.await
    }

    /// True while a refresh call is on the wire.
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Erase the persisted credential.
    pub async fn clear(&self) -> Result<()> {
        self.inner.store.clear().await?;
        tracing::info!("credential cleared");
        Ok(())
    }

    /// Sign in and persist `{token, user}`.
    ///
    /// A rejected login is an [`ClientError::Http`]; it never goes through
    /// the refresh path.
    pub async fn login(&self, username: &str, password: &str) -> Result<StoredCredential> {
        let body = serde_json::json!({ "username": username, "password": password });
        let mut init = RequestInit::new(Method::POST);
        init.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        init.body = Some(serde_json::to_vec(&body)?.into());

        let response = self
            .inner
            .dispatcher
            .dispatch(LOGIN_PATH, &init, &candidates(&self.inner.config), None)
            .await?;

        if !response.is_success() {
            let body = parse_body(&response.body);
            return Err(ClientError::Http {
                status: response.status,
                message: error_message(response.status, &body),
                body,
            });
        }

        let login: LoginResponse = serde_json::from_slice(&response.body)?;
        let stored = StoredCredential {
            token: login.token,
            user: login.user,
        };
        self.inner.store.save(&stored).await?;
        tracing::info!("signed in as {}", username);
        Ok(stored)
    }

    async fn load(&self) -> Option<StoredCredential> {
        load_or_anonymous(self.inner.store.as_ref()).await
    }

    fn spawn_refresh(&self, id: u64) -> RefreshFuture {
        let guard = InFlightGuard {
            owner: Arc::downgrade(&self.inner),
            id,
        };
        let config = self.inner.config.clone();
        let dispatcher = self.inner.dispatcher.clone();
        let store = self.inner.store.clone();

        async move {
            let _guard = guard;
            perform_refresh(&config, &dispatcher, store.as_ref()).await
        }
        .boxed()
        .shared()
    }
}

/// Empties the in-flight slot when the refresh future finishes or is dropped.
///
/// Holds a weak reference: the slot owns the future, the future must not
/// own the slot.
struct InFlightGuard {
    owner: Weak<Inner>,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let Some(inner) = self.owner.upgrade() else {
            return;
        };
        let finished = {
            let mut slot = inner.in_flight.lock();
            match slot.as_ref() {
                Some(flight) if flight.id == self.id => slot.take(),
                _ => None,
            }
        };
        drop(finished);
    }
}

async fn perform_refresh(
    config: &ClientConfig,
    dispatcher: &Dispatcher,
    store: &dyn CredentialStore,
) -> Option<String> {
    let current = load_or_anonymous(store).await?.token;

    let bearer = match HeaderValue::from_str(&format!("Bearer {}", current)) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Stored token is not a valid header value: {}", e);
            return None;
        }
    };
    let mut init = RequestInit::new(Method::POST);
    init.headers.insert(AUTHORIZATION, bearer);

    let response = match dispatcher
        .dispatch(REFRESH_PATH, &init, &candidates(config), None)
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("Token refresh failed: {}", e);
            return None;
        }
    };

    if !response.is_success() {
        tracing::warn!("Token refresh rejected with status {}", response.status);
        return None;
    }

    let token = match serde_json::from_slice::<RefreshResponse>(&response.body) {
        Ok(RefreshResponse { token: Some(token) }) if !token.is_empty() => token,
        Ok(_) => {
            tracing::warn!("Token refresh response carried no token");
            return None;
        }
        Err(e) => {
            tracing::warn!("Token refresh response unreadable: {}", e);
            return None;
        }
    };

    match store.replace_token(&current, &token).await {
        Ok(true) => {
            tracing::info!("access token refreshed");
            Some(token)
        }
        Ok(false) => {
            tracing::info!("credential changed or cleared during refresh, discarding new token");
            None
        }
        Err(e) => {
            tracing::warn!("Refreshed token could not be stored: {}", e);
            None
        }
    }
}

async fn load_or_anonymous(store: &dyn CredentialStore) -> Option<StoredCredential> {
    match store.load().await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!("Credential store unreadable, continuing signed out: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryCredentialStore;
    use crate::auth::token::make_jwt;
    use serde_json::json;
    use std::io::Write;

    fn manager_for(server: &mockito::ServerGuard, store: Arc<MemoryCredentialStore>) -> CredentialManager {
        let config = Arc::new(ClientConfig {
            api_base: format!("{}/api/v1", server.url()),
            request_timeout_ms: 2_000,
            ..Default::default()
        });
        let dispatcher = Dispatcher::new(&config).unwrap();
        CredentialManager::new(config, dispatcher, store)
    }

    fn stored(token: &str) -> StoredCredential {
        StoredCredential {
            token: token.to_string(),
            user: json!({"id": 1, "user_name": "planner"}),
        }
    }

    fn token_expiring_in(secs: i64) -> String {
        make_jwt(&json!({"sub": "1", "exp": now_epoch_seconds() + secs}))
    }

    #[tokio::test]
    async fn test_ensure_fresh_anonymous() {
        let server = mockito::Server::new_async().await;
        let manager = manager_for(&server, Arc::new(MemoryCredentialStore::new()));
        assert_eq!(manager.ensure_fresh().await, None);
    }

    #[tokio::test]
    async fn test_ensure_fresh_keeps_long_lived_token() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server.mock("POST", "/api/v1/auth/refresh").expect(0).create_async().await;

        let token = token_expiring_in(3600);
        let store = Arc::new(MemoryCredentialStore::with_credential(stored(&token)));
        let manager = manager_for(&server, store);

        assert_eq!(manager.ensure_fresh().await, Some(token));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_two_segment_token_is_not_refreshed() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server.mock("POST", "/api/v1/auth/refresh").expect(0).create_async().await;

        let store = Arc::new(MemoryCredentialStore::with_credential(stored("header.payload")));
        let manager = manager_for(&server, store);

        assert_eq!(manager.ensure_fresh().await.as_deref(), Some("header.payload"));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_ensure_fresh_single_refresh() {
        let mut server = mockito::Server::new_async().await;
        let old = token_expiring_in(300);
        let new = token_expiring_in(3600);

        let refresh = server
            .mock("POST", "/api/v1/auth/refresh")
            .match_header("authorization", format!("Bearer {}", old).as_str())
            .with_status(200)
            .with_body(json!({ "token": new }).to_string())
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemoryCredentialStore::with_credential(stored(&old)));
        let manager = manager_for(&server, store.clone());

        let (a, b) = tokio::join!(manager.ensure_fresh(), manager.ensure_fresh());

        assert_eq!(a.as_deref(), Some(new.as_str()));
        assert_eq!(a, b);
        assert!(!manager.is_refreshing());
        refresh.assert_async().await;

        let persisted = store.load().await.unwrap().unwrap();
        assert_eq!(persisted.token, new);
        assert_eq!(persisted.user["user_name"], "planner");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_credential() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", "/api/v1/auth/refresh")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let old = token_expiring_in(120);
        let store = Arc::new(MemoryCredentialStore::with_credential(stored(&old)));
        let manager = manager_for(&server, store.clone());

        let (a, b, c) = tokio::join!(manager.refresh(), manager.refresh(), manager.refresh());
        assert_eq!((a, b, c), (None, None, None));
        assert!(!manager.is_refreshing());
        refresh.assert_async().await;

        assert_eq!(manager.current_token().await, Some(old));
    }

    #[tokio::test]
    async fn test_refresh_does_not_overwrite_newer_login() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", "/api/v1/auth/refresh")
            .match_header("authorization", "Bearer A-old")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(300));
                w.write_all(br#"{"token": "A-refreshed"}"#)
            })
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemoryCredentialStore::with_credential(StoredCredential {
            token: "A-old".into(),
            user: json!({"name": "userA"}),
        }));
        let manager = manager_for(&server, store.clone());

        let refreshing = tokio::spawn({
            let manager = manager.clone();
            async move { manager.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        store
            .save(&StoredCredential {
                token: "B-login".into(),
                user: json!({"name": "userB"}),
            })
            .await
            .unwrap();

        assert_eq!(refreshing.await.unwrap(), None);
        refresh.assert_async().await;

        let persisted = store.load().await.unwrap().unwrap();
        assert_eq!(persisted.token, "B-login");
        assert_eq!(persisted.user["name"], "userB");
    }

    #[tokio::test]
    async fn test_refresh_after_logout_does_not_resurrect() {
        let mut server = mockito::Server::new_async().await;
        let _refresh = server
            .mock("POST", "/api/v1/auth/refresh")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(300));
                w.write_all(br#"{"token": "late"}"#)
            })
            .create_async()
            .await;

        let store = Arc::new(MemoryCredentialStore::with_credential(stored("first")));
        let manager = manager_for(&server, store.clone());

        let refreshing = tokio::spawn({
            let manager = manager.clone();
            async move { manager.refresh().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.clear().await.unwrap();

        assert_eq!(refreshing.await.unwrap(), None);
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_hit_network() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", "/api/v1/auth/refresh")
            .with_status(200)
            .with_body(r#"{"access_token": "next"}"#)
            .expect(2)
            .create_async()
            .await;

        let store = Arc::new(MemoryCredentialStore::with_credential(stored("first")));
        let manager = manager_for(&server, store);

        assert_eq!(manager.refresh().await.as_deref(), Some("next"));
        assert_eq!(manager.refresh().await.as_deref(), Some("next"));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_without_credential_skips_network() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server.mock("POST", "/api/v1/auth/refresh").expect(0).create_async().await;

        let manager = manager_for(&server, Arc::new(MemoryCredentialStore::new()));
        assert_eq!(manager.refresh().await, None);
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_persists_credential() {
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/api/v1/auth/login")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(json!({"username": "ayse", "password": "s3cret"})))
            .with_status(200)
            .with_body(r#"{"token": "abc", "user": {"id": 3, "full_name": "Ayşe"}}"#)
            .create_async()
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let manager = manager_for(&server, store.clone());

        let credential = manager.login("ayse", "s3cret").await.unwrap();
        assert_eq!(credential.token, "abc");
        assert_eq!(manager.user().await.unwrap()["full_name"], "Ayşe");
        login.assert_async().await;

        manager.clear().await.unwrap();
        assert_eq!(manager.current_token().await, None);
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _login = server
            .mock("POST", "/api/v1/auth/login")
            .with_status(401)
            .with_body(r#"{"detail": "Incorrect username or password"}"#)
            .create_async()
            .await;

        let manager = manager_for(&server, Arc::new(MemoryCredentialStore::new()));
        let err = manager.login("ayse", "wrong").await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "Incorrect username or password");
        assert_eq!(manager.current_token().await, None);
    }
}
