//! The public call contract.
//!
//! [`ApiClient`] composes the other pieces for every request:
//!
//! ```text
//! BUILDING ─▶ AWAITING_TOKEN ─▶ DISPATCHING ─▶ SUCCESS ─────────────────────▶ normalized body
//!                                    │
//!                                    └─▶ CLASSIFYING_ERROR ─▶ 401, first time ─▶ refresh ─▶ DISPATCHING (once)
//!                                                          ├─▶ 401, unrecoverable ─▶ clear + broadcast ─▶ SessionExpired
//!                                                          └─▶ other ─▶ Http { status, message }
//! ```
//!
//! Connectivity and cancellation errors from the dispatcher pass straight
//! through.
//!
//! # Examples
//!
//! ```ignore
//! use dashboard_client::{ApiClient, ApiRequest, ClientConfig, FileCredentialStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(FileCredentialStore::new("/var/lib/dashboard", "auth"));
//! let client = ApiClient::new(ClientConfig::from_env()?, store)?;
//!
//! client.login("planner", "secret").await?;
//! let orders = client.get("/orders?status=open").await?;
//! let created = client.post("/stock", &serde_json::json!({"stock_code": "STK1"})).await?;
//! ```

use super::dispatch::{Dispatcher, RawResponse, RequestInit};
use super::endpoints::candidates;
use super::utils::{error_message, is_unauthorized, parse_body};
use super::ClientConfig;
use crate::auth::{CredentialManager, CredentialStore};
use crate::error::{ClientError, Result};
use crate::events::{SessionEvent, SessionEvents};
use crate::normalize::normalize;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Body of an [`ApiRequest`].
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// JSON document, sent as-is (the backend expects snake_case keys)
    Json(Value),
    /// Pre-serialized text
    Text(String),
    /// Binary or multipart payload; no JSON content type is added
    Binary {
        /// Encoded payload
        bytes: Bytes,
        /// Content type to send, e.g. a multipart boundary declaration
        content_type: Option<String>,
    },
}

/// A request as callers describe it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path below the API base, e.g. `/orders/12`
    pub path: String,
    /// Extra headers
    pub headers: Vec<(String, String)>,
    /// Optional body
    pub body: Option<RequestBody>,
    /// Aborts the request when cancelled
    pub cancel: Option<CancellationToken>,
}

impl ApiRequest {
    /// A request with no body or extra headers.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            cancel: None,
        }
    }

    /// `GET path`
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `POST path`
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// `PUT path`
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// `PATCH path`
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// `DELETE path`
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serialize `body` as the JSON payload.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::InvalidRequest(format!("unserializable body: {}", e)))?;
        self.body = Some(RequestBody::Json(value));
        Ok(self)
    }

    /// Set the body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header. An explicit `Content-Type` here wins over the default.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Abort the request when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Per-call state, discarded when the call completes.
struct RequestContext {
    path: String,
    method: Method,
    headers: HeaderMap,
    body: Option<Bytes>,
    cancel: Option<CancellationToken>,
    retry_attempted: bool,
}

impl RequestContext {
    fn build(request: ApiRequest) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidRequest(format!("header {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidRequest(format!("header {}: {}", name, e)))?;
            headers.append(name, value);
        }

        let mut default_json = true;
        let body = match request.body {
            None => None,
            Some(RequestBody::Json(value)) => Some(Bytes::from(serde_json::to_vec(&value)?)),
            Some(RequestBody::Text(text)) => Some(Bytes::from(text)),
            Some(RequestBody::Binary {
                bytes,
                content_type,
            }) => {
                default_json = false;
                if let Some(content_type) = content_type {
                    if !headers.contains_key(CONTENT_TYPE) {
                        let value = HeaderValue::from_str(&content_type).map_err(|e| {
                            ClientError::InvalidRequest(format!("content type: {}", e))
                        })?;
                        headers.insert(CONTENT_TYPE, value);
                    }
                }
                Some(bytes)
            }
        };

        if default_json && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        Ok(Self {
            path: request.path,
            method: request.method,
            headers,
            body,
            cancel: request.cancel,
            retry_attempted: false,
        })
    }

    fn init(&self, token: Option<&str>) -> Result<RequestInit> {
        let mut headers = self.headers.clone();
        if let Some(token) = token {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ClientError::InvalidRequest(format!("bearer token: {}", e)))?;
            headers.insert(AUTHORIZATION, bearer);
        }
        Ok(RequestInit {
            method: self.method.clone(),
            headers,
            body: self.body.clone(),
        })
    }
}

/// Client for the dashboard backend.
///
/// Cheap to clone; clones share the connection pool, the credential manager
/// (and therefore its single in-flight refresh) and the event hub.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    dispatcher: Dispatcher,
    credentials: CredentialManager,
    events: SessionEvents,
}

impl ApiClient {
    /// Build a client over `store` with a fresh event hub.
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        Self::with_events(config, store, SessionEvents::new())
    }

    /// Build a client that broadcasts on an existing event hub.
    pub fn with_events(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        events: SessionEvents,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let dispatcher = Dispatcher::new(&config)?;
        let credentials = CredentialManager::new(config.clone(), dispatcher.clone(), store);

        tracing::debug!(candidates = ?candidates(&config), "api client ready");

        Ok(Self {
            config,
            dispatcher,
            credentials,
            events,
        })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The credential manager shared by all clones.
    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// The session event hub.
    pub fn events(&self) -> &SessionEvents {
        &self.events
    }

    /// Perform `request` and return its normalized JSON body.
    pub async fn send(&self, request: ApiRequest) -> Result<Value> {
        let response = self.execute(request).await?;
        Ok(normalize(parse_body(&response.body)))
    }

    /// Perform `request` and deserialize the normalized body into `T`.
    pub async fn send_as<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let value = self.send(request).await?;
        serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Perform `request` and return the raw body, e.g. a report export.
    pub async fn download(&self, request: ApiRequest) -> Result<Bytes> {
        Ok(self.execute(request).await?.body)
    }

    /// `GET path`
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.send(ApiRequest::get(path)).await
    }

    /// `POST path` with a JSON body
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.send(ApiRequest::post(path).with_json(body)?).await
    }

    /// `PUT path` with a JSON body
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.send(ApiRequest::put(path).with_json(body)?).await
    }

    /// `PATCH path` with a JSON body
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.send(ApiRequest::patch(path).with_json(body)?).await
    }

    /// `DELETE path`
    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Sign in, persist the session and return the normalized user record.
    pub async fn login(&self, username: &str, password: &str) -> Result<Value> {
        let stored = self.credentials.login(username, password).await?;
        self.events.emit(SessionEvent::LoggedIn);
        Ok(normalize(stored.user))
    }

    /// Sign out: erase the credential and notify subscribers.
    pub async fn logout(&self) -> Result<()> {
        self.credentials.clear().await?;
        self.events.emit(SessionEvent::LoggedOut);
        Ok(())
    }

    /// The signed-in user's record, normalized.
    pub async fn current_user(&self) -> Option<Value> {
        self.credentials.user().await.map(normalize)
    }

    /// Whether a credential is stored.
    pub async fn is_authenticated(&self) -> bool {
        self.credentials.current_token().await.is_some()
    }

    async fn execute(&self, request: ApiRequest) -> Result<RawResponse> {
        let mut ctx = RequestContext::build(request)?;
        let candidates = candidates(&self.config);

        let mut token = self.credentials.ensure_fresh().await;
        let had_credential = token.is_some();

        loop {
            let init = ctx.init(token.as_deref())?;
            let response = self
                .dispatcher
                .dispatch(&ctx.path, &init, &candidates, ctx.cancel.as_ref())
                .await?;

            if response.is_success() {
                return Ok(response);
            }

            if is_unauthorized(response.status) && had_credential {
                if !ctx.retry_attempted {
                    ctx.retry_attempted = true;
                    if let Some(fresh) = self.credentials.refresh().await {
                        tracing::debug!(path = %ctx.path, "retrying after token refresh");
                        token = Some(fresh);
                        continue;
                    }
                }
                return Err(self.expire_session(&ctx.path).await);
            }

            let body = parse_body(&response.body);
            return Err(ClientError::Http {
                status: response.status,
                message: error_message(response.status, &body),
                body,
            });
        }
    }

    async fn expire_session(&self, path: &str) -> ClientError {
        tracing::warn!("Session expired on {}, clearing credential", path);
        if let Err(e) = self.credentials.clear().await {
            tracing::warn!("Could not clear expired credential: {}", e);
        }
        self.events.emit(SessionEvent::Expired);
        ClientError::SessionExpired
    }
}
