//! Request dispatch with endpoint failover.
//!
//! The [`Dispatcher`] sends one logical request to the candidate bases from
//! [`candidates`](super::candidates), in order, until one of them gives an
//! answer worth returning:
//!
//! - a network-level failure (DNS, connect, TLS, timeout) moves on to the
//!   next candidate;
//! - a 404/502/503/504 moves on as well, but only when the primary base is
//!   same-origin (failover mode);
//! - any other response, or whatever the final candidate produces, is
//!   returned as-is.
//!
//! When the final candidate fails at the network level the result is
//! [`ClientError::Connectivity`], never an HTTP error, so callers can tell
//! "server unreachable" from "server answered badly".

use super::config::{is_absolute, ClientConfig};
use super::endpoints::resolve_url;
use super::utils::{is_failover_status, is_success};
use crate::error::{ClientError, Result};
use bytes::Bytes;
use http::{HeaderMap, Method};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Method, headers and body of an outgoing request.
///
/// The body is buffered so the same request can be replayed against every
/// candidate.
#[derive(Debug, Clone)]
pub struct RequestInit {
    /// HTTP method
    pub method: Method,
    /// Request headers, including `Authorization` when a token is attached
    pub headers: HeaderMap,
    /// Buffered request body
    pub body: Option<Bytes>,
}

impl RequestInit {
    /// A bodiless request with no headers.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body bytes
    pub body: Bytes,
    /// URL that produced this response
    pub url: Url,
}

impl RawResponse {
    /// True for 2xx responses.
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }
}

/// Sends requests across candidate endpoints.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    origin: Url,
}

impl Dispatcher {
    /// Build a dispatcher with the timeouts and pool settings from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build()
            .map_err(|e| ClientError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            origin: config.origin_url()?,
        })
    }

    /// Send `init` to `path` under each candidate in turn.
    ///
    /// `cancel`, when it fires, aborts the attempt in flight and yields
    /// [`ClientError::Cancelled`].
    pub async fn dispatch(
        &self,
        path: &str,
        init: &RequestInit,
        candidates: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse> {
        let Some(primary) = candidates.first() else {
            return Err(ClientError::InvalidRequest("no candidate endpoints".into()));
        };
        let failover = !is_absolute(primary);
        let last_index = candidates.len() - 1;
        let mut last_error = None;

        for (index, base) in candidates.iter().enumerate() {
            let url = resolve_url(&self.origin, base, path)?;
            let is_final = index == last_index;
            tracing::debug!(attempt = index + 1, method = %init.method, %url, "dispatching request");

            match self.attempt(url.clone(), init, cancel).await {
                Ok(response) => {
                    if failover && !is_final && is_failover_status(response.status) {
                        tracing::warn!(
                            "Endpoint {} answered {}, failing over to next candidate",
                            url,
                            response.status
                        );
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) if e.is_connectivity() => {
                    if !is_final {
                        tracing::warn!("Endpoint {} unreachable, failing over: {}", url, e);
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::Connectivity {
            url: primary.clone(),
            message: "no candidate produced a response".into(),
        }))
    }

    async fn attempt(
        &self,
        url: Url,
        init: &RequestInit,
        cancel: Option<&CancellationToken>,
    ) -> Result<RawResponse> {
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ClientError::Cancelled),
                    result = self.send(url, init) => result,
                }
            }
            None => self.send(url, init).await,
        }
    }

    async fn send(&self, url: Url, init: &RequestInit) -> Result<RawResponse> {
        let mut req_builder = self
            .client
            .request(init.method.clone(), url.clone())
            .headers(init.headers.clone());

        if let Some(body) = &init.body {
            req_builder = req_builder.body(body.clone());
        }

        let network_error = |e: reqwest::Error| ClientError::Connectivity {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = req_builder.send().await.map_err(network_error)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(network_error)?;

        tracing::debug!(%url, status, bytes = body.len(), "received response");

        Ok(RawResponse {
            status,
            headers,
            body,
            url,
        })
    }
}
