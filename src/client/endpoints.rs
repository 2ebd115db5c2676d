//! Endpoint resolution.
//!
//! Computes the ordered list of candidate base URLs a request is tried
//! against. Pure: no I/O, deterministic for a given [`ClientConfig`], never
//! empty, duplicates removed with first occurrence kept.
//!
//! A relative primary base means the dashboard is served behind a reverse
//! proxy, and the list grows with fallbacks:
//!
//! ```text
//! /api/v1                         primary (same origin)
//! http://backend:8000/api/v1      proxy target override, if configured
//! http://<origin host>:8000/api/v1    same host, local backend port   (dev_fallback)
//! http://127.0.0.1:8000/api/v1        loopback aliases, unless equal   (dev_fallback)
//! http://localhost:8000/api/v1
//! ```
//!
//! An absolute primary base pins the backend and yields a single candidate.
//!
//! ```
//! use dashboard_client::ClientConfig;
//! use dashboard_client::client::candidates;
//!
//! let config = ClientConfig {
//!     api_base: "https://erp.example.com".into(),
//!     ..Default::default()
//! };
//! assert_eq!(candidates(&config), vec!["https://erp.example.com/api/v1"]);
//! ```

use super::config::{is_absolute, ClientConfig};
use crate::error::{ClientError, Result};
use url::Url;

/// Loopback names tried on the fallback port, in order.
const LOOPBACK_ALIASES: [&str; 2] = ["127.0.0.1", "localhost"];

/// Ordered candidate base URLs for `config`. Index 0 is always the primary.
pub fn candidates(config: &ClientConfig) -> Vec<String> {
    let primary = with_prefix(&config.api_base, &config.api_prefix);
    if !config.primary_is_relative() {
        return vec![primary];
    }

    let mut list = vec![primary];

    if let Some(target) = config.proxy_target.as_deref() {
        if !target.trim().is_empty() {
            push_unique(&mut list, with_prefix(target, &config.api_prefix));
        }
    }

    if config.dev_fallback {
        let origin_host = Url::parse(&config.origin)
            .ok()
            .and_then(|origin| origin.host_str().map(str::to_owned));

        if let Some(host) = origin_host.as_deref() {
            push_unique(&mut list, local_base(host, config));
        }
        for alias in LOOPBACK_ALIASES {
            if origin_host.as_deref() != Some(alias) {
                push_unique(&mut list, local_base(alias, config));
            }
        }
    }

    list
}

/// Trim trailing slashes and append `prefix` unless the base already ends with it.
pub fn with_prefix(base: &str, prefix: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() || trimmed.ends_with(prefix) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, prefix)
    }
}

/// Full request URL for `path` under `base`; relative bases resolve against `origin`.
pub fn resolve_url(origin: &Url, base: &str, path: &str) -> Result<Url> {
    let joined = join_path(base, path);
    let resolved = if is_absolute(base) {
        Url::parse(&joined)
    } else {
        origin.join(&joined)
    };
    resolved.map_err(|e| ClientError::InvalidRequest(format!("cannot build URL {:?}: {}", joined, e)))
}

fn join_path(base: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), path)
}

fn local_base(host: &str, config: &ClientConfig) -> String {
    format!(
        "http://{}:{}{}",
        host,
        config.fallback_port,
        config.api_prefix.trim_end_matches('/')
    )
}

fn push_unique(list: &mut Vec<String>, candidate: String) {
    if !list.contains(&candidate) {
        list.push(candidate);
    }
}
