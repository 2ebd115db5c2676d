//! Client configuration.
//!
//! Configuration is fixed for the lifetime of the process: build a
//! [`ClientConfig`] once (from code, from a deserialized file, or from the
//! environment via [`ClientConfig::from_env`]) and hand it to
//! [`ApiClient::new`](crate::ApiClient::new).
//!
//! ```
//! use dashboard_client::ClientConfig;
//!
//! let config = ClientConfig {
//!     api_base: "https://erp.example.com".into(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Versioned prefix every domain endpoint lives under.
pub const DEFAULT_API_PREFIX: &str = "/api/v1";

/// Port the backend listens on when run locally without the proxy.
pub const DEFAULT_FALLBACK_PORT: u16 = 8000;

/// Remaining token lifetime below which a proactive refresh is triggered.
pub const DEFAULT_REFRESH_MARGIN_SECS: u64 = 600;

/// Configuration for [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Primary base. Relative (`/api/v1`, empty) means same-origin behind a
    /// reverse proxy and enables failover; absolute pins a single backend.
    pub api_base: String,
    /// Versioned prefix appended to bases that do not already end with it.
    pub api_prefix: String,
    /// Origin that relative bases resolve against (the page origin in a browser).
    pub origin: String,
    /// Explicit backend the proxy would forward to; tried right after the primary.
    pub proxy_target: Option<String>,
    /// Local port for the same-host and loopback fallbacks.
    pub fallback_port: u16,
    /// Whether same-host / loopback fallbacks on `fallback_port` are generated.
    pub dev_fallback: bool,
    /// Seconds before expiry at which the token is refreshed proactively.
    pub refresh_margin_secs: u64,
    /// Per-attempt request timeout.
    pub request_timeout_ms: u64,
    /// Idle connections kept per host.
    pub max_idle_per_host: usize,
    /// Key under which the credential blob is persisted.
    pub credential_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            origin: "http://localhost:5173".to_string(),
            proxy_target: None,
            fallback_port: DEFAULT_FALLBACK_PORT,
            dev_fallback: true,
            refresh_margin_secs: DEFAULT_REFRESH_MARGIN_SECS,
            request_timeout_ms: 30_000,
            max_idle_per_host: 16,
            credential_key: "auth".to_string(),
        }
    }
}

impl ClientConfig {
    /// Build a configuration from `DASHBOARD_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base) = lookup("DASHBOARD_API_BASE_URL") {
            config.api_base = base;
        }
        if let Some(prefix) = lookup("DASHBOARD_API_PREFIX") {
            config.api_prefix = prefix;
        }
        if let Some(origin) = lookup("DASHBOARD_ORIGIN") {
            config.origin = origin;
        }
        config.proxy_target = lookup("DASHBOARD_PROXY_TARGET").filter(|t| !t.trim().is_empty());
        if let Some(port) = lookup("DASHBOARD_FALLBACK_PORT") {
            config.fallback_port = parse_var("DASHBOARD_FALLBACK_PORT", &port)?;
        }
        if let Some(flag) = lookup("DASHBOARD_API_DEV_FALLBACK") {
            config.dev_fallback = parse_flag("DASHBOARD_API_DEV_FALLBACK", &flag)?;
        }
        if let Some(margin) = lookup("DASHBOARD_REFRESH_MARGIN_SECS") {
            config.refresh_margin_secs = parse_var("DASHBOARD_REFRESH_MARGIN_SECS", &margin)?;
        }
        if let Some(timeout) = lookup("DASHBOARD_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_var("DASHBOARD_REQUEST_TIMEOUT_MS", &timeout)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every URL in the configuration parses.
    pub fn validate(&self) -> Result<()> {
        self.origin_url()?;

        if is_absolute(&self.api_base) {
            Url::parse(&self.api_base)
                .map_err(|e| ClientError::Config(format!("api_base {:?}: {}", self.api_base, e)))?;
        }
        if let Some(target) = &self.proxy_target {
            Url::parse(target)
                .map_err(|e| ClientError::Config(format!("proxy_target {:?}: {}", target, e)))?;
        }
        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(ClientError::Config(format!(
                "api_prefix must start with '/': {:?}",
                self.api_prefix
            )));
        }
        Ok(())
    }

    /// The origin relative bases are resolved against.
    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin)
            .map_err(|e| ClientError::Config(format!("origin {:?}: {}", self.origin, e)))
    }

    /// True when the primary base is same-origin and failover applies.
    pub fn primary_is_relative(&self) -> bool {
        !is_absolute(&self.api_base)
    }
}

/// A base is absolute when it carries a scheme; everything else is a
/// same-origin reference.
pub(crate) fn is_absolute(base: &str) -> bool {
    Url::parse(base.trim()).is_ok()
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ClientError::Config(format!("{}={:?}: {}", key, value, e)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ClientError::Config(format!("{}: not a boolean: {:?}", key, other))),
    }
}
