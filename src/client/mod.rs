//! HTTP side of the dashboard client.
//!
//! This module provides everything between a caller's request and the
//! network:
//!
//! - **Resolve candidate endpoints** from configuration
//! - **Dispatch with failover** across those candidates
//! - **Attach and recover credentials** (one refresh-and-retry on 401)
//! - **Classify failures** into connectivity, HTTP, session and cancellation errors
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── api       - ApiClient, the public call contract
//! ├── config    - Client configuration
//! ├── dispatch  - Candidate-by-candidate request sending
//! ├── endpoints - Candidate base URL resolution
//! └── utils     - Status classification and body helpers
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ApiClient`] | Entry point for every backend call |
//! | [`ApiRequest`] | Request builder |
//! | [`Dispatcher`] | Failover sender |
//! | [`ClientConfig`] | Client configuration options |
//!
//! # Examples
//!
//! ```
//! use dashboard_client::client::{candidates, is_failover_status, ClientConfig};
//!
//! let config = ClientConfig {
//!     api_base: "/api/v1".into(),
//!     origin: "http://localhost:5173".into(),
//!     ..Default::default()
//! };
//! assert_eq!(candidates(&config)[0], "/api/v1");
//!
//! assert!(is_failover_status(503));
//! assert!(!is_failover_status(500));
//! ```

mod api;
mod config;
mod dispatch;
mod endpoints;
pub(crate) mod utils;

pub use api::{ApiClient, ApiRequest, RequestBody};
pub use config::{ClientConfig, DEFAULT_API_PREFIX, DEFAULT_FALLBACK_PORT, DEFAULT_REFRESH_MARGIN_SECS};
pub use dispatch::{Dispatcher, RawResponse, RequestInit};
pub use endpoints::{candidates, resolve_url, with_prefix};
pub use utils::*;
