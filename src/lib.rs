#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Dashboard API client
//!
//! Every network call the production dashboard makes (orders, stock, CRM,
//! reports) goes through this crate. It decides where a request goes, keeps
//! the bearer credential alive, and recovers from the transient failures a
//! proxied deployment produces, without letting concurrent callers race
//! each other into duplicate refreshes.
//!
//! ## Overview
//!
//! 1. **Endpoint resolution** - ordered candidate base URLs, with same-origin failover
//! 2. **Dispatch** - tries candidates in order; unreachable hosts and proxy errors fail over
//! 3. **Credentials** - proactive refresh before expiry, shared by all concurrent callers
//! 4. **Retry policy** - one refresh-and-retry on 401, then a broadcast session expiry
//! 5. **Normalization** - snake_case responses become camelCase
//!
//! ## Usage
//!
//! ```ignore
//! use dashboard_client::{ApiClient, ClientConfig, FileCredentialStore, SessionEvent};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FileCredentialStore::new("./.session", "auth"));
//!     let client = ApiClient::new(ClientConfig::from_env()?, store)?;
//!
//!     let mut session = client.events().subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = session.recv().await {
//!             if event == SessionEvent::Expired {
//!                 // reset permission cache, route to login
//!             }
//!         }
//!     });
//!
//!     client.login("planner", "secret").await?;
//!     let orders = client.get("/orders").await?;
//!     println!("{}", orders);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[client]** - ApiClient, dispatcher, endpoint resolution, configuration
//! - **[auth]** - Credential manager, token inspection, credential stores
//! - **[normalize]** - Response key normalization
//! - **[events]** - Session event broadcast
//! - **[error]** - Error types and result handling

pub mod auth;
pub mod client;
pub mod error;
pub mod events;
pub mod normalize;

pub use auth::{CredentialManager, CredentialStore, FileCredentialStore, MemoryCredentialStore, StoredCredential};
pub use client::{ApiClient, ApiRequest, ClientConfig, Dispatcher, RequestBody};
pub use error::{ClientError, Result};
pub use events::{SessionEvent, SessionEvents};
pub use normalize::normalize;
