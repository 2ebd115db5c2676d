//! Sign in, fetch a few lists and react to session events.
//!
//! Configure with `DASHBOARD_*` variables (see `ClientConfig::from_env`) and
//! `DASHBOARD_USER` / `DASHBOARD_PASSWORD`.
//!
//! Run with: cargo run --example session_walkthrough

use dashboard_client::{ApiClient, ClientConfig, ClientError, FileCredentialStore, SessionEvent};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = ClientConfig::from_env()?;
    let store = Arc::new(FileCredentialStore::new(".session", &config.credential_key));
    let client = ApiClient::new(config, store)?;

    let mut session = client.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = session.recv().await {
            match event {
                SessionEvent::Expired => println!("session expired, sign in again"),
                other => println!("session event: {:?}", other),
            }
        }
    });

    if !client.is_authenticated().await {
        let user = std::env::var("DASHBOARD_USER")?;
        let password = std::env::var("DASHBOARD_PASSWORD")?;
        let profile = client.login(&user, &password).await?;
        println!("signed in: {}", profile);
    }

    for path in ["/orders", "/stock", "/customers"] {
        match client.get(path).await {
            Ok(body) => println!("{} -> {}", path, body),
            Err(ClientError::Connectivity { url, .. }) => println!("{} -> backend unreachable ({})", path, url),
            Err(e) => println!("{} -> {}", path, e),
        }
    }

    Ok(())
}
