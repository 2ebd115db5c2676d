//! Persistence for the credential blob.
//!
//! The blob is one JSON document `{token, user}` under a single key. It is
//! read on every access and written only by
//! [`CredentialManager`](super::CredentialManager).

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// The persisted session: bearer token plus the signed-in user's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// Bearer access token
    pub token: String,
    /// User record as returned by the login endpoint
    #[serde(default)]
    pub user: Value,
}

/// Keyed storage for the credential blob.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the blob; `None` when nobody is signed in.
    async fn load(&self) -> Result<Option<StoredCredential>>;

    /// Write the whole blob.
    async fn save(&self, credential: &StoredCredential) -> Result<()>;

    /// Erase the blob. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<()>;

    /// Swap `expected` for `token`, keeping the user record.
    ///
    /// Writes only while the stored token is still `expected`. Returns
    /// `false` without writing when the blob is gone or holds another token,
    /// so a refresh finishing after logout or a new login changes nothing.
    async fn replace_token(&self, expected: &str, token: &str) -> Result<bool> {
        match self.load().await? {
            Some(mut credential) if credential.token == expected => {
                credential.token = token.to_string();
                self.save(&credential).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// In-process store, for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<StoredCredential>>,
}

impl MemoryCredentialStore {
    /// An empty (signed-out) store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `credential`.
    pub fn with_credential(credential: StoredCredential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredential>> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, credential: &StoredCredential) -> Result<()> {
        *self.slot.lock() = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }

    async fn replace_token(&self, expected: &str, token: &str) -> Result<bool> {
        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(credential) if credential.token == expected => {
                credential.token = token.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Store backed by `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never sees a half-written blob.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store the blob for `key` inside `dir`.
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", key)),
        }
    }

    /// Location of the blob on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredential>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error(&self.path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| storage_error(&self.path, e))
    }

    async fn save(&self, credential: &StoredCredential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, e))?;
        }
        let bytes = serde_json::to_vec(credential).map_err(|e| storage_error(&self.path, e))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| storage_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error(&self.path, e))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&self.path, e)),
        }
    }
}

fn storage_error(path: &Path, err: impl std::fmt::Display) -> ClientError {
    ClientError::Storage(format!("{}: {}", path.display(), err))
}
