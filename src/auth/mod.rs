//! Bearer credential management.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CredentialManager`] | Owns the token lifecycle and the single in-flight refresh |
//! | [`CredentialStore`] | Keyed persistence for the `{token, user}` blob |
//! | [`Credential`] | A token with its decoded expiry |

mod manager;
mod store;
mod token;

pub use manager::{CredentialManager, LOGIN_PATH, REFRESH_PATH};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoredCredential};
pub use token::{decode_expiry, now_epoch_seconds, Credential};

#[cfg(test)]
pub(crate) use token::make_jwt;
