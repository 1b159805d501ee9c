//! Persisted-identity token storage.
//!
//! The token is an opaque serialized marker (`user id + remember flag`). The
//! core never inspects what a transport did to it beyond existence and
//! deserialization; `get()` returning nothing means "no authenticated
//! identity", never an error.

mod cookie;
mod memory;

pub use cookie::CookieIdentityStore;
pub use memory::MemoryIdentityStore;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{AuthConfig, TransportKind};

/// Marker proving a prior successful authentication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedIdentity {
    pub user_id: Uuid,
    pub remember: bool,
}

impl PersistedIdentity {
    /// Serialize into the opaque stored form.
    ///
    /// # Errors
    /// Propagates serialization failure.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to encode identity token")
    }

    /// Decode a stored token. `None` for anything unreadable; a corrupt
    /// token means "not authenticated", not a fault.
    #[must_use]
    pub fn decode(value: &str) -> Option<Self> {
        serde_json::from_str(value).ok()
    }
}

/// Opaque key-value contract every transport implements.
pub trait IdentityStore: Send + Sync {
    /// Storage key this store writes under.
    fn key(&self) -> &str;

    fn put(&self, value: &str) -> Result<()>;

    fn get(&self) -> Result<Option<String>>;

    fn forget(&self) -> Result<()>;
}

/// Build the identity store for the configured transport.
#[must_use]
pub fn build_identity_store(config: &AuthConfig) -> Arc<dyn IdentityStore> {
    match config.transport() {
        TransportKind::Session => Arc::new(MemoryIdentityStore::new(config.session_key())),
        TransportKind::Cookie => Arc::new(CookieIdentityStore::new(
            config.cookie_key(),
            config.cookie_secure(),
            config.cookie_max_age_seconds(),
        )),
    }
}
