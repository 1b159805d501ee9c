//! Session-scoped identity store: one slot behind the host's session store.
//!
//! The host request layer owns the actual session; this adapter holds the
//! value for the lifetime of that session object. Doubles as the test store.

use anyhow::Result;
use std::sync::Mutex;

use super::IdentityStore;

#[derive(Debug)]
pub struct MemoryIdentityStore {
    key: String,
    value: Mutex<Option<String>>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Mutex::new(None),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn key(&self) -> &str {
        &self.key
    }

    fn put(&self, value: &str) -> Result<()> {
        *self.value.lock().expect("session lock") = Some(value.to_string());
        Ok(())
    }

    fn get(&self) -> Result<Option<String>> {
        Ok(self.value.lock().expect("session lock").clone())
    }

    fn forget(&self) -> Result<()> {
        *self.value.lock().expect("session lock") = None;
        Ok(())
    }
}
