//! Cookie-scoped identity store.
//!
//! The host request layer feeds the incoming `Cookie` header in and drains
//! `Set-Cookie` values out after the request. Values are hex-armored so an
//! opaque token can never break header syntax.

use anyhow::Result;
use std::sync::Mutex;

use super::IdentityStore;

#[derive(Debug, Default)]
struct CookieState {
    value: Option<String>,
    /// `Set-Cookie` headers produced by this request, in order.
    pending: Vec<String>,
}

#[derive(Debug)]
pub struct CookieIdentityStore {
    key: String,
    secure: bool,
    max_age_seconds: i64,
    state: Mutex<CookieState>,
}

impl CookieIdentityStore {
    #[must_use]
    pub fn new(key: impl Into<String>, secure: bool, max_age_seconds: i64) -> Self {
        Self {
            key: key.into(),
            secure,
            max_age_seconds,
            state: Mutex::new(CookieState::default()),
        }
    }

    /// Load the identity value from an incoming `Cookie` header, if present.
    pub fn ingest_cookie_header(&self, header: &str) {
        let mut found = None;
        for pair in header.split(';') {
            let trimmed = pair.trim();
            let mut parts = trimmed.splitn(2, '=');
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            if key.trim() == self.key {
                found = decode_value(value.trim());
                break;
            }
        }
        self.state.lock().expect("cookie lock").value = found;
    }

    /// Drain the `Set-Cookie` headers produced so far.
    #[must_use]
    pub fn take_set_cookie_headers(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().expect("cookie lock").pending)
    }

    fn cookie_header(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{key}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}",
            key = self.key
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn decode_value(encoded: &str) -> Option<String> {
    let bytes = hex::decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

impl IdentityStore for CookieIdentityStore {
    fn key(&self) -> &str {
        &self.key
    }

    fn put(&self, value: &str) -> Result<()> {
        let encoded = hex::encode(value.as_bytes());
        let header = self.cookie_header(&encoded, self.max_age_seconds);
        let mut state = self.state.lock().expect("cookie lock");
        state.value = Some(value.to_string());
        state.pending.push(header);
        Ok(())
    }

    fn get(&self) -> Result<Option<String>> {
        Ok(self.state.lock().expect("cookie lock").value.clone())
    }

    fn forget(&self) -> Result<()> {
        let header = self.cookie_header("", 0);
        let mut state = self.state.lock().expect("cookie lock");
        state.value = None;
        state.pending.push(header);
        Ok(())
    }
}
