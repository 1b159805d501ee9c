//! Login-attempt tracking and lockout.
//!
//! A [`Throttle`] wraps a [`ThrottleStore`] and a [`ThrottleConfig`]. The
//! transition rules live in [`ThrottleRecord`]; stores only provide atomic
//! read-modify-write per key so concurrent failures never lose increments.
//!
//! Keys are built from the login attribute, the client IP, or both. IP-only
//! keying lets one address lock out a victim; login-only keying lets a botnet
//! spread attempts. The composite is the default and the policy stays
//! configurable per deployment.

mod memory;
mod postgres;
mod record;

pub use memory::MemoryThrottleStore;
pub use postgres::PgThrottleStore;
pub use record::{ThrottleRecord, ThrottleStatus};

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Error;

const DEFAULT_ATTEMPT_LIMIT: i64 = 5;
const DEFAULT_SUSPENSION_TIME_SECONDS: i64 = 15 * 60;
const DEFAULT_BAN_AFTER_SUSPENSIONS: i64 = 3;

/// Which identity parts a throttle key is made of.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    Login,
    Ip,
    #[default]
    LoginAndIp,
}

/// Canonical throttle key. Absent parts render as `-` so the same policy
/// always produces the same storage key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ThrottleKey {
    login: Option<String>,
    ip: Option<String>,
}

impl ThrottleKey {
    #[must_use]
    pub fn from_parts(policy: KeyPolicy, login: Option<&str>, ip: Option<&str>) -> Self {
        let login = login.map(str::to_string);
        let ip = ip.map(str::to_string);
        match policy {
            KeyPolicy::Login => Self { login, ip: None },
            KeyPolicy::Ip => Self { login: None, ip },
            KeyPolicy::LoginAndIp => Self { login, ip },
        }
    }

    #[must_use]
    pub fn canonical(&self) -> String {
        format!(
            "login={};ip={}",
            self.login.as_deref().unwrap_or("-"),
            self.ip.as_deref().unwrap_or("-")
        )
    }
}

impl fmt::Display for ThrottleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    enabled: bool,
    attempt_limit: i64,
    suspension_time_seconds: i64,
    /// Consecutive suspensions before a permanent ban; zero disables banning.
    ban_after_suspensions: i64,
    key_policy: KeyPolicy,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            attempt_limit: DEFAULT_ATTEMPT_LIMIT,
            suspension_time_seconds: DEFAULT_SUSPENSION_TIME_SECONDS,
            ban_after_suspensions: DEFAULT_BAN_AFTER_SUSPENSIONS,
            key_policy: KeyPolicy::LoginAndIp,
        }
    }
}

impl ThrottleConfig {
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_attempt_limit(mut self, limit: i64) -> Self {
        self.attempt_limit = limit;
        self
    }

    #[must_use]
    pub fn with_suspension_time_seconds(mut self, seconds: i64) -> Self {
        self.suspension_time_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_ban_after_suspensions(mut self, suspensions: i64) -> Self {
        self.ban_after_suspensions = suspensions;
        self
    }

    #[must_use]
    pub fn with_key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn attempt_limit(&self) -> i64 {
        self.attempt_limit
    }

    #[must_use]
    pub fn suspension_time_seconds(&self) -> i64 {
        self.suspension_time_seconds
    }

    #[must_use]
    pub fn ban_after_suspensions(&self) -> i64 {
        self.ban_after_suspensions
    }

    #[must_use]
    pub fn key_policy(&self) -> KeyPolicy {
        self.key_policy
    }
}

/// Transition applied under the store's per-key lock.
pub type Apply = Box<dyn FnOnce(&mut ThrottleRecord) + Send>;

/// Persistence contract for throttle records.
///
/// `mutate` must be atomic with respect to other concurrent mutations of the
/// same key; lost increments would under-count attempts.
#[async_trait]
pub trait ThrottleStore: Send + Sync {
    async fn load(&self, key: &ThrottleKey) -> anyhow::Result<Option<ThrottleRecord>>;
    async fn mutate(&self, key: &ThrottleKey, apply: Apply) -> anyhow::Result<ThrottleRecord>;
}

pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}

/// Brute-force defense over one store and one policy.
#[derive(Clone)]
pub struct Throttle {
    store: Arc<dyn ThrottleStore>,
    config: ThrottleConfig,
}

impl Throttle {
    #[must_use]
    pub fn new(store: Arc<dyn ThrottleStore>, config: ThrottleConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Build the throttle key for an attempt under the configured policy.
    #[must_use]
    pub fn key(&self, login: Option<&str>, ip: Option<&str>) -> ThrottleKey {
        ThrottleKey::from_parts(self.config.key_policy(), login, ip)
    }

    /// Effective state of the key right now.
    ///
    /// With throttling disabled every key reports [`ThrottleStatus::Clear`],
    /// but attempts keep being recorded so re-enabling resumes with accurate
    /// history.
    ///
    /// # Errors
    /// [`Error::Storage`] when the store fails; the caller must fail safe.
    pub async fn status(&self, key: &ThrottleKey) -> Result<ThrottleStatus, Error> {
        if !self.config.enabled {
            return Ok(ThrottleStatus::Clear);
        }
        let record = self.store.load(key).await?.unwrap_or_default();
        Ok(record.status(now_unix(), &self.config))
    }

    pub async fn is_suspended(&self, key: &ThrottleKey) -> Result<bool, Error> {
        Ok(matches!(
            self.status(key).await?,
            ThrottleStatus::Suspended { .. }
        ))
    }

    pub async fn is_banned(&self, key: &ThrottleKey) -> Result<bool, Error> {
        Ok(self.status(key).await? == ThrottleStatus::Banned)
    }

    /// Attempts left before suspension, for user feedback. Reflects recorded
    /// history even while throttling is disabled.
    pub async fn remaining_attempts(&self, key: &ThrottleKey) -> Result<i64, Error> {
        let record = self.store.load(key).await?.unwrap_or_default();
        Ok(record.remaining_attempts(&self.config))
    }

    pub async fn record_failure(&self, key: &ThrottleKey) -> Result<ThrottleRecord, Error> {
        let config = self.config.clone();
        let now = now_unix();
        let record = self
            .store
            .mutate(key, Box::new(move |record| record.register_failure(now, &config)))
            .await?;
        if record.banned {
            tracing::warn!(key = %key, attempts = record.attempts, "login key banned");
        } else if record.suspended_until_unix.is_some() {
            tracing::warn!(key = %key, attempts = record.attempts, "login key suspended");
        } else {
            tracing::debug!(key = %key, attempts = record.attempts, "login failure recorded");
        }
        Ok(record)
    }

    pub async fn record_success(&self, key: &ThrottleKey) -> Result<ThrottleRecord, Error> {
        let now = now_unix();
        let record = self
            .store
            .mutate(key, Box::new(move |record| record.register_success(now)))
            .await?;
        tracing::debug!(key = %key, "login success recorded");
        Ok(record)
    }

    /// Administrative clear of counter and suspension. Does not lift a ban.
    pub async fn reset(&self, key: &ThrottleKey) -> Result<ThrottleRecord, Error> {
        Ok(self
            .store
            .mutate(key, Box::new(ThrottleRecord::reset))
            .await?)
    }

    /// Administrative lift of a ban.
    pub async fn unban(&self, key: &ThrottleKey) -> Result<ThrottleRecord, Error> {
        Ok(self
            .store
            .mutate(key, Box::new(ThrottleRecord::unban))
            .await?)
    }
}
