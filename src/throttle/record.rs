//! Pure lockout state machine over a single throttle record.
//!
//! All transitions take an explicit `now` (unix seconds) so the machine is
//! deterministic under test. Persistence and atomicity live in the stores.

use serde::{Deserialize, Serialize};

use super::ThrottleConfig;

/// Effective state of a record at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleStatus {
    /// No pressure; attempts below the limit.
    Clear,
    /// Counter at or over the limit with no live suspension. This is what an
    /// expired suspension looks like until the next attempt is recorded.
    Warning,
    /// Temporary lockout until the given unix timestamp.
    Suspended { until_unix: i64 },
    /// Permanent lockout; only an explicit unban clears it.
    Banned,
}

/// Per-key attempt bookkeeping. Created lazily on the first failure,
/// reset but never deleted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleRecord {
    pub attempts: i64,
    pub last_attempt_unix: i64,
    pub suspended_until_unix: Option<i64>,
    /// Consecutive suspensions; a successful login breaks the run.
    pub suspensions: i64,
    pub banned: bool,
}

impl ThrottleRecord {
    /// Record a failed attempt and escalate if the limit is hit.
    ///
    /// While a suspension is live the expiry is not extended. Once it has
    /// expired, the first recorded attempt clears it and restarts the count;
    /// expiry alone never resets the counter.
    pub fn register_failure(&mut self, now: i64, config: &ThrottleConfig) {
        self.last_attempt_unix = now;

        if self.banned {
            self.attempts += 1;
            return;
        }

        match self.suspended_until_unix {
            Some(until) if now < until => {
                self.attempts += 1;
                return;
            }
            Some(_) => {
                self.suspended_until_unix = None;
                self.attempts = 0;
            }
            None => {}
        }

        self.attempts += 1;
        if self.attempts >= config.attempt_limit() {
            self.suspensions += 1;
            if config.ban_after_suspensions() > 0
                && self.suspensions >= config.ban_after_suspensions()
            {
                self.banned = true;
                self.suspended_until_unix = None;
            } else {
                self.suspended_until_unix = Some(now + config.suspension_time_seconds());
            }
        }
    }

    /// Record a successful attempt: counter, suspension, and the
    /// consecutive-suspension run all reset. A ban survives.
    pub fn register_success(&mut self, now: i64) {
        self.last_attempt_unix = now;
        self.attempts = 0;
        self.suspended_until_unix = None;
        self.suspensions = 0;
    }

    /// Administrative clear of counter and suspension. Does not touch the ban
    /// or the consecutive-suspension run.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.suspended_until_unix = None;
    }

    /// Administrative lift of a ban; also forgives the suspension run so the
    /// next suspension does not immediately re-ban.
    pub fn unban(&mut self) {
        self.banned = false;
        self.suspensions = 0;
    }

    #[must_use]
    pub fn status(&self, now: i64, config: &ThrottleConfig) -> ThrottleStatus {
        if self.banned {
            return ThrottleStatus::Banned;
        }
        if let Some(until_unix) = self.suspended_until_unix {
            if now < until_unix {
                return ThrottleStatus::Suspended { until_unix };
            }
        }
        if self.attempts >= config.attempt_limit() {
            return ThrottleStatus::Warning;
        }
        ThrottleStatus::Clear
    }

    #[must_use]
    pub fn remaining_attempts(&self, config: &ThrottleConfig) -> i64 {
        (config.attempt_limit() - self.attempts).max(0)
    }
}
