//! Postgres-backed throttle store.
//!
//! `mutate` runs inside a transaction with `SELECT ... FOR UPDATE`, so the
//! read-modify-write is serialized per key across service instances and
//! concurrent failures cannot lose increments.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::Instrument;

use super::{Apply, ThrottleKey, ThrottleRecord, ThrottleStore};

#[derive(Clone, Debug)]
pub struct PgThrottleStore {
    pool: PgPool,
}

impl PgThrottleStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> ThrottleRecord {
    let last_attempt_at: DateTime<Utc> = row.get("last_attempt_at");
    let suspended_until: Option<DateTime<Utc>> = row.get("suspended_until");
    ThrottleRecord {
        attempts: row.get("attempts"),
        last_attempt_unix: last_attempt_at.timestamp(),
        suspended_until_unix: suspended_until.map(|at| at.timestamp()),
        suspensions: row.get("suspensions"),
        banned: row.get("banned"),
    }
}

fn timestamp(unix: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(unix, 0).ok_or_else(|| anyhow!("timestamp out of range: {unix}"))
}

#[async_trait]
impl ThrottleStore for PgThrottleStore {
    async fn load(&self, key: &ThrottleKey) -> Result<Option<ThrottleRecord>> {
        let query = r"
            SELECT attempts, last_attempt_at, suspended_until, suspensions, banned
            FROM login_throttle
            WHERE key = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(key.canonical())
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load throttle record")?;
        Ok(row.map(|row| record_from_row(&row)))
    }

    async fn mutate(&self, key: &ThrottleKey, apply: Apply) -> Result<ThrottleRecord> {
        let canonical = key.canonical();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin throttle transaction")?;

        // Records are created lazily on the first recorded attempt.
        let query = "INSERT INTO login_throttle (key) VALUES ($1) ON CONFLICT (key) DO NOTHING";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&canonical)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to seed throttle record")?;

        let query = r"
            SELECT attempts, last_attempt_at, suspended_until, suspensions, banned
            FROM login_throttle
            WHERE key = $1
            FOR UPDATE
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(&canonical)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .context("failed to lock throttle record")?;

        let mut record = record_from_row(&row);
        apply(&mut record);

        let query = r"
            UPDATE login_throttle
            SET attempts = $2,
                last_attempt_at = $3,
                suspended_until = $4,
                suspensions = $5,
                banned = $6
            WHERE key = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let suspended_until = record
            .suspended_until_unix
            .map(timestamp)
            .transpose()?;
        sqlx::query(query)
            .bind(&canonical)
            .bind(record.attempts)
            .bind(timestamp(record.last_attempt_unix)?)
            .bind(suspended_until)
            .bind(record.suspensions)
            .bind(record.banned)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to update throttle record")?;

        tx.commit().await.context("commit throttle transaction")?;
        Ok(record)
    }
}
