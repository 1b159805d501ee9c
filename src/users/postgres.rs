//! Postgres-backed user/group repository.
//!
//! The login column name is configurable per deployment. It is validated as a
//! bare lowercase identifier before ever being interpolated into SQL; values
//! are always bound parameters.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    CreateOutcome, Group, NewUser, Permissions, User, UserRepository, normalize_login,
};
use crate::error::Error;

const LOGIN_COLUMN_PATTERN: &str = "^[a-z_][a-z0-9_]*$";

#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: PgPool,
    login_column: String,
}

impl PgUserRepository {
    /// # Errors
    /// [`Error::InvalidLoginColumn`] when the configured login attribute is
    /// not a safe SQL identifier.
    pub fn new(pool: PgPool, login_column: &str) -> Result<Self, Error> {
        let pattern = Regex::new(LOGIN_COLUMN_PATTERN)
            .map_err(|err| Error::Storage(anyhow::Error::from(err)))?;
        if !pattern.is_match(login_column) {
            return Err(Error::InvalidLoginColumn(login_column.to_string()));
        }
        Ok(Self {
            pool,
            login_column: login_column.to_string(),
        })
    }

    fn user_from_row(&self, row: &PgRow, group_ids: Vec<Uuid>) -> User {
        let Json(permissions): Json<Permissions> = row.get("permissions");
        User {
            id: row.get("id"),
            login: row.get(self.login_column.as_str()),
            password_hash: row.get("password_hash"),
            group_ids,
            permissions,
        }
    }

    async fn group_ids_for(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let query = "SELECT group_id FROM users_groups WHERE user_id = $1 ORDER BY group_id";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to load group memberships")?;
        Ok(rows.iter().map(|row| row.get("group_id")).collect())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn group_from_row(row: &PgRow) -> Group {
    let Json(permissions): Json<Permissions> = row.get("permissions");
    Group {
        id: row.get("id"),
        name: row.get("name"),
        permissions,
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!(
            "SELECT id, {column}, password_hash, permissions FROM users WHERE id = $1",
            column = self.login_column
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by id")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let group_ids = self.group_ids_for(id).await?;
        Ok(Some(self.user_from_row(&row, group_ids)))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        let query = format!(
            "SELECT id, {column}, password_hash, permissions FROM users WHERE LOWER({column}) = $1",
            column = self.login_column
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(normalize_login(login))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by login")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user_id: Uuid = row.get("id");
        let group_ids = self.group_ids_for(user_id).await?;
        Ok(Some(self.user_from_row(&row, group_ids)))
    }

    async fn create_user(&self, user: NewUser) -> Result<CreateOutcome> {
        let mut tx = self.pool.begin().await.context("begin create_user")?;

        let query = format!(
            "INSERT INTO users ({column}, password_hash, permissions) VALUES ($1, $2, $3) RETURNING id",
            column = self.login_column
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(&user.login)
            .bind(&user.password_hash)
            .bind(Json(&user.permissions))
            .fetch_one(&mut *tx)
            .instrument(span)
            .await;

        let user_id: Uuid = match row {
            Ok(row) => row.get("id"),
            Err(err) => {
                if is_unique_violation(&err) {
                    let _ = tx.rollback().await;
                    return Ok(CreateOutcome::Conflict);
                }
                return Err(err).context("failed to insert user");
            }
        };

        let query = "INSERT INTO users_groups (user_id, group_id) VALUES ($1, $2)";
        for group_id in &user.group_ids {
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = query
            );
            sqlx::query(query)
                .bind(user_id)
                .bind(group_id)
                .execute(&mut *tx)
                .instrument(span)
                .await
                .context("failed to insert group membership")?;
        }

        tx.commit().await.context("commit create_user")?;
        Ok(CreateOutcome::Created(User {
            id: user_id,
            login: user.login,
            password_hash: user.password_hash,
            group_ids: user.group_ids,
            permissions: user.permissions,
        }))
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        let query = "UPDATE users SET password_hash = $2 WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update password hash")?;
        if result.rows_affected() == 0 {
            anyhow::bail!("no such user: {id}");
        }
        Ok(())
    }

    async fn find_group_by_id(&self, id: Uuid) -> Result<Option<Group>> {
        let query = "SELECT id, name, permissions FROM groups WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup group by id")?;
        Ok(row.map(|row| group_from_row(&row)))
    }

    async fn find_group_by_name(&self, name: &str) -> Result<Option<Group>> {
        let query = "SELECT id, name, permissions FROM groups WHERE name = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup group by name")?;
        Ok(row.map(|row| group_from_row(&row)))
    }

    async fn create_group(&self, name: &str, permissions: Permissions) -> Result<Group> {
        let query = "INSERT INTO groups (name, permissions) VALUES ($1, $2) RETURNING id";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .bind(Json(&permissions))
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert group")?;
        Ok(Group {
            id: row.get("id"),
            name: name.to_string(),
            permissions,
        })
    }
}
