//! User and group entities plus the repository contract.
//!
//! Lookups return `Ok(None)` on a miss — "user not found" is never an error
//! here so callers can collapse it with "wrong password" before anything
//! reaches the outside (username enumeration defense).

mod memory;
mod postgres;

pub use memory::MemoryUserRepository;
pub use postgres::PgUserRepository;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::Error;

/// Permission name to allow/deny. An explicit `false` is a deny that
/// overrides any grant merged before it.
pub type Permissions = BTreeMap<String, bool>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Value of the configured login attribute (email by default).
    pub login: String,
    pub password_hash: String,
    pub group_ids: Vec<Uuid>,
    /// User-level overrides, applied after group grants.
    pub permissions: Permissions,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub permissions: Permissions,
}

/// Attributes for user creation; the repository assigns the id.
#[derive(Clone, Debug, Default)]
pub struct NewUser {
    pub login: String,
    pub password_hash: String,
    pub group_ids: Vec<Uuid>,
    pub permissions: Permissions,
}

/// Outcome when attempting to create a user.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(User),
    /// The login attribute value is already taken.
    Conflict,
}

/// Repository abstraction for User/Group entities.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_login(&self, login: &str) -> anyhow::Result<Option<User>>;
    async fn create_user(&self, user: NewUser) -> anyhow::Result<CreateOutcome>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
    async fn find_group_by_id(&self, id: Uuid) -> anyhow::Result<Option<Group>>;
    async fn find_group_by_name(&self, name: &str) -> anyhow::Result<Option<Group>>;
    async fn create_group(&self, name: &str, permissions: Permissions) -> anyhow::Result<Group>;
}

/// Normalize a login attribute value for lookups and throttle keys.
#[must_use]
pub fn normalize_login(login: &str) -> String {
    login.trim().to_lowercase()
}

/// Merge group grants in membership order, then apply user-level overrides.
///
/// # Errors
/// [`Error::GroupIntegrity`] when the user references a group that does not
/// exist; dangling references are reported, never skipped.
pub async fn resolve_permissions(
    user: &User,
    repo: &dyn UserRepository,
) -> Result<Permissions, Error> {
    let mut merged = Permissions::new();
    for group_id in &user.group_ids {
        let group = repo
            .find_group_by_id(*group_id)
            .await?
            .ok_or(Error::GroupIntegrity(*group_id))?;
        merged.extend(group.permissions.clone());
    }
    merged.extend(user.permissions.clone());
    Ok(merged)
}

/// A permission grants access only when present and true.
#[must_use]
pub fn has_access(permissions: &Permissions, name: &str) -> bool {
    permissions.get(name).copied().unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::{
        MemoryUserRepository, NewUser, Permissions, User, UserRepository, has_access,
        normalize_login, resolve_permissions,
    };
    use crate::error::Error;
    use uuid::Uuid;

    fn perms(entries: &[(&str, bool)]) -> Permissions {
        entries
            .iter()
            .map(|(name, allowed)| ((*name).to_string(), *allowed))
            .collect()
    }

    #[test]
    fn normalize_login_trims_and_lowercases() {
        assert_eq!(normalize_login(" Alice@Example.COM "), "alice@example.com");
    }

    #[tokio::test]
    async fn permissions_union_with_user_override() -> anyhow::Result<()> {
        let repo = MemoryUserRepository::new();
        let editors = repo
            .create_group("editors", perms(&[("posts.write", true), ("posts.delete", false)]))
            .await?;
        let admins = repo
            .create_group("admins", perms(&[("users.manage", true)]))
            .await?;

        let user = User {
            id: Uuid::new_v4(),
            login: "alice@example.com".to_string(),
            password_hash: String::new(),
            group_ids: vec![editors.id, admins.id],
            permissions: perms(&[("posts.delete", true)]),
        };

        let resolved = resolve_permissions(&user, &repo).await.map_err(anyhow::Error::from)?;
        assert!(has_access(&resolved, "posts.write"));
        assert!(has_access(&resolved, "users.manage"));
        // User-level grant overrides the group deny.
        assert!(has_access(&resolved, "posts.delete"));
        assert!(!has_access(&resolved, "anything.else"));
        Ok(())
    }

    #[tokio::test]
    async fn group_denies_win_over_grants_without_override() -> anyhow::Result<()> {
        let repo = MemoryUserRepository::new();
        let writers = repo
            .create_group("writers", perms(&[("posts.write", true)]))
            .await?;
        let restricted = repo
            .create_group("restricted", perms(&[("posts.write", false)]))
            .await?;

        let user = User {
            id: Uuid::new_v4(),
            login: "bob@example.com".to_string(),
            password_hash: String::new(),
            group_ids: vec![writers.id, restricted.id],
            permissions: Permissions::new(),
        };

        let resolved = resolve_permissions(&user, &repo).await.map_err(anyhow::Error::from)?;
        assert!(!has_access(&resolved, "posts.write"));
        Ok(())
    }

    #[tokio::test]
    async fn dangling_group_reference_is_reported() {
        let repo = MemoryUserRepository::new();
        let missing = Uuid::new_v4();
        let user = User {
            id: Uuid::new_v4(),
            login: "carol@example.com".to_string(),
            password_hash: String::new(),
            group_ids: vec![missing],
            permissions: Permissions::new(),
        };

        let err = resolve_permissions(&user, &repo).await.unwrap_err();
        assert!(matches!(err, Error::GroupIntegrity(id) if id == missing));
    }

    #[tokio::test]
    async fn create_user_reports_conflicts() -> anyhow::Result<()> {
        let repo = MemoryUserRepository::new();
        let outcome = repo
            .create_user(NewUser {
                login: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
                ..NewUser::default()
            })
            .await?;
        assert!(matches!(outcome, super::CreateOutcome::Created(_)));

        // Same login, different case: still a conflict.
        let outcome = repo
            .create_user(NewUser {
                login: "Alice@Example.com".to_string(),
                password_hash: "hash".to_string(),
                ..NewUser::default()
            })
            .await?;
        assert!(matches!(outcome, super::CreateOutcome::Conflict));
        Ok(())
    }
}
