//! In-memory repository for tests and small embeddings.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use super::{CreateOutcome, Group, NewUser, Permissions, User, UserRepository, normalize_login};

#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
    /// Normalized login -> user id.
    logins: RwLock<HashMap<String, Uuid>>,
    groups: RwLock<HashMap<Uuid, Group>>,
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().expect("users lock").get(&id).cloned())
    }

    async fn find_by_login(&self, login: &str) -> anyhow::Result<Option<User>> {
        let id = self
            .logins
            .read()
            .expect("logins lock")
            .get(&normalize_login(login))
            .copied();
        match id {
            Some(id) => self.find_by_id(id).await,
            None => Ok(None),
        }
    }

    async fn create_user(&self, user: NewUser) -> anyhow::Result<CreateOutcome> {
        let normalized = normalize_login(&user.login);
        let mut logins = self.logins.write().expect("logins lock");
        if logins.contains_key(&normalized) {
            return Ok(CreateOutcome::Conflict);
        }
        let created = User {
            id: Uuid::new_v4(),
            login: user.login,
            password_hash: user.password_hash,
            group_ids: user.group_ids,
            permissions: user.permissions,
        };
        logins.insert(normalized, created.id);
        self.users
            .write()
            .expect("users lock")
            .insert(created.id, created.clone());
        Ok(CreateOutcome::Created(created))
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let mut users = self.users.write().expect("users lock");
        let user = users
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no such user: {id}"))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn find_group_by_id(&self, id: Uuid) -> anyhow::Result<Option<Group>> {
        Ok(self.groups.read().expect("groups lock").get(&id).cloned())
    }

    async fn find_group_by_name(&self, name: &str) -> anyhow::Result<Option<Group>> {
        Ok(self
            .groups
            .read()
            .expect("groups lock")
            .values()
            .find(|group| group.name == name)
            .cloned())
    }

    async fn create_group(&self, name: &str, permissions: Permissions) -> anyhow::Result<Group> {
        let group = Group {
            id: Uuid::new_v4(),
            name: name.to_string(),
            permissions,
        };
        self.groups
            .write()
            .expect("groups lock")
            .insert(group.id, group.clone());
        Ok(group)
    }
}
