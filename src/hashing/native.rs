//! The adaptive "native" strategy: Argon2id producing PHC-format strings.

use anyhow::{Result, anyhow};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, password_hash::rand_core::OsRng};

use super::{Hasher, random_salt};

/// Salt carried inside the PHC string; `create_salt` only serves the shared
/// trait contract.
const PHC_SALT_LENGTH: usize = 22;

#[derive(Clone, Copy, Debug, Default)]
pub struct NativeHasher;

impl NativeHasher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Hasher for NativeHasher {
    fn hash(&self, secret: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hashed = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|err| anyhow!("argon2 hashing failed: {err}"))?;
        Ok(hashed.to_string())
    }

    fn check_hash(&self, secret: &str, hashed: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hashed) else {
            return false;
        };
        Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok()
    }

    fn create_salt(&self) -> String {
        random_salt(PHC_SALT_LENGTH)
    }
}
