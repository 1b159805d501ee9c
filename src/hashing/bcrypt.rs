//! bcrypt strategy with configurable cost.

use anyhow::{Context, Result};

use super::{Hasher, random_salt};

// bcrypt's modular-crypt format carries a 22-character salt.
const BCRYPT_SALT_LENGTH: usize = 22;

#[derive(Clone, Copy, Debug)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    #[must_use]
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Hasher for BcryptHasher {
    fn hash(&self, secret: &str) -> Result<String> {
        bcrypt::hash(secret, self.cost).context("bcrypt hashing failed")
    }

    fn check_hash(&self, secret: &str, hashed: &str) -> bool {
        bcrypt::verify(secret, hashed).unwrap_or(false)
    }

    fn create_salt(&self) -> String {
        random_salt(BCRYPT_SALT_LENGTH)
    }
}
