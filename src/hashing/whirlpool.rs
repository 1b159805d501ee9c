//! Whirlpool + salt strategy, same stored form as the SHA-256 one.

use anyhow::Result;
use whirlpool::Whirlpool;

use super::{Hasher, random_salt, salted_hex_digest, slow_equals};

#[derive(Clone, Copy, Debug)]
pub struct WhirlpoolHasher {
    salt_length: usize,
}

impl WhirlpoolHasher {
    #[must_use]
    pub fn new(salt_length: usize) -> Self {
        Self { salt_length }
    }
}

impl Hasher for WhirlpoolHasher {
    fn hash(&self, secret: &str) -> Result<String> {
        let salt = self.create_salt();
        let digest = salted_hex_digest::<Whirlpool>(salt.as_bytes(), secret.as_bytes());
        Ok(format!("{salt}{digest}"))
    }

    fn check_hash(&self, secret: &str, hashed: &str) -> bool {
        let bytes = hashed.as_bytes();
        if bytes.len() <= self.salt_length {
            return false;
        }
        let (salt, stored) = bytes.split_at(self.salt_length);
        let digest = salted_hex_digest::<Whirlpool>(salt, secret.as_bytes());
        slow_equals(digest.as_bytes(), stored)
    }

    fn create_salt(&self) -> String {
        random_salt(self.salt_length)
    }
}
