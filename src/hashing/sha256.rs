//! SHA-256 + salt strategy.
//!
//! Stored form is `salt ++ hex(sha256(salt ++ secret))`; the salt prefix is
//! recovered on verification and the digests compared with `slow_equals`.

use anyhow::Result;
use sha2::Sha256;

use super::{Hasher, random_salt, salted_hex_digest, slow_equals};

#[derive(Clone, Copy, Debug)]
pub struct Sha256Hasher {
    salt_length: usize,
}

impl Sha256Hasher {
    #[must_use]
    pub fn new(salt_length: usize) -> Self {
        Self { salt_length }
    }
}

impl Hasher for Sha256Hasher {
    fn hash(&self, secret: &str) -> Result<String> {
        let salt = self.create_salt();
        let digest = salted_hex_digest::<Sha256>(salt.as_bytes(), secret.as_bytes());
        Ok(format!("{salt}{digest}"))
    }

    fn check_hash(&self, secret: &str, hashed: &str) -> bool {
        // Stored hashes may come from untrusted storage; work on bytes so a
        // short or non-ASCII value cannot panic a split.
        let bytes = hashed.as_bytes();
        if bytes.len() <= self.salt_length {
            return false;
        }
        let (salt, stored) = bytes.split_at(self.salt_length);
        let digest = salted_hex_digest::<Sha256>(salt, secret.as_bytes());
        slow_equals(digest.as_bytes(), stored)
    }

    fn create_salt(&self) -> String {
        random_salt(self.salt_length)
    }
}
