//! Password hashing strategies.
//!
//! Four interchangeable strategies sit behind the [`Hasher`] trait:
//! `native` (Argon2id), `bcrypt`, `sha256`, and `whirlpool`. The strategy is
//! chosen once at startup by [`HasherKind`]; an unknown name fails fast with
//! a configuration error.
//!
//! The salted-digest strategies verify with [`slow_equals`], a comparison
//! whose cost does not depend on where the first mismatching byte occurs.
//! Argon2 and bcrypt verify through their own constant-time routines.

mod bcrypt;
mod native;
mod sha256;
mod whirlpool;

pub use bcrypt::BcryptHasher;
pub use native::NativeHasher;
pub use sha256::Sha256Hasher;
pub use whirlpool::WhirlpoolHasher;

use anyhow::Result;
use rand::Rng;
use rand::rngs::OsRng;
use sha2::Digest;
use std::sync::Arc;

use crate::config::{AuthConfig, HasherKind};

/// Converts a plaintext secret to and from a verifiable hashed form.
pub trait Hasher: Send + Sync {
    /// Hash a secret into its stored form.
    fn hash(&self, secret: &str) -> Result<String>;

    /// Verify a secret against a stored hash.
    fn check_hash(&self, secret: &str, hashed: &str) -> bool;

    /// Create a random alphanumeric salt of the configured length.
    fn create_salt(&self) -> String;
}

/// Build the configured hashing strategy.
#[must_use]
pub fn build_hasher(config: &AuthConfig) -> Arc<dyn Hasher> {
    match config.hasher() {
        HasherKind::Native => Arc::new(NativeHasher::new()),
        HasherKind::Bcrypt => Arc::new(BcryptHasher::new(config.bcrypt_cost())),
        HasherKind::Sha256 => Arc::new(Sha256Hasher::new(config.salt_length())),
        HasherKind::Whirlpool => Arc::new(WhirlpoolHasher::new(config.salt_length())),
    }
}

/// Compares two byte strings in length-constant time.
///
/// The accumulator starts as the XOR of the two lengths and ORs in the XOR of
/// every byte pair over the common prefix; equality holds iff it ends at zero.
/// No early exit, so the cost is independent of the first mismatch position.
#[must_use]
pub fn slow_equals(a: &[u8], b: &[u8]) -> bool {
    let mut diff = a.len() ^ b.len();
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

const SALT_POOL: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Draw `length` characters from the 62-symbol alphanumeric pool.
pub(crate) fn random_salt(length: usize) -> String {
    (0..length)
        .map(|_| char::from(SALT_POOL[OsRng.gen_range(0..SALT_POOL.len())]))
        .collect()
}

/// `hex(digest(salt ++ secret))` for the salted-digest strategies.
pub(crate) fn salted_hex_digest<D: Digest>(salt: &[u8], secret: &[u8]) -> String {
    let mut hasher = D::new();
    hasher.update(salt);
    hasher.update(secret);
    hex::encode(hasher.finalize())
}
