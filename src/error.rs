//! Public error taxonomy for the authentication core.
//!
//! Security-relevant ambiguity is collapsed before it reaches a caller:
//! an unknown login and a wrong password are both [`Error::InvalidCredentials`].
//! Storage failures are never folded into a denial; callers must be able to
//! tell "denied" apart from "system unavailable".

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    /// An unrecognized hasher name was selected at configuration time.
    #[error("unknown hasher: {0}")]
    UnknownHasher(String),

    /// The configured login attribute is not a safe SQL identifier.
    #[error("invalid login column: {0}")]
    InvalidLoginColumn(String),

    /// Wrong secret or unknown identifier. Never distinguished.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Temporary lockout with the remaining duration.
    #[error("login suspended, retry in {retry_after_seconds}s")]
    Suspended { retry_after_seconds: u64 },

    /// Permanent lockout until an explicit administrative unban.
    #[error("login banned")]
    Banned,

    /// Registration conflict on the login attribute.
    #[error("login already taken")]
    LoginTaken,

    /// A user references a group that does not exist.
    #[error("user references missing group {0}")]
    GroupIntegrity(Uuid),

    /// Repository or throttle persistence failure.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
