//! # Portcullis (Credential Verification & Login Throttling)
//!
//! `portcullis` is an authentication core: it verifies user credentials,
//! protects login against brute force, and persists an authenticated identity
//! across requests. It has no HTTP surface of its own — a thin request layer
//! composes the pieces and feeds in the caller's IP and credentials.
//!
//! ## Components
//!
//! - **[`hashing`]** — interchangeable password hashing strategies behind one
//!   trait, with a constant-time comparison for the salted-digest schemes.
//! - **[`users`]** — User/Group entities and the repository contract, with
//!   in-memory and Postgres backends.
//! - **[`throttle`]** — per-key login-attempt tracking with suspension and
//!   ban escalation; counter updates are atomic per key.
//! - **[`session`]** — opaque persisted-identity token over session- or
//!   cookie-scoped transports, selected by configuration.
//! - **[`Auth`]** — the facade orchestrating authenticate / check / logout.
//!
//! ## Security posture
//!
//! An unknown login and a wrong password report the same
//! [`Error::InvalidCredentials`], and both record a throttle failure, so
//! callers cannot enumerate accounts and attackers cannot guess for free.
//! Storage failures stay distinguishable from denials: a request that cannot
//! reach its stores fails safe as not-authenticated, never as authenticated.
//!
//! ```
//! use portcullis::{Auth, AuthConfig, Credentials};
//! use portcullis::session::MemoryIdentityStore;
//! use portcullis::throttle::MemoryThrottleStore;
//! use portcullis::users::MemoryUserRepository;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), portcullis::Error> {
//! let auth = Auth::new(
//!     AuthConfig::new(),
//!     Arc::new(MemoryUserRepository::new()),
//!     Arc::new(MemoryThrottleStore::new()),
//!     Arc::new(MemoryIdentityStore::new("portcullis_identity")),
//! );
//!
//! auth.register(&Credentials::new("alice@example.com", "secret123")).await?;
//! let user = auth
//!     .authenticate(&Credentials::new("alice@example.com", "secret123"), None, false)
//!     .await?;
//! assert_eq!(auth.check().await?.map(|u| u.id), Some(user.id));
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod hashing;
pub mod session;
pub mod throttle;
pub mod users;

pub use auth::{Auth, Credentials};
pub use config::{AuthConfig, HasherKind, TransportKind};
pub use error::Error;
pub use hashing::{Hasher, build_hasher, slow_equals};
pub use session::{IdentityStore, PersistedIdentity, build_identity_store};
pub use throttle::{KeyPolicy, Throttle, ThrottleConfig, ThrottleKey, ThrottleStatus};
pub use users::{Group, User, UserRepository};
