//! The authentication facade.
//!
//! Composes hasher, credential store, throttle, and identity transport.
//! Side effects are strictly ordered: throttle state is updated before any
//! error returns, and the identity token is persisted only after the full
//! check chain has succeeded.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::error::Error;
use crate::hashing::{Hasher, build_hasher};
use crate::session::{IdentityStore, PersistedIdentity};
use crate::throttle::{Throttle, ThrottleStatus, ThrottleStore, now_unix};
use crate::users::{CreateOutcome, NewUser, User, UserRepository, normalize_login};

/// Login attribute value plus the plaintext secret. The secret is wrapped so
/// it cannot leak through Debug output or logs.
#[derive(Debug)]
pub struct Credentials {
    pub login: String,
    pub password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: SecretString::from(password.into()),
        }
    }
}

pub struct Auth {
    config: AuthConfig,
    hasher: Arc<dyn Hasher>,
    users: Arc<dyn UserRepository>,
    throttle: Throttle,
    identity: Arc<dyn IdentityStore>,
}

impl Auth {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserRepository>,
        throttle_store: Arc<dyn ThrottleStore>,
        identity: Arc<dyn IdentityStore>,
    ) -> Self {
        let hasher = build_hasher(&config);
        let throttle = Throttle::new(throttle_store, config.throttling().clone());
        Self {
            config,
            hasher,
            users,
            throttle,
            identity,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    /// Hash a secret with the configured strategy.
    ///
    /// # Errors
    /// [`Error::Storage`] when the hashing backend fails.
    pub fn hash(&self, secret: &str) -> Result<String, Error> {
        Ok(self.hasher.hash(secret)?)
    }

    /// Verify a secret against a stored hash with the configured strategy.
    #[must_use]
    pub fn check_hash(&self, secret: &str, hashed: &str) -> bool {
        self.hasher.check_hash(secret, hashed)
    }

    /// Verify credentials against the throttle, the credential store, and the
    /// hasher, then persist the identity.
    ///
    /// An unknown login still records a throttle failure, and reports the
    /// same [`Error::InvalidCredentials`] a wrong password does.
    ///
    /// # Errors
    /// [`Error::Banned`], [`Error::Suspended`], [`Error::InvalidCredentials`],
    /// or [`Error::Storage`].
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        ip: Option<&str>,
        remember: bool,
    ) -> Result<User, Error> {
        let login = normalize_login(&credentials.login);
        let key = self.throttle.key(Some(&login), ip);

        match self.throttle.status(&key).await? {
            ThrottleStatus::Banned => return Err(Error::Banned),
            ThrottleStatus::Suspended { until_unix } => {
                let retry_after_seconds =
                    u64::try_from((until_unix - now_unix()).max(0)).unwrap_or(0);
                return Err(Error::Suspended {
                    retry_after_seconds,
                });
            }
            ThrottleStatus::Clear | ThrottleStatus::Warning => {}
        }

        let Some(user) = self.users.find_by_login(&login).await? else {
            // Rate-limit username guessing just like wrong passwords.
            self.throttle.record_failure(&key).await?;
            debug!(key = %key, "login attempt for unknown identity");
            return Err(Error::InvalidCredentials);
        };

        if !self
            .hasher
            .check_hash(credentials.password.expose_secret(), &user.password_hash)
        {
            self.throttle.record_failure(&key).await?;
            debug!(key = %key, "password mismatch");
            return Err(Error::InvalidCredentials);
        }

        self.throttle.record_success(&key).await?;
        let token = PersistedIdentity {
            user_id: user.id,
            remember,
        }
        .encode()?;
        self.identity.put(&token)?;
        info!(user_id = %user.id, "authentication succeeded");
        Ok(user)
    }

    /// Restore the authenticated user from the persisted identity token.
    ///
    /// `Ok(None)` means "no authenticated identity" — an absent, corrupt, or
    /// stale token is normal, not an error.
    ///
    /// # Errors
    /// [`Error::Storage`] only.
    pub async fn check(&self) -> Result<Option<User>, Error> {
        let Some(raw) = self.identity.get()? else {
            return Ok(None);
        };
        let Some(identity) = PersistedIdentity::decode(&raw) else {
            // Unreadable tokens are dropped so they cannot wedge a client.
            self.identity.forget()?;
            return Ok(None);
        };
        Ok(self.users.find_by_id(identity.user_id).await?)
    }

    /// Destroy the persisted identity. Idempotent.
    ///
    /// # Errors
    /// [`Error::Storage`] only.
    pub fn logout(&self) -> Result<(), Error> {
        self.identity.forget()?;
        Ok(())
    }

    /// Register a new user with a freshly hashed secret.
    ///
    /// # Errors
    /// [`Error::LoginTaken`] when the login attribute value exists, otherwise
    /// [`Error::Storage`].
    pub async fn register(&self, credentials: &Credentials) -> Result<User, Error> {
        let password_hash = self.hasher.hash(credentials.password.expose_secret())?;
        let outcome = self
            .users
            .create_user(NewUser {
                login: normalize_login(&credentials.login),
                password_hash,
                ..NewUser::default()
            })
            .await?;
        match outcome {
            CreateOutcome::Created(user) => {
                info!(user_id = %user.id, "user registered");
                Ok(user)
            }
            CreateOutcome::Conflict => Err(Error::LoginTaken),
        }
    }
}
