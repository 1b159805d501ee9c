//! Deployment configuration for the authentication core.
//!
//! One [`AuthConfig`] value is built at startup and handed by reference to
//! each component. There is no global lookup and no runtime capability
//! probing; everything is decided here, once.

use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::error::Error;
use crate::throttle::ThrottleConfig;

const DEFAULT_LOGIN_ATTRIBUTE: &str = "email";
const DEFAULT_SALT_LENGTH: usize = 16;
const DEFAULT_BCRYPT_COST: u32 = 10;
const DEFAULT_SESSION_KEY: &str = "portcullis_identity";
const DEFAULT_COOKIE_KEY: &str = "portcullis_remember";
const DEFAULT_COOKIE_MAX_AGE_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Closed set of password hashing strategies.
///
/// Selection happens once at startup; an unrecognized name is a
/// configuration error, the only place an invalid-argument failure
/// is expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HasherKind {
    Native,
    Bcrypt,
    Sha256,
    Whirlpool,
}

impl FromStr for HasherKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Error> {
        match name {
            "native" => Ok(Self::Native),
            "bcrypt" => Ok(Self::Bcrypt),
            "sha256" => Ok(Self::Sha256),
            "whirlpool" => Ok(Self::Whirlpool),
            other => Err(Error::UnknownHasher(other.to_string())),
        }
    }
}

/// Where the persisted identity token lives. Chosen explicitly per
/// deployment; never sniffed at runtime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Session,
    Cookie,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    hasher: HasherKind,
    login_attribute: String,
    salt_length: usize,
    bcrypt_cost: u32,
    throttling: ThrottleConfig,
    transport: TransportKind,
    session_key: String,
    cookie_key: String,
    cookie_secure: bool,
    cookie_max_age_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            hasher: HasherKind::Native,
            login_attribute: DEFAULT_LOGIN_ATTRIBUTE.to_string(),
            salt_length: DEFAULT_SALT_LENGTH,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            throttling: ThrottleConfig::default(),
            transport: TransportKind::Session,
            session_key: DEFAULT_SESSION_KEY.to_string(),
            cookie_key: DEFAULT_COOKIE_KEY.to_string(),
            cookie_secure: false,
            cookie_max_age_seconds: DEFAULT_COOKIE_MAX_AGE_SECONDS,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from `PORTCULLIS_*` environment variables.
    ///
    /// # Errors
    /// Fails fast with [`Error::UnknownHasher`] when `PORTCULLIS_HASHER`
    /// names an unrecognized strategy.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();
        if let Ok(name) = env::var("PORTCULLIS_HASHER") {
            config.hasher = name.parse()?;
        }
        if let Ok(attribute) = env::var("PORTCULLIS_LOGIN_ATTRIBUTE") {
            config.login_attribute = attribute;
        }
        let mut throttling = config.throttling.clone();
        if let Ok(value) = env::var("PORTCULLIS_THROTTLE_ENABLED") {
            throttling = throttling.with_enabled(value != "false" && value != "0");
        }
        if let Ok(Ok(limit)) = env::var("PORTCULLIS_ATTEMPT_LIMIT").map(|v| v.parse()) {
            throttling = throttling.with_attempt_limit(limit);
        }
        if let Ok(Ok(seconds)) = env::var("PORTCULLIS_SUSPENSION_TIME").map(|v| v.parse()) {
            throttling = throttling.with_suspension_time_seconds(seconds);
        }
        config.throttling = throttling;
        Ok(config)
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: HasherKind) -> Self {
        self.hasher = hasher;
        self
    }

    #[must_use]
    pub fn with_login_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.login_attribute = attribute.into();
        self
    }

    #[must_use]
    pub fn with_salt_length(mut self, length: usize) -> Self {
        self.salt_length = length;
        self
    }

    #[must_use]
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    #[must_use]
    pub fn with_throttling(mut self, throttling: ThrottleConfig) -> Self {
        self.throttling = throttling;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: impl Into<String>) -> Self {
        self.cookie_key = key.into();
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_cookie_max_age_seconds(mut self, seconds: i64) -> Self {
        self.cookie_max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn hasher(&self) -> HasherKind {
        self.hasher
    }

    #[must_use]
    pub fn login_attribute(&self) -> &str {
        &self.login_attribute
    }

    #[must_use]
    pub fn salt_length(&self) -> usize {
        self.salt_length
    }

    #[must_use]
    pub fn bcrypt_cost(&self) -> u32 {
        self.bcrypt_cost
    }

    #[must_use]
    pub fn throttling(&self) -> &ThrottleConfig {
        &self.throttling
    }

    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    #[must_use]
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    #[must_use]
    pub fn cookie_key(&self) -> &str {
        &self.cookie_key
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn cookie_max_age_seconds(&self) -> i64 {
        self.cookie_max_age_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthConfig, HasherKind, TransportKind};
    use crate::error::Error;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new();
        assert_eq!(config.hasher(), HasherKind::Native);
        assert_eq!(config.login_attribute(), "email");
        assert_eq!(config.salt_length(), super::DEFAULT_SALT_LENGTH);
        assert_eq!(config.transport(), TransportKind::Session);
        assert!(config.throttling().enabled());

        let config = config
            .with_hasher(HasherKind::Sha256)
            .with_login_attribute("username")
            .with_salt_length(32)
            .with_transport(TransportKind::Cookie)
            .with_cookie_secure(true);

        assert_eq!(config.hasher(), HasherKind::Sha256);
        assert_eq!(config.login_attribute(), "username");
        assert_eq!(config.salt_length(), 32);
        assert_eq!(config.transport(), TransportKind::Cookie);
        assert!(config.cookie_secure());
    }

    #[test]
    fn hasher_kind_parses_known_names() {
        assert_eq!("native".parse::<HasherKind>().ok(), Some(HasherKind::Native));
        assert_eq!("bcrypt".parse::<HasherKind>().ok(), Some(HasherKind::Bcrypt));
        assert_eq!("sha256".parse::<HasherKind>().ok(), Some(HasherKind::Sha256));
        assert_eq!(
            "whirlpool".parse::<HasherKind>().ok(),
            Some(HasherKind::Whirlpool)
        );
    }

    #[test]
    fn hasher_kind_rejects_unknown_names() {
        let err = "md5".parse::<HasherKind>().unwrap_err();
        assert!(matches!(err, Error::UnknownHasher(name) if name == "md5"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: AuthConfig =
            serde_json::from_str(r#"{"hasher":"bcrypt","login_attribute":"username"}"#)
                .expect("config should parse");
        assert_eq!(config.hasher(), HasherKind::Bcrypt);
        assert_eq!(config.login_attribute(), "username");
        assert_eq!(config.session_key(), super::DEFAULT_SESSION_KEY);
    }

    #[test]
    fn from_env_reads_overrides() {
        temp_env::with_vars(
            [
                ("PORTCULLIS_HASHER", Some("whirlpool")),
                ("PORTCULLIS_LOGIN_ATTRIBUTE", Some("username")),
                ("PORTCULLIS_THROTTLE_ENABLED", Some("false")),
                ("PORTCULLIS_ATTEMPT_LIMIT", Some("3")),
                ("PORTCULLIS_SUSPENSION_TIME", Some("60")),
            ],
            || {
                let config = AuthConfig::from_env().expect("config should build");
                assert_eq!(config.hasher(), HasherKind::Whirlpool);
                assert_eq!(config.login_attribute(), "username");
                assert!(!config.throttling().enabled());
                assert_eq!(config.throttling().attempt_limit(), 3);
                assert_eq!(config.throttling().suspension_time_seconds(), 60);
            },
        );
    }

    #[test]
    fn from_env_fails_fast_on_unknown_hasher() {
        temp_env::with_var("PORTCULLIS_HASHER", Some("rot13"), || {
            let err = AuthConfig::from_env().unwrap_err();
            assert!(matches!(err, Error::UnknownHasher(name) if name == "rot13"));
        });
    }
}
