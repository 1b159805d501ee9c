//! End-to-end authentication flows over the in-memory backends.

use portcullis::session::{CookieIdentityStore, MemoryIdentityStore};
use portcullis::throttle::MemoryThrottleStore;
use portcullis::users::MemoryUserRepository;
use portcullis::{
    Auth, AuthConfig, Credentials, Error, HasherKind, ThrottleConfig, ThrottleStatus,
};
use std::sync::Arc;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn config() -> AuthConfig {
    AuthConfig::new()
        .with_hasher(HasherKind::Sha256)
        .with_throttling(
            ThrottleConfig::default()
                .with_attempt_limit(3)
                .with_suspension_time_seconds(900),
        )
}

fn auth(config: AuthConfig) -> Auth {
    init_tracing();
    Auth::new(
        config,
        Arc::new(MemoryUserRepository::new()),
        Arc::new(MemoryThrottleStore::new()),
        Arc::new(MemoryIdentityStore::new("portcullis_identity")),
    )
}

#[tokio::test]
async fn three_failures_suspend_even_the_right_password() -> anyhow::Result<()> {
    let auth = auth(config());
    auth.register(&Credentials::new("alice@example.com", "secret123"))
        .await?;

    let ip = Some("203.0.113.7");
    for _ in 0..3 {
        let err = auth
            .authenticate(&Credentials::new("alice@example.com", "wrong"), ip, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    let key = auth.throttle().key(Some("alice@example.com"), ip);
    assert!(auth.throttle().is_suspended(&key).await?);
    assert_eq!(auth.throttle().remaining_attempts(&key).await?, 0);

    // The right password during a suspension is still refused.
    let err = auth
        .authenticate(&Credentials::new("alice@example.com", "secret123"), ip, false)
        .await
        .unwrap_err();
    let Error::Suspended {
        retry_after_seconds,
    } = err
    else {
        panic!("expected Suspended, got {err}");
    };
    assert!(retry_after_seconds > 0 && retry_after_seconds <= 900);

    // And no identity was persisted along the way.
    assert_eq!(auth.check().await?, None);
    Ok(())
}

#[tokio::test]
async fn successful_login_resets_the_counter() -> anyhow::Result<()> {
    let auth = auth(config());
    auth.register(&Credentials::new("alice@example.com", "secret123"))
        .await?;

    for _ in 0..2 {
        let _ = auth
            .authenticate(&Credentials::new("alice@example.com", "wrong"), None, false)
            .await
            .unwrap_err();
    }
    let key = auth.throttle().key(Some("alice@example.com"), None);
    assert_eq!(auth.throttle().remaining_attempts(&key).await?, 1);

    auth.authenticate(
        &Credentials::new("alice@example.com", "secret123"),
        None,
        false,
    )
    .await?;
    assert_eq!(auth.throttle().remaining_attempts(&key).await?, 3);
    Ok(())
}

#[tokio::test]
async fn expired_suspension_allows_attempts_without_clearing_the_counter() -> anyhow::Result<()> {
    let store = Arc::new(MemoryThrottleStore::new());
    init_tracing();
    let auth = Auth::new(
        config(),
        Arc::new(MemoryUserRepository::new()),
        store.clone(),
        Arc::new(MemoryIdentityStore::new("portcullis_identity")),
    );
    auth.register(&Credentials::new("alice@example.com", "secret123"))
        .await?;

    for _ in 0..3 {
        let _ = auth
            .authenticate(&Credentials::new("alice@example.com", "wrong"), None, false)
            .await
            .unwrap_err();
    }
    let key = auth.throttle().key(Some("alice@example.com"), None);
    assert!(auth.throttle().is_suspended(&key).await?);

    // Age the suspension into the past.
    use portcullis::throttle::ThrottleStore;
    store
        .mutate(
            &key,
            Box::new(|record| {
                record.suspended_until_unix = Some(1);
            }),
        )
        .await?;

    // No longer suspended, but the counter has not been cleared.
    assert!(!auth.throttle().is_suspended(&key).await?);
    assert_eq!(
        auth.throttle().status(&key).await?,
        ThrottleStatus::Warning
    );
    assert_eq!(auth.throttle().remaining_attempts(&key).await?, 0);

    // The next attempt restarts the count; the right password gets in.
    auth.authenticate(
        &Credentials::new("alice@example.com", "secret123"),
        None,
        false,
    )
    .await?;
    assert_eq!(auth.throttle().remaining_attempts(&key).await?, 3);
    Ok(())
}

#[tokio::test]
async fn disabled_throttling_never_suspends_or_bans() -> anyhow::Result<()> {
    let config = AuthConfig::new().with_hasher(HasherKind::Sha256).with_throttling(
        ThrottleConfig::default()
            .with_enabled(false)
            .with_attempt_limit(2)
            .with_ban_after_suspensions(1),
    );
    let auth = auth(config);
    auth.register(&Credentials::new("alice@example.com", "secret123"))
        .await?;

    for _ in 0..20 {
        let err = auth
            .authenticate(&Credentials::new("alice@example.com", "wrong"), None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials), "{err}");
    }

    // History was still recorded for a later re-enable.
    let key = auth.throttle().key(Some("alice@example.com"), None);
    assert_eq!(auth.throttle().remaining_attempts(&key).await?, 0);
    Ok(())
}

#[tokio::test]
async fn bans_stick_until_unban() -> anyhow::Result<()> {
    let config = AuthConfig::new().with_hasher(HasherKind::Sha256).with_throttling(
        ThrottleConfig::default()
            .with_attempt_limit(1)
            .with_ban_after_suspensions(1),
    );
    let auth = auth(config);
    auth.register(&Credentials::new("alice@example.com", "secret123"))
        .await?;

    let _ = auth
        .authenticate(&Credentials::new("alice@example.com", "wrong"), None, false)
        .await
        .unwrap_err();

    let err = auth
        .authenticate(
            &Credentials::new("alice@example.com", "secret123"),
            None,
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Banned));

    let key = auth.throttle().key(Some("alice@example.com"), None);
    assert!(auth.throttle().is_banned(&key).await?);

    auth.throttle().unban(&key).await?;
    auth.throttle().reset(&key).await?;
    auth.authenticate(
        &Credentials::new("alice@example.com", "secret123"),
        None,
        false,
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn cookie_transport_round_trips_the_identity() -> anyhow::Result<()> {
    init_tracing();
    let cookie_store = Arc::new(CookieIdentityStore::new("portcullis_remember", false, 3600));
    let auth = Auth::new(
        config(),
        Arc::new(MemoryUserRepository::new()),
        Arc::new(MemoryThrottleStore::new()),
        cookie_store.clone(),
    );
    let user = auth
        .register(&Credentials::new("alice@example.com", "secret123"))
        .await?;

    auth.authenticate(
        &Credentials::new("alice@example.com", "secret123"),
        Some("203.0.113.7"),
        true,
    )
    .await?;

    // The login produced a Set-Cookie header; replay it as the next request.
    let headers = cookie_store.take_set_cookie_headers();
    assert_eq!(headers.len(), 1);
    let pair = headers[0]
        .split(';')
        .next()
        .expect("cookie header has a value");
    cookie_store.ingest_cookie_header(pair);

    let restored = auth.check().await?;
    assert_eq!(restored.map(|u| u.id), Some(user.id));

    auth.logout()?;
    assert_eq!(auth.check().await?, None);
    let headers = cookie_store.take_set_cookie_headers();
    assert!(headers.last().expect("logout emits a header").contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn composite_key_isolates_addresses() -> anyhow::Result<()> {
    // Under the composite policy, alice locked out from one address can
    // still log in from another.
    let auth = auth(config());
    auth.register(&Credentials::new("alice@example.com", "secret123"))
        .await?;

    for _ in 0..3 {
        let _ = auth
            .authenticate(
                &Credentials::new("alice@example.com", "wrong"),
                Some("198.51.100.1"),
                false,
            )
            .await
            .unwrap_err();
    }
    let err = auth
        .authenticate(
            &Credentials::new("alice@example.com", "secret123"),
            Some("198.51.100.1"),
            false,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Suspended { .. }));

    auth.authenticate(
        &Credentials::new("alice@example.com", "secret123"),
        Some("203.0.113.7"),
        false,
    )
    .await?;
    Ok(())
}
