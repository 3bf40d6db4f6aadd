use identity_broker::{
    BrokerError, LoginOutcome, RefreshRequest, SessionFilter, TokenType, login_core,
    refresh_core,
};

use crate::common::{PASSWORD, TestContext};

/// Register a user, then use the returned access token
///
/// Flow: register → authenticate access token → identity matches the session
#[tokio::test]
async fn test_register_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;

    let session = ctx.register("alice@example.com", "alice-laptop").await;

    let user = ctx
        .broker
        .users()
        .find_by_email("alice@example.com")
        .await?
        .expect("user stored");
    assert_eq!(session.user_id, user.id);
    assert!(
        ctx.broker
            .devices()
            .find(&user.id, "alice-laptop")
            .await?
            .is_some()
    );

    let identity = ctx
        .broker
        .authenticator()
        .authenticate(&session.tokens.access_token)
        .await?;
    assert_eq!(identity.user_id, user.id);
    assert_eq!(identity.app_id, ctx.app.id);
    assert_eq!(identity.device_id, "alice-laptop");
    assert_eq!(identity.session_id, session.session_id);

    Ok(())
}

/// Logging in twice on the same device keeps one session and invalidates the first pair
#[tokio::test]
async fn test_repeated_login_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let first = ctx.register("bob@example.com", "bob-phone").await;

    let second = ctx.login("bob@example.com", "bob-phone").await;

    assert_eq!(first.session_id, second.session_id);
    let sessions = ctx
        .broker
        .sessions()
        .list(&SessionFilter {
            user_id: Some(first.user_id.clone()),
            ..Default::default()
        })
        .await?;
    assert_eq!(sessions.len(), 1);

    // The first refresh token was replaced by the second login
    let stale = refresh_core(
        &ctx.broker,
        RefreshRequest::new(&first.tokens.refresh_token),
    )
    .await;
    assert!(matches!(stale, Err(BrokerError::RefreshTokenNotFound)));

    // Another device is another session
    ctx.login("bob@example.com", "bob-tablet").await;
    let sessions = ctx
        .broker
        .sessions()
        .list(&SessionFilter {
            user_id: Some(first.user_id),
            ..Default::default()
        })
        .await?;
    assert_eq!(sessions.len(), 2);

    Ok(())
}

/// A wrong password fails before anything is written
#[tokio::test]
async fn test_wrong_password_login_leaves_no_session() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let registered = ctx.register("carol@example.com", "carol-laptop").await;

    let result = login_core(
        &ctx.broker,
        &ctx.app_context(),
        ctx.login_request("carol@example.com", "wrong-password", "carol-desktop"),
    )
    .await;

    assert!(matches!(result, Err(BrokerError::IncorrectPassword)));
    assert!(
        ctx.broker
            .sessions()
            .find_by_user_device_app(&registered.user_id, "carol-desktop", &ctx.app.id)
            .await?
            .is_none()
    );
    assert!(
        ctx.broker
            .devices()
            .find(&registered.user_id, "carol-desktop")
            .await?
            .is_none()
    );

    let unknown = login_core(
        &ctx.broker,
        &ctx.app_context(),
        ctx.login_request("nobody@example.com", PASSWORD, "x"),
    )
    .await;
    assert!(matches!(unknown, Err(BrokerError::UserNotFound { .. })));

    Ok(())
}

/// Rotation hands out a new pair once; presenting the old token again fails
#[tokio::test]
async fn test_refresh_rotation_and_replay() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let session = ctx.register("dave@example.com", "dave-laptop").await;

    let rotated = refresh_core(
        &ctx.broker,
        RefreshRequest::new(&session.tokens.refresh_token),
    )
    .await?;
    assert_eq!(rotated.session_id, session.session_id);
    assert_ne!(rotated.tokens.refresh_token, session.tokens.refresh_token);

    // The old access token was superseded, the new one works
    assert!(matches!(
        ctx.broker
            .authenticator()
            .authenticate(&session.tokens.access_token)
            .await,
        Err(BrokerError::SessionNotFound)
    ));
    ctx.broker
        .authenticator()
        .authenticate(&rotated.tokens.access_token)
        .await?;

    // Replaying the consumed refresh token is rejected and leaves the session alone
    let replay = refresh_core(
        &ctx.broker,
        RefreshRequest::new(&session.tokens.refresh_token),
    )
    .await;
    assert!(matches!(
        replay,
        Err(BrokerError::RefreshTokenNotFound) | Err(BrokerError::RefreshTokenReplay)
    ));
    let stored = ctx
        .broker
        .sessions()
        .get_by_id(&session.session_id)
        .await?
        .expect("session kept");
    assert_eq!(stored.refresh_token, rotated.tokens.refresh_token);

    Ok(())
}

/// Two clients racing with the same refresh token: exactly one gets a new pair
#[tokio::test]
async fn test_concurrent_refresh_single_winner() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let session = ctx.register("erin@example.com", "erin-phone").await;
    let token = session.tokens.refresh_token.clone();

    let (a, b) = tokio::join!(
        refresh_core(&ctx.broker, RefreshRequest::new(&token)),
        refresh_core(&ctx.broker, RefreshRequest::new(&token)),
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    Ok(())
}

/// Refreshing after the session was deleted
#[tokio::test]
async fn test_refresh_with_deleted_session() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let session = ctx.register("frank@example.com", "frank-laptop").await;
    assert!(ctx.broker.sessions().delete_by_id(&session.session_id).await?);

    let result = refresh_core(
        &ctx.broker,
        RefreshRequest::new(&session.tokens.refresh_token),
    )
    .await;

    assert!(matches!(result, Err(BrokerError::RefreshTokenNotFound)));
    Ok(())
}

/// Access and refresh tokens are not interchangeable
#[tokio::test]
async fn test_token_type_discrimination() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let session = ctx.register("gina@example.com", "gina-laptop").await;
    let codec = ctx.broker.issuer().codec();

    assert!(codec.verify(&session.tokens.access_token, TokenType::Refresh).is_err());
    assert!(codec.verify(&session.tokens.refresh_token, TokenType::Access).is_err());

    assert!(matches!(
        ctx.broker
            .authenticator()
            .authenticate(&session.tokens.refresh_token)
            .await,
        Err(BrokerError::AccessToken(_))
    ));

    Ok(())
}

/// Password change takes effect for the next login
#[tokio::test]
async fn test_change_password_flow() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let session = ctx.register("hank@example.com", "hank-laptop").await;
    let identity = ctx
        .broker
        .authenticator()
        .authenticate(&session.tokens.access_token)
        .await?;

    identity_broker::change_password_core(
        &ctx.broker,
        &identity,
        identity_broker::ChangePasswordRequest {
            user_id: None,
            old_password: PASSWORD.to_string(),
            new_password: "a-brand-new-password".to_string(),
        },
    )
    .await?;

    let old = login_core(
        &ctx.broker,
        &ctx.app_context(),
        ctx.login_request("hank@example.com", PASSWORD, "hank-laptop"),
    )
    .await;
    assert!(matches!(old, Err(BrokerError::IncorrectPassword)));

    let new = login_core(
        &ctx.broker,
        &ctx.app_context(),
        ctx.login_request("hank@example.com", "a-brand-new-password", "hank-laptop"),
    )
    .await?;
    assert!(matches!(new, LoginOutcome::Session(_)));

    Ok(())
}
