use std::collections::HashMap;

use identity_broker::{
    BrokerError, GuardOptions, Identity, RequestSources, RequestedIds, SessionFilter,
    SessionResponse, delete_sessions_core, device_session_core, get_session_core,
    list_sessions_core, parse_device_identifier,
};
use serde_json::json;

use crate::common::TestContext;

async fn identity_for(ctx: &TestContext, session: &SessionResponse) -> Identity {
    ctx.broker
        .authenticator()
        .authenticate(&session.tokens.access_token)
        .await
        .expect("access token authenticates")
}

fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// The guard reads ids from path, body and query, and only lets owners through
#[tokio::test]
async fn test_guard_ownership_from_each_source() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("alice@example.com", "alice-laptop").await;
    let bob = ctx.register("bob@example.com", "bob-laptop").await;
    let identity = identity_for(&ctx, &alice).await;
    let guard = ctx.broker.guard();
    let options = GuardOptions::user();

    let own_path = map(&[("user_id", &alice.user_id)]);
    let other_path = map(&[("user_id", &bob.user_id)]);
    let own_body = json!({ "user_id": alice.user_id });
    let other_body = json!({ "user_id": bob.user_id });

    let allowed = [
        RequestSources {
            path: Some(&own_path),
            ..Default::default()
        },
        RequestSources {
            body: Some(&own_body),
            ..Default::default()
        },
        RequestSources {
            query: Some(&own_path),
            ..Default::default()
        },
    ];
    for sources in &allowed {
        let requested = RequestedIds::extract(sources);
        guard
            .authorize(Some(&identity), &requested, &options)
            .await
            .expect("owner allowed");
    }

    let denied = [
        RequestSources {
            path: Some(&other_path),
            ..Default::default()
        },
        RequestSources {
            body: Some(&other_body),
            ..Default::default()
        },
        RequestSources {
            query: Some(&other_path),
            ..Default::default()
        },
    ];
    for sources in &denied {
        let requested = RequestedIds::extract(sources);
        let result = guard.authorize(Some(&identity), &requested, &options).await;
        assert!(matches!(result, Err(BrokerError::Forbidden(_))), "{result:?}");
    }

    // Path wins over a conflicting body
    let requested = RequestedIds::extract(&RequestSources {
        path: Some(&own_path),
        body: Some(&other_body),
        ..Default::default()
    });
    assert_eq!(requested.user_id.as_deref(), Some(alice.user_id.as_str()));
}

/// Missing ids fail unless the route allows partial requests
#[tokio::test]
async fn test_guard_missing_ids_and_anonymous_callers() {
    let ctx = TestContext::new().await;
    let alice = ctx.register("alice@example.com", "alice-laptop").await;
    let identity = identity_for(&ctx, &alice).await;
    let guard = ctx.broker.guard();
    let nothing = RequestedIds::default();

    let result = guard
        .authorize(Some(&identity), &nothing, &GuardOptions::user())
        .await;
    assert!(matches!(result, Err(BrokerError::Auth { .. })));

    guard
        .authorize(Some(&identity), &nothing, &GuardOptions::user().with_partial())
        .await
        .expect("partial allows absence");

    let result = guard.authorize(None, &nothing, &GuardOptions::user()).await;
    assert!(matches!(result, Err(BrokerError::AuthenticationRequired)));
}

/// Admins pass ownership checks only on routes that allow it
#[tokio::test]
async fn test_guard_admin_override() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let admin = ctx.register("root@example.com", "root-laptop").await;
    let bob = ctx.register("bob@example.com", "bob-laptop").await;
    assert!(ctx.broker.users().set_admin(&admin.user_id, true).await?);
    let identity = identity_for(&ctx, &admin).await;

    let requested = RequestedIds {
        user_id: Some(bob.user_id.clone()),
        ..Default::default()
    };

    ctx.broker
        .guard()
        .authorize(Some(&identity), &requested, &GuardOptions::user().with_admin())
        .await?;

    let result = ctx
        .broker
        .guard()
        .authorize(Some(&identity), &requested, &GuardOptions::user())
        .await;
    assert!(matches!(result, Err(BrokerError::Forbidden(_))));

    Ok(())
}

/// A composite device identifier resolves to the device's session
#[tokio::test]
async fn test_device_identity_lookup() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let alice = ctx.register("alice@example.com", "alice-laptop-01").await;
    let identity = identity_for(&ctx, &alice).await;

    // Device ids may themselves contain dashes
    let raw = format!("{}-alice-laptop-01", alice.user_id);
    let device = parse_device_identifier(Some(raw.as_str()))?;
    assert_eq!(device.user_id, alice.user_id);
    assert_eq!(device.device_id, "alice-laptop-01");

    // The canonical identity is what the guard checks
    let requested = RequestedIds::extract(&RequestSources {
        device: Some(&device),
        ..Default::default()
    });
    ctx.broker
        .guard()
        .authorize(Some(&identity), &requested, &GuardOptions::user_device())
        .await?;

    let session = device_session_core(&ctx.broker, &identity, &device).await?;
    assert_eq!(session.id, alice.session_id);

    let unknown = parse_device_identifier(Some(format!("{}-tablet", alice.user_id).as_str()))?;
    let result = device_session_core(&ctx.broker, &identity, &unknown).await;
    assert!(matches!(result, Err(BrokerError::DeviceNotFound { .. })));

    assert!(parse_device_identifier(Some("short-id")).is_err());
    assert!(parse_device_identifier(None).is_err());

    Ok(())
}

/// A regular user only ever sees and deletes their own sessions
#[tokio::test]
async fn test_session_admin_scoped_to_caller() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let alice = ctx.register("alice@example.com", "alice-laptop").await;
    let bob = ctx.register("bob@example.com", "bob-laptop").await;
    let alice_identity = identity_for(&ctx, &alice).await;

    let listed = list_sessions_core(&ctx.broker, &alice_identity, SessionFilter::default()).await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].user_id, alice.user_id);

    // Filtering by another user's id still only reaches the caller's rows
    let filter = SessionFilter {
        user_id: Some(bob.user_id.clone()),
        ..Default::default()
    };
    let deleted = delete_sessions_core(&ctx.broker, &alice_identity, filter).await?;
    assert_eq!(deleted, 0);
    get_session_core(&ctx.broker, &bob.session_id).await?;

    let result =
        delete_sessions_core(&ctx.broker, &alice_identity, SessionFilter::default()).await;
    assert!(matches!(result, Err(BrokerError::Validation(_))));

    Ok(())
}

/// Admins list and delete across users
#[tokio::test]
async fn test_session_admin_for_admins() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let admin = ctx.register("root@example.com", "root-laptop").await;
    let bob = ctx.register("bob@example.com", "bob-laptop").await;
    ctx.broker.users().set_admin(&admin.user_id, true).await?;
    let identity = identity_for(&ctx, &admin).await;

    let all = list_sessions_core(&ctx.broker, &identity, SessionFilter::default()).await?;
    assert_eq!(all.len(), 2);

    let filter = SessionFilter {
        user_id: Some(bob.user_id.clone()),
        ..Default::default()
    };
    assert_eq!(delete_sessions_core(&ctx.broker, &identity, filter).await?, 1);
    assert!(matches!(
        get_session_core(&ctx.broker, &bob.session_id).await,
        Err(BrokerError::SessionNotFound)
    ));

    Ok(())
}
