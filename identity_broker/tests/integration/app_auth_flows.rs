use identity_broker::{
    AppAuthContext, BrokerError, SignedRequest, create_internal_signature, login_core,
    pkce_s256, verify_pkce_core,
};
use serde_json::Value;

use crate::common::{INTERNAL_SECRET, PASSWORD, TestContext, headers, now_ms};

const LOGIN_URL: &str = "/auth/login?source=web";
const BODY: &[u8] = br#"{"email":"ivy@example.com","device_id":"ivy-laptop"}"#;

fn request<'a>(method: &'a str, url: &'a str, body: &'a [u8]) -> SignedRequest<'a> {
    SignedRequest { method, url, body }
}

/// A correctly signed app request authenticates as that app
#[tokio::test]
async fn test_app_hmac_success() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let ts = now_ms();
    let signed = ctx.app_signed_headers("POST", LOGIN_URL, BODY, ts);

    let context = ctx
        .broker
        .app_authenticator()
        .authenticate(&signed, &request("POST", LOGIN_URL, BODY))
        .await?;

    assert_eq!(
        context,
        AppAuthContext::App {
            app_id: ctx.app.id.clone()
        }
    );
    Ok(())
}

/// Changing any signed component after signing is rejected
#[tokio::test]
async fn test_app_hmac_tampering_rejected() {
    let ctx = TestContext::new().await;
    let ts = now_ms();
    let signed = ctx.app_signed_headers("POST", LOGIN_URL, BODY, ts);
    let authenticator = ctx.broker.app_authenticator();

    let tampered_body = br#"{"email":"mallory@example.com","device_id":"ivy-laptop"}"#;
    let cases: [(&str, SignedRequest<'_>); 3] = [
        ("method", request("PUT", LOGIN_URL, BODY)),
        ("url", request("POST", "/auth/login?source=app", BODY)),
        ("body", request("POST", LOGIN_URL, tampered_body)),
    ];
    for (what, tampered) in cases {
        let result = authenticator.authenticate(&signed, &tampered).await;
        assert!(
            matches!(result, Err(BrokerError::IncorrectAppSecret(_))),
            "tampered {what} accepted: {result:?}"
        );
    }

    // Same signature under a different timestamp header
    let mut moved = signed.clone();
    moved.insert("x-timestamp", (ts - 1).to_string().parse().expect("header"));
    let result = authenticator
        .authenticate(&moved, &request("POST", LOGIN_URL, BODY))
        .await;
    assert!(matches!(result, Err(BrokerError::IncorrectAppSecret(_))));
}

/// Whitespace and formatting of a JSON body do not affect the signature
#[tokio::test]
async fn test_app_hmac_body_is_canonical() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let ts = now_ms();
    let signed = ctx.app_signed_headers("POST", LOGIN_URL, BODY, ts);

    let reformatted = b"{ \"email\": \"ivy@example.com\",\n  \"device_id\": \"ivy-laptop\" }";
    ctx.broker
        .app_authenticator()
        .authenticate(&signed, &request("post", LOGIN_URL, reformatted))
        .await?;
    Ok(())
}

/// Timestamps outside the drift window fail even with a valid signature
#[tokio::test]
async fn test_app_hmac_drift_window() {
    let ctx = TestContext::new().await;
    let drift = ctx.broker.config().hmac_max_drift_ms;

    for ts in [now_ms() - drift - 5_000, now_ms() + drift + 5_000] {
        let signed = ctx.app_signed_headers("GET", "/auth/sessions", b"", ts);
        let result = ctx
            .broker
            .app_authenticator()
            .authenticate(&signed, &request("GET", "/auth/sessions", b""))
            .await;
        match result {
            Err(BrokerError::Auth { message, status }) => {
                assert_eq!(message, "Request timestamp expired");
                assert_eq!(status, http::StatusCode::UNAUTHORIZED);
            }
            other => panic!("expected expiry, got {other:?}"),
        }
    }
}

/// Unknown apps and malformed header sets
#[tokio::test]
async fn test_app_hmac_header_errors() {
    let ctx = TestContext::new().await;
    let authenticator = ctx.broker.app_authenticator();
    let get = request("GET", "/auth/sessions", b"");

    let unknown = headers(&[
        ("x-app-id", "no-such-app"),
        ("x-signature", "00"),
        ("x-timestamp", &now_ms().to_string()),
    ]);
    assert!(matches!(
        authenticator.authenticate(&unknown, &get).await,
        Err(BrokerError::AppNotFound { .. })
    ));

    assert!(matches!(
        authenticator.authenticate(&headers(&[]), &get).await,
        Err(BrokerError::NoAuthenticationMethod)
    ));

    let mixed = headers(&[
        ("x-app-id", &ctx.app.id),
        ("x-code-challenger", "challenge"),
        ("x-internal-signature", "00"),
        ("x-internal-timestamp", &now_ms().to_string()),
    ]);
    assert!(matches!(
        authenticator.authenticate(&mixed, &get).await,
        Err(BrokerError::MultipleAuthMethods)
    ));
}

/// Requests signed with the internal secret authenticate as internal
#[tokio::test]
async fn test_internal_signature_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    let body: Value = serde_json::json!({
        "user_id": "u1",
        "app_id": ctx.app.id,
        "device_id": "d1",
    });
    let raw = serde_json::to_vec(&body)?;

    let created = create_internal_signature(INTERNAL_SECRET, "POST", "/auth/sessions", Some(&body))?;
    let signed = headers(&[
        ("x-internal-signature", &created.signature),
        ("x-internal-timestamp", &created.timestamp),
    ]);

    let context = ctx
        .broker
        .app_authenticator()
        .authenticate(&signed, &request("POST", "/auth/sessions", &raw))
        .await?;
    assert_eq!(context, AppAuthContext::Internal);

    // A signature made with another secret is refused
    let forged = create_internal_signature("not-the-secret", "POST", "/auth/sessions", Some(&body))?;
    let signed = headers(&[
        ("x-internal-signature", &forged.signature),
        ("x-internal-timestamp", &forged.timestamp),
    ]);
    let result = ctx
        .broker
        .app_authenticator()
        .authenticate(&signed, &request("POST", "/auth/sessions", &raw))
        .await;
    assert!(matches!(result, Err(BrokerError::Auth { .. })));

    // Internal headers must not name an app
    let created = ctx
        .broker
        .app_authenticator()
        .create_internal_signature("POST", "/auth/sessions", Some(&body))?;
    let signed = headers(&[
        ("x-app-id", &ctx.app.id),
        ("x-internal-signature", &created.signature),
        ("x-internal-timestamp", &created.timestamp),
    ]);
    let result = ctx
        .broker
        .app_authenticator()
        .authenticate(&signed, &request("POST", "/auth/sessions", &raw))
        .await;
    assert!(matches!(result, Err(BrokerError::Auth { .. })));

    Ok(())
}

/// A PKCE login is escrowed and redeemed once with the matching verifier
#[tokio::test]
async fn test_pkce_escrowed_login_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    // Given a registered user and a client holding a verifier
    let ctx = TestContext::new().await;
    let registered = ctx.register("ivy@example.com", "ivy-laptop").await;
    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    let challenge = pkce_s256(verifier);

    // When the login arrives with only a PKCE challenge
    let pkce_headers = headers(&[("x-app-id", &ctx.app.id), ("x-code-challenger", &challenge)]);
    let app_ctx = ctx
        .broker
        .app_authenticator()
        .authenticate(&pkce_headers, &request("POST", "/auth/login", BODY))
        .await?;
    let outcome = login_core(
        &ctx.broker,
        &app_ctx,
        ctx.login_request("ivy@example.com", PASSWORD, "ivy-laptop"),
    )
    .await?;

    // Then no tokens are returned directly
    assert!(outcome.session().is_none());
    let receipt = outcome.receipt().expect("escrow receipt").clone();

    // A wrong verifier burns the escrow
    let wrong = verify_pkce_core(&ctx.broker, &receipt.secret_key, "wrong-verifier").await;
    assert!(matches!(wrong, Err(BrokerError::Auth { .. })));
    let gone = verify_pkce_core(&ctx.broker, &receipt.secret_key, verifier).await;
    assert!(matches!(gone, Err(BrokerError::Auth { .. })));

    // A fresh login redeems with the right verifier, exactly once
    let outcome = login_core(
        &ctx.broker,
        &app_ctx,
        ctx.login_request("ivy@example.com", PASSWORD, "ivy-laptop"),
    )
    .await?;
    let receipt = outcome.receipt().expect("escrow receipt").clone();
    let session = verify_pkce_core(&ctx.broker, &receipt.secret_key, verifier).await?;

    assert_eq!(session["user_id"], registered.user_id.as_str());
    assert_eq!(session["session_id"], registered.session_id.as_str());
    let access_token = session["access_token"].as_str().expect("access token");
    ctx.broker.authenticator().authenticate(access_token).await?;

    let replay = verify_pkce_core(&ctx.broker, &receipt.secret_key, verifier).await;
    assert!(matches!(replay, Err(BrokerError::Auth { .. })));

    Ok(())
}

/// A PKCE request for one app cannot log into another
#[tokio::test]
async fn test_pkce_app_mismatch() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = TestContext::new().await;
    ctx.register("jack@example.com", "jack-laptop").await;

    let other = AppAuthContext::Pkce {
        app_id: "some-other-app".to_string(),
        code_challenge: pkce_s256("verifier"),
    };
    let result = login_core(
        &ctx.broker,
        &other,
        ctx.login_request("jack@example.com", PASSWORD, "jack-laptop"),
    )
    .await;

    assert!(matches!(result, Err(BrokerError::Forbidden(_))));
    Ok(())
}
