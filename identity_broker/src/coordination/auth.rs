//! Login, registration and token lifecycle flows

use serde_json::Value;

use crate::auth::{AppAuthContext, Identity, RefreshRequest, RotationOutcome};
use crate::broker::Broker;
use crate::errors::BrokerError;
use crate::session::{CLIENT_TYPES, DEFAULT_CLIENT_TYPE, SessionFilter};
use crate::token::{IssueRequest, IssuedSession, validate_ttl};
use crate::userdb::{App, CreateOutcome, Device, User, hash_password};

use super::types::{
    ChangePasswordRequest, LoginOutcome, LoginRequest, RegisterRequest, SessionResponse,
};

const MIN_PASSWORD_LEN: usize = 8;

fn resolve_client_type(device_type: Option<&str>) -> Result<String, BrokerError> {
    let client_type = device_type
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_CLIENT_TYPE);
    if CLIENT_TYPES.contains(&client_type) {
        Ok(client_type.to_string())
    } else {
        Err(BrokerError::Validation(format!(
            "Invalid device type: {client_type}"
        )))
    }
}

fn require(value: &str, name: &str) -> Result<(), BrokerError> {
    if value.trim().is_empty() {
        Err(BrokerError::Validation(format!("{name} is required")))
    } else {
        Ok(())
    }
}

/// The app the request authenticated as must be the app the body names.
fn check_app_matches(app_ctx: &AppAuthContext, app: &App) -> Result<(), BrokerError> {
    match app_ctx.app_id() {
        Some(authenticated) if authenticated != app.id => {
            tracing::warn!(authenticated, requested = %app.id, "App mismatch");
            Err(BrokerError::Forbidden("Forbidden: app mismatch".to_string()))
        }
        _ => Ok(()),
    }
}

async fn resolve_device(
    broker: &Broker,
    user_id: &str,
    device_id: &str,
    device_name: Option<String>,
    device_type: &str,
) -> Result<Device, BrokerError> {
    let outcome = broker
        .devices()
        .create(Device::new(
            user_id.to_string(),
            device_id.to_string(),
            device_name,
            device_type.to_string(),
        ))
        .await?;

    if !outcome.is_created() {
        tracing::debug!(user_id, device_id, "Reusing registered device");
    }
    Ok(outcome.into_inner())
}

/// Either returns the session or escrows it when the request carried a PKCE challenge.
async fn deliver(
    broker: &Broker,
    app_ctx: &AppAuthContext,
    response: SessionResponse,
) -> Result<LoginOutcome, BrokerError> {
    match app_ctx {
        AppAuthContext::Pkce { code_challenge, .. } => {
            let value = serde_json::to_value(&response)
                .map_err(|e| BrokerError::Crypto(format!("Failed to encode session: {e}")))?;
            let receipt = broker.escrow().escrow(code_challenge, value).await?;
            Ok(LoginOutcome::Escrowed(receipt))
        }
        _ => Ok(LoginOutcome::Session(response)),
    }
}

async fn open_session(
    broker: &Broker,
    user: &User,
    device: &Device,
    app: &App,
    client_type: String,
    access_ttl: Option<i64>,
    refresh_ttl: Option<i64>,
) -> Result<SessionResponse, BrokerError> {
    let issued = broker
        .issuer()
        .issue(IssueRequest {
            user_id: user.id.clone(),
            app_id: app.id.clone(),
            device_id: device.device_id.clone(),
            client_type: Some(client_type),
            access_ttl,
            refresh_ttl,
        })
        .await?;

    Ok(SessionResponse {
        user_id: user.id.clone(),
        device_record_id: device.id.clone(),
        device_id: device.device_id.clone(),
        app_id: app.id.clone(),
        session_id: issued.session_id,
        tokens: issued.tokens,
    })
}

/// Creates the user, registers the device, links the app and opens a session.
#[tracing::instrument(skip_all, fields(email = %request.email, app_name = %request.app_name))]
pub async fn register_core(
    broker: &Broker,
    app_ctx: &AppAuthContext,
    request: RegisterRequest,
) -> Result<LoginOutcome, BrokerError> {
    require(&request.email, "email")?;
    require(&request.device_id, "device_id")?;
    require(&request.app_name, "app_name")?;
    if !request.email.contains('@') {
        return Err(BrokerError::Validation("Invalid email".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(BrokerError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let client_type = resolve_client_type(request.device_type.as_deref())?;

    let app = broker
        .apps()
        .find_by_name(&request.app_name)
        .await?
        .ok_or_else(|| BrokerError::AppNotFound {
            app: request.app_name.clone(),
        })?;
    check_app_matches(app_ctx, &app)?;

    let access_ttl = validate_ttl(request.access_ttl, "access_ttl")?;
    let refresh_ttl = validate_ttl(request.refresh_ttl, "refresh_ttl")?;

    let hash = hash_password(&request.password)?;
    let user = match broker
        .users()
        .create_user(User::new(request.email.clone(), request.username, Some(hash)))
        .await?
    {
        CreateOutcome::Created(user) => user,
        CreateOutcome::AlreadyExists(_) => {
            return Err(BrokerError::Conflict("User already exists".to_string()));
        }
    };
    tracing::info!(user_id = %user.id, "User registered");

    let provisioned: Result<LoginOutcome, BrokerError> = async {
        let device = resolve_device(
            broker,
            &user.id,
            &request.device_id,
            request.device_name,
            &client_type,
        )
        .await?;

        if let CreateOutcome::AlreadyExists(_) =
            broker.apps().link_user(&user.id, &app.id).await?
        {
            return Err(BrokerError::Conflict(
                "User is already linked to this app".to_string(),
            ));
        }

        let response =
            open_session(broker, &user, &device, &app, client_type, access_ttl, refresh_ttl)
                .await?;

        deliver(broker, app_ctx, response).await
    }
    .await;

    if let Err(err) = &provisioned {
        tracing::warn!(user_id = %user.id, error = %err, "Registration failed, removing user");
        undo_registration(broker, &user.id).await;
    }
    provisioned
}

/// Removes whatever a failed registration left behind. Failures here are logged only,
/// so the caller still sees the error that aborted the registration.
async fn undo_registration(broker: &Broker, user_id: &str) {
    let filter = SessionFilter {
        user_id: Some(user_id.to_string()),
        ..Default::default()
    };
    if let Err(e) = broker.sessions().delete_by_filter(&filter).await {
        tracing::error!(user_id, error = %e, "Failed to remove sessions of aborted registration");
    }
    if let Err(e) = broker.users().delete_user(user_id).await {
        tracing::error!(user_id, error = %e, "Failed to remove user of aborted registration");
    }
}

/// Verifies credentials, resolves device and app, then opens a session.
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn login_core(
    broker: &Broker,
    app_ctx: &AppAuthContext,
    request: LoginRequest,
) -> Result<LoginOutcome, BrokerError> {
    require(&request.email, "email")?;
    require(&request.device_id, "device_id")?;
    let client_type = resolve_client_type(request.device_type.as_deref())?;
    let access_ttl = validate_ttl(request.access_ttl, "access_ttl")?;
    let refresh_ttl = validate_ttl(request.refresh_ttl, "refresh_ttl")?;

    let user = broker
        .credentials()
        .verify(&request.email, &request.password)
        .await?;

    let app_id = request
        .app_id
        .as_deref()
        .or(app_ctx.app_id())
        .ok_or_else(|| BrokerError::Validation("app_id is required".to_string()))?;
    let app = broker
        .apps()
        .find_by_id(app_id)
        .await?
        .ok_or_else(|| BrokerError::AppNotFound {
            app: app_id.to_string(),
        })?;
    check_app_matches(app_ctx, &app)?;

    let device = resolve_device(
        broker,
        &user.id,
        &request.device_id,
        request.device_name,
        &client_type,
    )
    .await?;

    let response =
        open_session(broker, &user, &device, &app, client_type, access_ttl, refresh_ttl).await?;

    tracing::info!(user_id = %user.id, session_id = %response.session_id, "User logged in");
    deliver(broker, app_ctx, response).await
}

pub async fn refresh_core(
    broker: &Broker,
    request: RefreshRequest,
) -> Result<RotationOutcome, BrokerError> {
    require(&request.refresh_token, "refresh_token")?;
    broker.rotation().rotate(request).await
}

/// Redeems an escrowed login.
pub async fn verify_pkce_core(
    broker: &Broker,
    secret_key: &str,
    code_verifier: &str,
) -> Result<Value, BrokerError> {
    require(secret_key, "secret_key")?;
    require(code_verifier, "code_verifier")?;
    broker.escrow().verify(secret_key, code_verifier).await
}

/// Changes the caller's own password.
pub async fn change_password_core(
    broker: &Broker,
    identity: &Identity,
    request: ChangePasswordRequest,
) -> Result<(), BrokerError> {
    broker
        .credentials()
        .change_password(&identity.user_id, &request.old_password, &request.new_password)
        .await
}

/// Issues a session on behalf of another internal service.
pub async fn create_session_core(
    broker: &Broker,
    app_ctx: &AppAuthContext,
    request: IssueRequest,
) -> Result<IssuedSession, BrokerError> {
    if !app_ctx.is_internal() {
        return Err(BrokerError::Forbidden(
            "Internal authentication required".to_string(),
        ));
    }
    require(&request.user_id, "user_id")?;
    require(&request.app_id, "app_id")?;
    require(&request.device_id, "device_id")?;
    validate_ttl(request.access_ttl, "access_ttl")?;
    validate_ttl(request.refresh_ttl, "refresh_ttl")?;

    broker.issuer().issue(request).await
}
