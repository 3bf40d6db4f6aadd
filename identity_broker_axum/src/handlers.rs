use std::sync::Arc;

use axum::extract::{Path, State};
use http::StatusCode;
use serde_json::{Value, json};

use identity_broker::{
    Broker, ChangePasswordRequest, Identity, IssueRequest, IssuedSession, LoginOutcome,
    LoginRequest, PkceVerifyRequest, RefreshRequest, RegisterRequest, RotationOutcome,
    SessionFilter, SessionRecord, change_password_core, create_session_core, delete_session_core,
    delete_sessions_core, device_session_core, get_session_core, list_sessions_core, login_core,
    refresh_core, register_core, verify_pkce_core,
};

use crate::error::{ApiError, IntoResponseError};
use crate::extract::{AppContext, AuthIdentity, DeviceParam, Json, Query};

pub(crate) async fn register(
    State(broker): State<Arc<Broker>>,
    AppContext(app_ctx): AppContext,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginOutcome>), ApiError> {
    let outcome = register_core(&broker, &app_ctx, request)
        .await
        .into_response_error()?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub(crate) async fn login(
    State(broker): State<Arc<Broker>>,
    AppContext(app_ctx): AppContext,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginOutcome>, ApiError> {
    login_core(&broker, &app_ctx, request)
        .await
        .map(Json)
        .into_response_error()
}

pub(crate) async fn refresh(
    State(broker): State<Arc<Broker>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RotationOutcome>, ApiError> {
    refresh_core(&broker, request)
        .await
        .map(Json)
        .into_response_error()
}

pub(crate) async fn verify_pkce(
    State(broker): State<Arc<Broker>>,
    Json(request): Json<PkceVerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    verify_pkce_core(&broker, &request.secret_key, &request.code_verifier)
        .await
        .map(Json)
        .into_response_error()
}

pub(crate) async fn me(AuthIdentity(identity): AuthIdentity) -> Json<Identity> {
    Json(identity)
}

pub(crate) async fn change_password(
    State(broker): State<Arc<Broker>>,
    AuthIdentity(identity): AuthIdentity,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    change_password_core(&broker, &identity, request)
        .await
        .into_response_error()?;
    Ok(Json(json!({ "message": "Password updated" })))
}

pub(crate) async fn create_session(
    State(broker): State<Arc<Broker>>,
    AppContext(app_ctx): AppContext,
    Json(request): Json<IssueRequest>,
) -> Result<(StatusCode, Json<IssuedSession>), ApiError> {
    let issued = create_session_core(&broker, &app_ctx, request)
        .await
        .into_response_error()?;
    Ok((StatusCode::CREATED, Json(issued)))
}

pub(crate) async fn list_sessions(
    State(broker): State<Arc<Broker>>,
    AuthIdentity(identity): AuthIdentity,
    Query(filter): Query<SessionFilter>,
) -> Result<Json<Vec<SessionRecord>>, ApiError> {
    list_sessions_core(&broker, &identity, filter)
        .await
        .map(Json)
        .into_response_error()
}

pub(crate) async fn get_session(
    State(broker): State<Arc<Broker>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionRecord>, ApiError> {
    get_session_core(&broker, &session_id)
        .await
        .map(Json)
        .into_response_error()
}

pub(crate) async fn delete_session(
    State(broker): State<Arc<Broker>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_session_core(&broker, &session_id)
        .await
        .into_response_error()?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn delete_sessions(
    State(broker): State<Arc<Broker>>,
    AuthIdentity(identity): AuthIdentity,
    Query(filter): Query<SessionFilter>,
) -> Result<Json<Value>, ApiError> {
    let deleted = delete_sessions_core(&broker, &identity, filter)
        .await
        .into_response_error()?;
    Ok(Json(json!({ "deleted": deleted })))
}

pub(crate) async fn device_session(
    State(broker): State<Arc<Broker>>,
    AuthIdentity(identity): AuthIdentity,
    DeviceParam(device): DeviceParam,
) -> Result<Json<SessionRecord>, ApiError> {
    device_session_core(&broker, &identity, &device)
        .await
        .map(Json)
        .into_response_error()
}
