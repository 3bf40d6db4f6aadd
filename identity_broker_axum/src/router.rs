//! Router for every broker endpoint

use std::sync::Arc;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
};
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use identity_broker::{Broker, GuardOptions};

use super::handlers;
use super::middleware::{
    GuardState, authenticate_app, authenticate_request, extract_device_identity, guard_identity,
};

/// Create the broker router with HTTP tracing
///
/// Mount it under [`BROKER_ROUTE_PREFIX`](crate::BROKER_ROUTE_PREFIX):
/// - POST /register, /login, /refresh: application authentication
/// - POST /pkce/verify: no authentication
/// - GET /me, PATCH /change-password: access token
/// - POST /sessions: internal authentication
/// - GET, DELETE /sessions and /sessions/{id}: access token and ownership
/// - GET /devices/{id}/session: access token, device id and ownership
pub fn broker_router(broker: Arc<Broker>) -> Router {
    broker_router_no_trace(broker).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
    )
}

/// Same routes as [`broker_router`] without the tracing layer.
pub fn broker_router_no_trace(broker: Arc<Broker>) -> Router {
    let app_auth = from_fn_with_state(broker.clone(), authenticate_app);
    let jwt = from_fn_with_state(broker.clone(), authenticate_request);
    let guard = |options: GuardOptions| {
        from_fn_with_state(GuardState::new(broker.clone(), options), guard_identity)
    };

    // Route layers wrap outward: the access token check runs first, the guard last
    Router::new()
        .route("/register", post(handlers::register).route_layer(app_auth.clone()))
        .route("/login", post(handlers::login).route_layer(app_auth.clone()))
        .route("/refresh", post(handlers::refresh).route_layer(app_auth.clone()))
        .route("/pkce/verify", post(handlers::verify_pkce))
        .route("/me", get(handlers::me).route_layer(jwt.clone()))
        .route(
            "/change-password",
            patch(handlers::change_password)
                .route_layer(guard(GuardOptions::user()))
                .route_layer(jwt.clone()),
        )
        .route(
            "/sessions",
            post(handlers::create_session)
                .route_layer(app_auth)
                .merge(
                    get(handlers::list_sessions)
                        .delete(handlers::delete_sessions)
                        .route_layer(guard(GuardOptions::user().with_admin().with_partial()))
                        .route_layer(jwt.clone()),
                ),
        )
        .route(
            "/sessions/{id}",
            get(handlers::get_session)
                .delete(handlers::delete_session)
                .route_layer(guard(GuardOptions::session().with_admin()))
                .route_layer(jwt.clone()),
        )
        .route(
            "/devices/{id}/session",
            get(handlers::device_session)
                .route_layer(guard(GuardOptions::user_device().with_admin()))
                .route_layer(from_fn(extract_device_identity))
                .route_layer(jwt),
        )
        .with_state(broker)
}
