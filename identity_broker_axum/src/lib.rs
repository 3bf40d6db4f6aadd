//! Axum integration for identity-broker
//!
//! [`broker_router`] exposes registration, login, refresh, PKCE redemption and session
//! administration. The layers it is built from are public too, for applications that
//! want broker authentication on their own routes:
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use identity_broker::Broker;
//! use identity_broker_axum::{AuthIdentity, BROKER_ROUTE_PREFIX, authenticate_request, broker_router};
//!
//! async fn whoami(AuthIdentity(identity): AuthIdentity) -> String {
//!     identity.user_id
//! }
//!
//! fn app(broker: Arc<Broker>) -> Router {
//!     Router::new()
//!         .route("/whoami", get(whoami))
//!         .route_layer(from_fn_with_state(broker.clone(), authenticate_request))
//!         .nest(BROKER_ROUTE_PREFIX.as_str(), broker_router(broker))
//! }
//! ```

mod config;
mod error;
mod extract;
mod handlers;
mod middleware;
mod router;

#[cfg(test)]
mod test_utils;

pub use config::BROKER_ROUTE_PREFIX;
pub use error::ApiError;
pub use extract::{AppContext, AuthIdentity, DeviceParam, Json, Query};
pub use middleware::{
    GuardState, HEADER_ACCESS_TOKEN, HEADER_ACCESS_TOKEN_TTL, HEADER_REFRESH_TOKEN,
    HEADER_REFRESH_TOKEN_TTL, authenticate_app, authenticate_request, extract_device_identity,
    guard_identity,
};
pub use router::{broker_router, broker_router_no_trace};
