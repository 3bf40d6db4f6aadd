use std::sync::Arc;

use axum::{Json, Router, middleware::from_fn_with_state, routing::get};
use serde_json::{Value, json};

use identity_broker::{Broker, BrokerConfig};
use identity_broker_axum::{
    AuthIdentity, BROKER_ROUTE_PREFIX, authenticate_request, broker_router,
};

mod server;

use crate::server::{TlsPaths, init_tracing, port_from_env, spawn_http_server, spawn_https_server};

async fn index() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "auth": BROKER_ROUTE_PREFIX.as_str(),
    }))
}

async fn protected(AuthIdentity(identity): AuthIdentity) -> Json<Value> {
    Json(json!({
        "message": "Authenticated",
        "user_id": identity.user_id,
        "app_id": identity.app_id,
        "device_id": identity.device_id,
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // rustls needs a process-wide crypto provider before any TLS config is built
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "Failed to install default CryptoProvider")?;

    dotenvy::dotenv().ok();
    init_tracing(env!("CARGO_CRATE_NAME"));

    let broker = Broker::connect(BrokerConfig::from_env()?).await?;
    broker.init().await?;
    let broker = Arc::new(broker);

    let app = Router::new()
        .route(
            "/protected",
            get(protected).route_layer(from_fn_with_state(broker.clone(), authenticate_request)),
        )
        .route("/", get(index))
        .nest(BROKER_ROUTE_PREFIX.as_str(), broker_router(broker.clone()));

    let http_server = spawn_http_server(port_from_env("PORT", 3000), app.clone());

    match TlsPaths::from_env() {
        Some(tls) => {
            let https_server =
                spawn_https_server(port_from_env("HTTPS_PORT", 3443), app, tls).await?;
            let (http, https) = tokio::try_join!(http_server, https_server)?;
            http?;
            https?;
        }
        None => http_server.await??,
    }

    broker.close().await;
    Ok(())
}
