//! Shared setup for router tests: a broker over in-memory stores and request builders

use std::sync::Arc;

use axum::{Router, body::Body, response::Response};
use http::Request;
use serde_json::{Value, json};

use identity_broker::{
    App, Broker, BrokerConfig, canonical_body, create_internal_signature, sign, signing_string,
};

use crate::broker_router_no_trace;

pub(crate) const INTERNAL_SECRET: &str = "router-internal-secret";
pub(crate) const PASSWORD: &str = "router-password";

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) struct TestApp {
    pub broker: Arc<Broker>,
    pub app: App,
}

impl TestApp {
    pub async fn new() -> Self {
        let config = BrokerConfig::from_lookup(|name| {
            match name {
                "ACCESS_TOKEN_SECRET" => Some("router-access-secret"),
                "REFRESH_TOKEN_SECRET" => Some("router-refresh-secret"),
                "INTERNAL_SECRET" => Some(INTERNAL_SECRET),
                _ => None,
            }
            .map(str::to_string)
        })
        .expect("config");
        let broker = Broker::connect(config).await.expect("broker connects");
        broker.init().await.expect("tables created");

        let app = broker
            .apps()
            .create_app(App::new(
                "router-app".to_string(),
                "Router App".to_string(),
                Some("router-app-secret"),
            ))
            .await
            .expect("app created")
            .into_inner();

        Self {
            broker: Arc::new(broker),
            app,
        }
    }

    /// The broker routes mounted the way an application would mount them.
    pub fn router(&self) -> Router {
        Router::new().nest("/auth", broker_router_no_trace(self.broker.clone()))
    }

    pub fn register_body(&self, email: &str, device_id: &str) -> Value {
        json!({
            "email": email,
            "password": PASSWORD,
            "app_name": self.app.name,
            "device_id": device_id,
        })
    }

    pub fn signed(&self, method: &str, uri: &str, body: &Value) -> Request<Body> {
        self.signed_at(method, uri, body, now_ms())
    }

    /// A request to `uri` carrying an app signature over `uri` and `body`.
    pub fn signed_at(&self, method: &str, uri: &str, body: &Value, ts: i64) -> Request<Body> {
        let raw = body.to_string();
        let key = self.app.hashed_secret.as_deref().expect("app secret");
        let signature = sign(
            key.as_bytes(),
            &signing_string(method, uri, ts, &canonical_body(raw.as_bytes())),
        )
        .expect("signature");

        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-app-id", &self.app.id)
            .header("x-signature", signature)
            .header("x-timestamp", ts.to_string())
            .body(Body::from(raw))
            .expect("request")
    }

    /// Registers through the router and returns the session body.
    pub async fn register(&self, email: &str, device_id: &str) -> Value {
        use tower::ServiceExt;

        let body = self.register_body(email, device_id);
        let response = self
            .router()
            .oneshot(self.signed("POST", "/auth/register", &body))
            .await
            .expect("router responds");
        assert!(response.status().is_success(), "{}", response.status());
        body_json(response).await
    }
}

pub(crate) fn internal_signed(method: &str, uri: &str, body: &Value) -> Request<Body> {
    let created =
        create_internal_signature(INTERNAL_SECRET, method, uri, Some(body)).expect("signature");

    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-internal-signature", created.signature)
        .header("x-internal-timestamp", created.timestamp)
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub(crate) fn bearer(token: &Value) -> String {
    format!("Bearer {}", token.as_str().expect("token string"))
}

pub(crate) fn bearer_get(uri: &str, token: &Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", bearer(token))
        .body(Body::empty())
        .expect("request")
}

pub(crate) async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
