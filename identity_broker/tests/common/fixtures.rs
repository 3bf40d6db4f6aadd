use std::sync::Once;

use chrono::Utc;
use http::{HeaderMap, HeaderName, HeaderValue};
use identity_broker::{
    App, AppAuthContext, Broker, BrokerConfig, LoginOutcome, LoginRequest, RegisterRequest,
    SessionResponse, canonical_body, login_core, register_core, sign, signing_string,
};

pub const APP_NAME: &str = "web-console";
pub const APP_SECRET: &str = "web-console-raw-secret";
pub const PASSWORD: &str = "integration-password";
pub const INTERNAL_SECRET: &str = "integration-internal-secret";

fn load_test_env() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
    });
}

pub fn test_config() -> BrokerConfig {
    BrokerConfig::from_lookup(|name| {
        match name {
            "ACCESS_TOKEN_SECRET" => Some("integration-access-secret"),
            "REFRESH_TOKEN_SECRET" => Some("integration-refresh-secret"),
            "INTERNAL_SECRET" => Some(INTERNAL_SECRET),
            "GENERIC_DATA_STORE_URL" => Some("sqlite::memory:"),
            _ => None,
        }
        .map(str::to_string)
    })
    .expect("integration config")
}

/// A broker over a private in-memory database, with one registered app.
pub struct TestContext {
    pub broker: Broker,
    pub app: App,
}

impl TestContext {
    pub async fn new() -> Self {
        load_test_env();
        let broker = Broker::connect(test_config())
            .await
            .expect("broker connects");
        broker.init().await.expect("tables created");

        let app = broker
            .apps()
            .create_app(App::new(
                APP_NAME.to_string(),
                "Web Console".to_string(),
                Some(APP_SECRET),
            ))
            .await
            .expect("app created")
            .into_inner();

        Self { broker, app }
    }

    pub fn app_context(&self) -> AppAuthContext {
        AppAuthContext::App {
            app_id: self.app.id.clone(),
        }
    }

    pub fn register_request(&self, email: &str, device_id: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            username: None,
            app_name: APP_NAME.to_string(),
            device_id: device_id.to_string(),
            device_name: Some(format!("{device_id} device")),
            device_type: None,
            access_ttl: None,
            refresh_ttl: None,
        }
    }

    pub fn login_request(&self, email: &str, password: &str, device_id: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            app_id: Some(self.app.id.clone()),
            device_id: device_id.to_string(),
            device_name: None,
            device_type: None,
            access_ttl: None,
            refresh_ttl: None,
        }
    }

    /// Registers a user and returns the session opened for them.
    pub async fn register(&self, email: &str, device_id: &str) -> SessionResponse {
        match register_core(
            &self.broker,
            &self.app_context(),
            self.register_request(email, device_id),
        )
        .await
        .expect("registration succeeds")
        {
            LoginOutcome::Session(session) => session,
            LoginOutcome::Escrowed(_) => panic!("registration without PKCE was escrowed"),
        }
    }

    pub async fn login(&self, email: &str, device_id: &str) -> SessionResponse {
        match login_core(
            &self.broker,
            &self.app_context(),
            self.login_request(email, PASSWORD, device_id),
        )
        .await
        .expect("login succeeds")
        {
            LoginOutcome::Session(session) => session,
            LoginOutcome::Escrowed(_) => panic!("login without PKCE was escrowed"),
        }
    }

    /// Headers an app would send for a signed request.
    pub fn app_signed_headers(&self, method: &str, url: &str, body: &[u8], ts: i64) -> HeaderMap {
        let key = self.app.hashed_secret.clone().expect("app has a secret");
        let signature = sign(
            key.as_bytes(),
            &signing_string(method, url, ts, &canonical_body(body)),
        )
        .expect("signature");

        headers(&[
            ("x-app-id", &self.app.id),
            ("x-signature", &signature),
            ("x-timestamp", &ts.to_string()),
        ])
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(
            HeaderName::from_bytes(name.as_bytes()).expect("header name"),
            HeaderValue::from_str(value).expect("header value"),
        );
    }
    map
}
