use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub(crate) struct TlsPaths {
    pub cert: String,
    pub key: String,
}

impl TlsPaths {
    /// Both `TLS_CERT_PATH` and `TLS_KEY_PATH` must be set to enable HTTPS.
    pub(crate) fn from_env() -> Option<Self> {
        let cert = std::env::var("TLS_CERT_PATH").ok()?;
        let key = std::env::var("TLS_KEY_PATH").ok()?;
        Some(Self { cert, key })
    }
}

pub(crate) fn port_from_env(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

pub(crate) fn spawn_http_server(port: u16, app: Router) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        tracing::info!("HTTP server listening on {}", addr);
        axum_server::bind(addr).serve(app.into_make_service()).await
    })
}

pub(crate) async fn spawn_https_server(
    port: u16,
    app: Router,
    tls: TlsPaths,
) -> std::io::Result<JoinHandle<std::io::Result<()>>> {
    let config = RustlsConfig::from_pem_file(tls.cert, tls.key).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTPS server listening on {}", addr);
    Ok(tokio::spawn(async move {
        axum_server::bind_rustls(addr, config)
            .serve(app.into_make_service())
            .await
    }))
}

pub(crate) fn init_tracing(app_name: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            format!("identity_broker=trace,identity_broker_axum=trace,{app_name}=trace,info")
                .into()
        }

        #[cfg(not(debug_assertions))]
        {
            "info".into()
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    #[cfg(debug_assertions)]
    tracing::info!("Debug build: detailed logs for {app_name} by default");
    tracing::info!("Set RUST_LOG to change verbosity, e.g. RUST_LOG=debug");
}
