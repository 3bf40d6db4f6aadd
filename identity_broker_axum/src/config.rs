//! Route-level settings for the axum integration

use std::sync::LazyLock;

/// Mount point of the broker routes
/// Default: "/auth"
pub static BROKER_ROUTE_PREFIX: LazyLock<String> = LazyLock::new(|| {
    route_prefix(std::env::var("BROKER_ROUTE_PREFIX").ok().as_deref())
});

/// Upper bound on request bodies buffered for signing and ownership checks
pub(crate) const MAX_BODY_BYTES: usize = 1024 * 1024;

fn route_prefix(env_value: Option<&str>) -> String {
    env_value
        .map(|s| s.trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .unwrap_or("/auth")
        .to_string()
}
