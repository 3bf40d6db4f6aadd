use serde::{Deserialize, Serialize};

/// The caller established by a verified access token (or a successful refresh fallback).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub app_id: String,
    pub device_id: String,
    pub session_id: String,
    /// Set when the identity came from rotating an expired access token.
    #[serde(default)]
    pub refreshed: bool,
}

/// How the calling application proved itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AppAuthContext {
    Pkce {
        app_id: String,
        code_challenge: String,
    },
    App {
        app_id: String,
    },
    Internal,
}

impl AppAuthContext {
    pub fn app_id(&self) -> Option<&str> {
        match self {
            Self::Pkce { app_id, .. } | Self::App { app_id } => Some(app_id),
            Self::Internal => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}
