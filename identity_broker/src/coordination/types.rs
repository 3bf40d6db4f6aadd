use serde::{Deserialize, Serialize};

use crate::auth::EscrowReceipt;
use crate::token::TokenPair;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    #[serde(alias = "password_hash")]
    pub password: String,
    pub username: Option<String>,
    /// Name of the application the user signs up through
    pub app_name: String,
    pub device_id: String,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    #[serde(default, alias = "accessTokenTtl")]
    pub access_ttl: Option<i64>,
    #[serde(default, alias = "refreshTokenTtl")]
    pub refresh_ttl: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(alias = "password_hash")]
    pub password: String,
    /// Falls back to the app that authenticated the request
    pub app_id: Option<String>,
    pub device_id: String,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    #[serde(default, alias = "accessTokenTtl")]
    pub access_ttl: Option<i64>,
    #[serde(default, alias = "refreshTokenTtl")]
    pub refresh_ttl: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub user_id: Option<String>,
    #[serde(alias = "old_password_hash")]
    pub old_password: String,
    #[serde(alias = "new_password_hash")]
    pub new_password: String,
}

/// Returned by login and register once a session exists
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionResponse {
    pub user_id: String,
    /// Row id of the device record
    pub device_record_id: String,
    pub device_id: String,
    pub app_id: String,
    pub session_id: String,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// A login either hands out the session or parks it behind a PKCE challenge.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LoginOutcome {
    Session(SessionResponse),
    Escrowed(EscrowReceipt),
}

impl LoginOutcome {
    pub fn session(&self) -> Option<&SessionResponse> {
        match self {
            Self::Session(session) => Some(session),
            Self::Escrowed(_) => None,
        }
    }

    pub fn receipt(&self) -> Option<&EscrowReceipt> {
        match self {
            Self::Session(_) => None,
            Self::Escrowed(receipt) => Some(receipt),
        }
    }
}
