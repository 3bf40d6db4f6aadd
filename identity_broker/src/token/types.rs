use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT payload shared by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: String,
    pub app: String,
    pub device: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// What a session is minted for. TTLs are seconds and fall back to the configured defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueRequest {
    pub user_id: String,
    pub app_id: String,
    pub device_id: String,
    pub client_type: Option<String>,
    #[serde(default, alias = "accessTokenTtl")]
    pub access_ttl: Option<i64>,
    #[serde(default, alias = "refreshTokenTtl")]
    pub refresh_ttl: Option<i64>,
}

/// A freshly minted pair and the session that now holds it
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub session_id: String,
    #[serde(flatten)]
    pub tokens: TokenPair,
}
