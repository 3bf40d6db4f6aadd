use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_CLIENT_TYPE: &str = "browser";
pub const CLIENT_TYPES: [&str; 3] = ["browser", "mobile", "desktop"];

/// The single live session of a `(user_id, device_id, app_id)` triple
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub app_id: String,
    pub device_id: String,
    pub client_type: String,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    #[serde(skip_serializing, default)]
    pub refresh_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Mirrors `refresh_token_expires_at`; past this point the session is dead.
    pub expires_at: DateTime<Utc>,
}

/// Everything the upsert writes; the id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: String,
    pub app_id: String,
    pub device_id: String,
    pub client_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

impl NewSession {
    pub(crate) fn into_record(self) -> SessionRecord {
        SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.user_id,
            app_id: self.app_id,
            device_id: self.device_id,
            client_type: self.client_type,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            access_token_expires_at: self.access_token_expires_at,
            refresh_token_expires_at: self.refresh_token_expires_at,
            created_at: Utc::now(),
            expires_at: self.refresh_token_expires_at,
        }
    }
}

/// Optional equality filters; an empty filter matches every session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionFilter {
    pub user_id: Option<String>,
    pub app_id: Option<String>,
    pub device_id: Option<String>,
}

impl SessionFilter {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.app_id.is_none() && self.device_id.is_none()
    }

    pub(crate) fn columns(&self) -> Vec<(&'static str, &str)> {
        [
            ("user_id", self.user_id.as_deref()),
            ("app_id", self.app_id.as_deref()),
            ("device_id", self.device_id.as_deref()),
        ]
        .into_iter()
        .filter_map(|(column, value)| value.map(|v| (column, v)))
        .collect()
    }
}
