use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::utils::sha256_hex;

/// An end user known to the broker
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    /// Argon2 PHC string; `None` for accounts that never set a password
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, username: Option<String>, password_hash: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            username,
            password_hash,
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A registered client application (tenant)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct App {
    pub id: String,
    pub name: String,
    pub display_name: String,
    /// `hex(SHA-256(raw secret))`, also the HMAC key for signed requests
    #[serde(skip_serializing, default)]
    pub hashed_secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl App {
    pub fn new(name: String, display_name: String, raw_secret: Option<&str>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            display_name,
            hashed_secret: raw_secret.map(hash_app_secret),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Derives the stored form of an application secret.
pub fn hash_app_secret(raw_secret: &str) -> String {
    sha256_hex(raw_secret.as_bytes())
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct UserApp {
    pub id: String,
    pub user_id: String,
    pub app_id: String,
    pub created_at: DateTime<Utc>,
}

/// A client installation of a user, unique per `(user_id, device_id)`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Device {
    pub id: String,
    pub user_id: String,
    pub device_id: String,
    pub device_name: Option<String>,
    pub device_type: String,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Device {
    pub fn new(
        user_id: String,
        device_id: String,
        device_name: Option<String>,
        device_type: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            device_id,
            device_name,
            device_type,
            last_active_at: Some(now),
            created_at: now,
        }
    }
}

/// Result of an insert that tolerates an existing row with the same natural key.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome<T> {
    Created(T),
    AlreadyExists(T),
}

impl<T> CreateOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            Self::Created(value) | Self::AlreadyExists(value) => value,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Debug, Clone)]
pub enum UserSearchField {
    Id(String),
    Email(String),
}

impl fmt::Display for UserSearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserSearchField::Id(id) => write!(f, "Id({id})"),
            UserSearchField::Email(email) => write!(f, "Email({email})"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AppSearchField {
    Id(String),
    Name(String),
}

impl fmt::Display for AppSearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppSearchField::Id(id) => write!(f, "Id({id})"),
            AppSearchField::Name(name) => write!(f, "Name({name})"),
        }
    }
}
