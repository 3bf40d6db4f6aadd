//! Error taxonomy shared by every broker operation

use http::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::token::TokenError;
use crate::utils::UtilError;

/// Errors surfaced by broker operations.
///
/// Each variant maps to an HTTP status via [`BrokerError::status_code`] and to a
/// stable discriminator via [`BrokerError::error_type`]; clients branch on the
/// latter, never on the message text.
#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    #[error("User not found")]
    UserNotFound { lookup: String },

    #[error("App not found")]
    AppNotFound { app: String },

    #[error("Device not found")]
    DeviceNotFound { user_id: String, device_id: String },

    #[error("Session not found")]
    SessionNotFound,

    #[error("Refresh token not found")]
    RefreshTokenNotFound,

    #[error("Incorrect credentials")]
    IncorrectPassword,

    #[error("New password must differ from the current password")]
    PasswordMatch,

    /// Non-recoverable token failure: bad signature, wrong type, inconsistent claims
    #[error("{0}")]
    AccessToken(String),

    #[error("Access token expired")]
    AccessTokenExpired,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Refresh token has already been used")]
    RefreshTokenReplay,

    #[error("{0}")]
    IncorrectAppSecret(String),

    #[error("{message}")]
    Auth { message: String, status: StatusCode },

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("No authentication method provided")]
    NoAuthenticationMethod,

    #[error("Multiple authentication methods provided")]
    MultipleAuthMethods,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(ConfigError),
}

impl BrokerError {
    /// 400 AuthError
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// 401 AuthError
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UserNotFound { .. }
            | Self::AppNotFound { .. }
            | Self::DeviceNotFound { .. }
            | Self::SessionNotFound
            | Self::RefreshTokenNotFound => StatusCode::NOT_FOUND,
            Self::IncorrectPassword
            | Self::AccessToken(_)
            | Self::AccessTokenExpired
            | Self::RefreshTokenExpired
            | Self::RefreshTokenReplay
            | Self::IncorrectAppSecret(_)
            | Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::Auth { status, .. } => *status,
            Self::PasswordMatch
            | Self::NoAuthenticationMethod
            | Self::MultipleAuthMethods
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Crypto(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UserNotFound { .. } => "UserNotFoundError",
            Self::AppNotFound { .. } => "AppNotFoundError",
            Self::DeviceNotFound { .. } => "DeviceNotFoundError",
            Self::SessionNotFound => "SessionNotFoundError",
            Self::RefreshTokenNotFound => "RefreshTokenNotFoundError",
            Self::IncorrectPassword => "IncorrectPasswordError",
            Self::PasswordMatch => "PasswordMatchError",
            Self::AccessToken(_) => "AccessTokenError",
            Self::AccessTokenExpired => "AccessTokenExpiredError",
            Self::RefreshTokenExpired => "RefreshTokenExpiredError",
            Self::RefreshTokenReplay => "RefreshTokenReplayError",
            Self::IncorrectAppSecret(_) => "IncorrectAppSecretError",
            Self::Auth { .. } => "AuthError",
            Self::AuthenticationRequired => "AuthenticationRequiredError",
            Self::NoAuthenticationMethod => "NoAuthenticationMethodProvidedError",
            Self::MultipleAuthMethods => "MultipleAuthMethodsProvidedError",
            Self::Forbidden(_) => "ForbiddenError",
            Self::Conflict(_) => "ConflictError",
            Self::Validation(_) => "ValidationError",
            Self::Storage(_) | Self::Crypto(_) | Self::Config(_) => "InternalServerError",
        }
    }

    /// Structured payload for the client. Internal failures never carry one.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::UserNotFound { lookup } => Some(json!({ "user": lookup })),
            Self::AppNotFound { app } => Some(json!({ "app_id": app })),
            Self::DeviceNotFound { user_id, device_id } => {
                Some(json!({ "user_id": user_id, "device_id": device_id }))
            }
            _ => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<StorageError> for BrokerError {
    fn from(err: StorageError) -> Self {
        let error = Self::Storage(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<UtilError> for BrokerError {
    fn from(err: UtilError) -> Self {
        let error = Self::Crypto(err.to_string());
        tracing::error!("{}", error);
        error
    }
}

impl From<ConfigError> for BrokerError {
    fn from(err: ConfigError) -> Self {
        let error = Self::Config(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<TokenError> for BrokerError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::AccessTokenExpired,
            TokenError::Invalid(msg) => Self::AccessToken(msg),
            TokenError::Lifetime(secs) => {
                Self::Validation(format!("Token lifetime out of range: {secs}s"))
            }
            TokenError::Encoding(msg) => {
                let error = Self::Crypto(msg);
                tracing::error!("{}", error);
                error
            }
        }
    }
}
