use std::sync::Arc;

use crate::errors::BrokerError;
use crate::session::{CLIENT_TYPES, DEFAULT_CLIENT_TYPE, NewSession, SessionStore};

use super::codec::TokenCodec;
use super::types::{IssueRequest, IssuedSession, TokenPair, TokenType};

/// Longest token lifetime a caller may ask for: ten years.
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Checks a caller-supplied lifetime before anything is written.
///
/// Absent means "use the configured default". Present must be in
/// `1..=MAX_TOKEN_TTL_SECS`.
pub fn validate_ttl(ttl: Option<i64>, name: &str) -> Result<Option<i64>, BrokerError> {
    match ttl {
        Some(secs) if !(1..=MAX_TOKEN_TTL_SECS).contains(&secs) => {
            Err(BrokerError::Validation(format!(
                "{name} must be between 1 and {MAX_TOKEN_TTL_SECS} seconds"
            )))
        }
        _ => Ok(ttl),
    }
}

/// Mints token pairs and stores them as the session of their triple.
#[derive(Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    sessions: SessionStore,
}

impl TokenIssuer {
    pub fn new(codec: Arc<TokenCodec>, sessions: SessionStore) -> Self {
        Self { codec, sessions }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Signs an access and a refresh token for the triple without touching storage.
    pub fn mint_pair(
        &self,
        user_id: &str,
        app_id: &str,
        device_id: &str,
        access_ttl: Option<i64>,
        refresh_ttl: Option<i64>,
    ) -> Result<TokenPair, BrokerError> {
        let (access_token, access_token_expires_at) = self.codec.sign(
            TokenType::Access,
            user_id,
            app_id,
            device_id,
            access_ttl.unwrap_or(self.codec.access_ttl),
        )?;
        let (refresh_token, refresh_token_expires_at) = self.codec.sign(
            TokenType::Refresh,
            user_id,
            app_id,
            device_id,
            refresh_ttl.unwrap_or(self.codec.refresh_ttl),
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_token_expires_at,
            refresh_token_expires_at,
        })
    }

    /// Mints a pair and upserts the session, replacing any earlier pair of the triple.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, app_id = %request.app_id, device_id = %request.device_id))]
    pub async fn issue(&self, request: IssueRequest) -> Result<IssuedSession, BrokerError> {
        let client_type = request
            .client_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CLIENT_TYPE.to_string());
        if !CLIENT_TYPES.contains(&client_type.as_str()) {
            return Err(BrokerError::Validation(format!(
                "Invalid client type: {client_type}"
            )));
        }

        let tokens = self.mint_pair(
            &request.user_id,
            &request.app_id,
            &request.device_id,
            request.access_ttl,
            request.refresh_ttl,
        )?;

        let session = self
            .sessions
            .upsert_session(NewSession {
                user_id: request.user_id,
                app_id: request.app_id,
                device_id: request.device_id,
                client_type,
                access_token: tokens.access_token.clone(),
                refresh_token: tokens.refresh_token.clone(),
                access_token_expires_at: tokens.access_token_expires_at,
                refresh_token_expires_at: tokens.refresh_token_expires_at,
            })
            .await?;

        tracing::info!(session_id = %session.id, "Session issued");

        Ok(IssuedSession {
            session_id: session.id,
            tokens,
        })
    }
}
