//! Refresh-token rotation
//!
//! A refresh token is good for exactly one rotation. The swap is a conditional update
//! keyed on the presented token, so of two concurrent rotations only one can win.

use serde::{Deserialize, Serialize};

use crate::errors::BrokerError;
use crate::session::{SessionRecord, SessionStore};
use crate::token::{TokenClaims, TokenError, TokenIssuer, TokenPair, TokenType, validate_ttl};

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
    #[serde(default, alias = "accessTokenTtl")]
    pub access_ttl: Option<i64>,
    #[serde(default, alias = "refreshTokenTtl")]
    pub refresh_ttl: Option<i64>,
}

impl RefreshRequest {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            access_ttl: None,
            refresh_ttl: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RotationOutcome {
    pub session_id: String,
    pub user_id: String,
    pub app_id: String,
    pub device_id: String,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct RotationEngine {
    issuer: TokenIssuer,
    sessions: SessionStore,
}

impl RotationEngine {
    pub fn new(issuer: TokenIssuer, sessions: SessionStore) -> Self {
        Self { issuer, sessions }
    }

    #[tracing::instrument(skip_all)]
    pub async fn rotate(&self, request: RefreshRequest) -> Result<RotationOutcome, BrokerError> {
        let access_ttl = validate_ttl(request.access_ttl, "access_ttl")?;
        let refresh_ttl = validate_ttl(request.refresh_ttl, "refresh_ttl")?;

        let presented = request.refresh_token.as_str();
        let (session, claims) = self.resolve(presented).await?;
        self.swap(session, claims, presented, access_ttl, refresh_ttl).await
    }

    /// Finds the session holding `presented` and checks the token belongs to it.
    async fn resolve(&self, presented: &str) -> Result<(SessionRecord, TokenClaims), BrokerError> {
        let session = self
            .sessions
            .find_by_refresh_token(presented)
            .await?
            .ok_or(BrokerError::RefreshTokenNotFound)?;

        let claims = self
            .issuer
            .codec()
            .verify(presented, TokenType::Refresh)
            .map_err(|e| match e {
                TokenError::Expired => BrokerError::RefreshTokenExpired,
                other => BrokerError::from(other),
            })?;

        if claims.sub != session.user_id
            || claims.app != session.app_id
            || claims.device != session.device_id
        {
            tracing::warn!(session_id = %session.id, "Refresh token claims do not match session");
            return Err(BrokerError::AccessToken(
                "Refresh token does not match session".to_string(),
            ));
        }

        Ok((session, claims))
    }

    /// Replaces `presented` with a fresh pair, provided the session still holds it.
    async fn swap(
        &self,
        session: SessionRecord,
        claims: TokenClaims,
        presented: &str,
        access_ttl: Option<i64>,
        refresh_ttl: Option<i64>,
    ) -> Result<RotationOutcome, BrokerError> {
        let tokens = self.issuer.mint_pair(
            &claims.sub,
            &claims.app,
            &claims.device,
            access_ttl,
            refresh_ttl,
        )?;

        let rotated = self
            .sessions
            .rotate_refresh_token(
                &claims.sub,
                &claims.device,
                &claims.app,
                presented,
                &tokens.refresh_token,
                tokens.refresh_token_expires_at,
            )
            .await?;
        if !rotated {
            tracing::warn!(session_id = %session.id, "Refresh token replay detected");
            return Err(BrokerError::RefreshTokenReplay);
        }

        // Not atomic with the rotation above; a failure here leaves a session whose
        // refresh token is new and whose access token is stale, which the next refresh repairs.
        self.sessions
            .update_access_token(
                &claims.sub,
                &claims.device,
                &claims.app,
                &tokens.access_token,
                tokens.access_token_expires_at,
            )
            .await?;

        tracing::info!(session_id = %session.id, "Refresh token rotated");

        Ok(RotationOutcome {
            session_id: session.id,
            user_id: claims.sub,
            app_id: claims.app,
            device_id: claims.device,
            tokens,
        })
    }
}
