use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::errors::BrokerError;
use crate::session::SessionStore;
use crate::token::{TokenCodec, TokenType};

use super::types::Identity;

/// Turns a bearer access token into an [`Identity`].
#[derive(Clone)]
pub struct RequestAuthenticator {
    codec: Arc<TokenCodec>,
    sessions: SessionStore,
}

impl RequestAuthenticator {
    pub fn new(codec: Arc<TokenCodec>, sessions: SessionStore) -> Self {
        Self { codec, sessions }
    }

    /// Fails with `AccessTokenExpired` when the token is only stale, so callers can
    /// fall back to a refresh.
    #[tracing::instrument(skip_all)]
    pub async fn authenticate(&self, access_token: &str) -> Result<Identity, BrokerError> {
        let claims = self.codec.verify(access_token, TokenType::Access)?;

        let session = self
            .sessions
            .find_by_user_device_app(&claims.sub, &claims.device, &claims.app)
            .await?
            .ok_or(BrokerError::SessionNotFound)?;

        // A token superseded by a later login or refresh no longer authenticates
        if !bool::from(
            session
                .access_token
                .as_bytes()
                .ct_eq(access_token.as_bytes()),
        ) {
            tracing::debug!(session_id = %session.id, "Presented access token is not current");
            return Err(BrokerError::SessionNotFound);
        }

        Ok(Identity {
            user_id: claims.sub,
            app_id: claims.app,
            device_id: claims.device,
            session_id: session.id,
            refreshed: false,
        })
    }
}
