//! HS256 signing and verification for access and refresh tokens

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::errors::TokenError;
use super::types::{TokenClaims, TokenType};

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Holds one key per token type so an access token never verifies as a refresh token
/// and vice versa.
pub struct TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
    pub(crate) access_ttl: i64,
    pub(crate) refresh_ttl: i64,
}

impl TokenCodec {
    pub fn new(access_secret: &str, refresh_secret: &str, access_ttl: i64, refresh_ttl: i64) -> Self {
        Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
            access_ttl,
            refresh_ttl,
        }
    }

    fn keys(&self, token_type: TokenType) -> &KeyPair {
        match token_type {
            TokenType::Access => &self.access,
            TokenType::Refresh => &self.refresh,
        }
    }

    /// Signs a token that expires `ttl_secs` from now. A lifetime that overflows the
    /// calendar is refused rather than wrapped.
    pub fn sign(
        &self,
        token_type: TokenType,
        user_id: &str,
        app_id: &str,
        device_id: &str,
        ttl_secs: i64,
    ) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = Duration::try_seconds(ttl_secs)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(TokenError::Lifetime(ttl_secs))?;

        let claims = TokenClaims {
            sub: user_id.to_string(),
            app: app_id.to_string(),
            device: device_id.to_string(),
            token_type,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.keys(token_type).encoding,
        )
        .map_err(|e| TokenError::Encoding(e.to_string()))?;

        // Report the second-truncated expiry that is actually in the token
        let expires_at = DateTime::from_timestamp(claims.exp, 0).unwrap_or(expires_at);

        Ok((token, expires_at))
    }

    /// Verifies signature, expiry (no leeway) and the `type` claim.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<TokenClaims>(
            token,
            &self.keys(expected).decoding,
            &validation,
        )?;

        if data.claims.token_type != expected {
            tracing::warn!(
                expected = %expected,
                actual = %data.claims.token_type,
                "Token type mismatch"
            );
            return Err(TokenError::Invalid("Invalid token type".to_string()));
        }

        Ok(data.claims)
    }
}
