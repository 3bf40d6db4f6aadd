//! Application authentication
//!
//! Exactly one of three schemes must be present on a request: a PKCE challenge, a
//! per-app HMAC signature or an internal HMAC signature.

use http::HeaderMap;

use crate::errors::BrokerError;
use crate::userdb::AppStore;

use super::hmac::{
    InternalSignature, SignedRequest, create_internal_signature, verify_signature, within_drift,
};
use super::types::AppAuthContext;

pub const HEADER_APP_ID: &str = "x-app-id";
pub const HEADER_CODE_CHALLENGER: &str = "x-code-challenger";
pub const HEADER_SIGNATURE: &str = "x-signature";
pub const HEADER_TIMESTAMP: &str = "x-timestamp";
pub const HEADER_INTERNAL_SIGNATURE: &str = "x-internal-signature";
pub const HEADER_INTERNAL_TIMESTAMP: &str = "x-internal-timestamp";

/// The scheme a request claims, before any cryptographic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Pkce {
        app_id: String,
        code_challenge: String,
    },
    AppHmac {
        app_id: String,
        signature: String,
        timestamp: i64,
    },
    InternalHmac {
        signature: String,
        timestamp: i64,
    },
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Reads a millisecond timestamp header.
///
/// Besides plain integers, decimal and exponent forms are accepted when they name a
/// whole millisecond, so `1.7e12` reads as `1700000000000`.
fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|ms| ms.is_finite() && ms.fract() == 0.0 && ms.abs() < i64::MAX as f64)
            .map(|ms| ms as i64)
    })
}

/// Works out which scheme the headers carry. Pure; touches no store.
pub fn classify(headers: &HeaderMap) -> Result<AuthScheme, BrokerError> {
    let app_id = header(headers, HEADER_APP_ID);
    let code_challenger = header(headers, HEADER_CODE_CHALLENGER);
    let signature = header(headers, HEADER_SIGNATURE);
    let timestamp = header(headers, HEADER_TIMESTAMP);
    let internal_signature = header(headers, HEADER_INTERNAL_SIGNATURE);
    let internal_timestamp = header(headers, HEADER_INTERNAL_TIMESTAMP);

    let using_pkce = code_challenger.is_some();
    let using_app_hmac = signature.is_some() || timestamp.is_some();
    let using_internal = internal_signature.is_some() || internal_timestamp.is_some();

    match [using_pkce, using_app_hmac, using_internal]
        .iter()
        .filter(|on| **on)
        .count()
    {
        0 => return Err(BrokerError::NoAuthenticationMethod),
        1 => {}
        _ => return Err(BrokerError::MultipleAuthMethods),
    }

    if using_internal && app_id.is_some() {
        return Err(BrokerError::auth("Invalid internal authentication headers"));
    }

    if let Some(code_challenge) = code_challenger {
        let app_id = app_id.ok_or_else(|| BrokerError::auth("Missing x-app-id"))?;
        return Ok(AuthScheme::Pkce {
            app_id: app_id.to_string(),
            code_challenge: code_challenge.to_string(),
        });
    }

    if using_app_hmac {
        let app_id = app_id.ok_or_else(|| BrokerError::auth("Missing x-app-id"))?;
        let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
            return Err(BrokerError::auth("Missing HMAC headers"));
        };
        let timestamp =
            parse_timestamp(timestamp).ok_or_else(|| BrokerError::auth("Invalid timestamp"))?;
        return Ok(AuthScheme::AppHmac {
            app_id: app_id.to_string(),
            signature: signature.to_string(),
            timestamp,
        });
    }

    let (Some(signature), Some(timestamp)) = (internal_signature, internal_timestamp) else {
        return Err(BrokerError::auth("Missing internal HMAC headers"));
    };
    let timestamp = parse_timestamp(timestamp)
        .ok_or_else(|| BrokerError::auth("Invalid internal timestamp"))?;

    Ok(AuthScheme::InternalHmac {
        signature: signature.to_string(),
        timestamp,
    })
}

#[derive(Clone)]
pub struct AppAuthenticator {
    apps: AppStore,
    internal_secret: String,
    max_drift_ms: i64,
}

impl AppAuthenticator {
    pub fn new(apps: AppStore, internal_secret: String, max_drift_ms: i64) -> Self {
        Self {
            apps,
            internal_secret,
            max_drift_ms,
        }
    }

    /// Classifies and verifies the request.
    #[tracing::instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        request: &SignedRequest<'_>,
    ) -> Result<AppAuthContext, BrokerError> {
        match classify(headers)? {
            AuthScheme::Pkce {
                app_id,
                code_challenge,
            } => {
                tracing::debug!(app_id, "PKCE challenge attached");
                Ok(AppAuthContext::Pkce {
                    app_id,
                    code_challenge,
                })
            }
            AuthScheme::AppHmac {
                app_id,
                signature,
                timestamp,
            } => {
                self.verify_app(&app_id, &signature, timestamp, request)
                    .await?;
                Ok(AppAuthContext::App { app_id })
            }
            AuthScheme::InternalHmac {
                signature,
                timestamp,
            } => {
                self.verify_internal(&signature, timestamp, request)?;
                Ok(AppAuthContext::Internal)
            }
        }
    }

    async fn verify_app(
        &self,
        app_id: &str,
        signature: &str,
        timestamp: i64,
        request: &SignedRequest<'_>,
    ) -> Result<(), BrokerError> {
        let app = self
            .apps
            .find_by_id(app_id)
            .await?
            .ok_or_else(|| BrokerError::AppNotFound {
                app: app_id.to_string(),
            })?;

        let Some(key) = app.hashed_secret.as_deref() else {
            return Err(BrokerError::IncorrectAppSecret(
                "App secret not set".to_string(),
            ));
        };

        if !within_drift(timestamp, self.max_drift_ms) {
            return Err(BrokerError::unauthorized("Request timestamp expired"));
        }

        if !verify_signature(key.as_bytes(), request, timestamp, signature)? {
            tracing::warn!(app_id, "App HMAC signature mismatch");
            return Err(BrokerError::IncorrectAppSecret(
                "Invalid HMAC signature".to_string(),
            ));
        }

        tracing::debug!(app_id, "App HMAC verified");
        Ok(())
    }

    fn verify_internal(
        &self,
        signature: &str,
        timestamp: i64,
        request: &SignedRequest<'_>,
    ) -> Result<(), BrokerError> {
        if !within_drift(timestamp, self.max_drift_ms) {
            return Err(BrokerError::unauthorized("Internal request expired"));
        }

        if !verify_signature(self.internal_secret.as_bytes(), request, timestamp, signature)? {
            tracing::warn!("Internal HMAC signature mismatch");
            return Err(BrokerError::unauthorized("Invalid internal signature"));
        }

        Ok(())
    }

    /// Signs an outbound call to another internal service.
    pub fn create_internal_signature(
        &self,
        method: &str,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<InternalSignature, BrokerError> {
        create_internal_signature(&self.internal_secret, method, url, body)
    }
}
