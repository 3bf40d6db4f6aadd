//! Request signing shared by per-app and internal HMAC authentication
//!
//! The signed string is `METHOD|URL|TIMESTAMP_MS|BODY` where URL is the original
//! request path with its query and BODY is the compact JSON body, or empty.
//!
//! Only a non-empty JSON object or array contributes a BODY. Anything else, including
//! a body that does not parse as JSON, signs as the empty string.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::BrokerError;

type HmacSha256 = Hmac<Sha256>;

/// The parts of an HTTP request covered by a signature.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub body: &'a [u8],
}

/// Headers to attach to an outbound internal call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InternalSignature {
    pub timestamp: String,
    pub signature: String,
}

/// Normalises a raw body for signing.
///
/// JSON objects and arrays are re-serialised compactly with their key order kept.
/// An empty body, `{}`, `[]`, a bare JSON scalar and a non-JSON body all sign as the
/// empty string.
pub fn canonical_body(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .map(|value| canonical_json(&value))
        .unwrap_or_default()
}

fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) if !map.is_empty() => value.to_string(),
        Value::Array(items) if !items.is_empty() => value.to_string(),
        _ => String::new(),
    }
}

pub fn signing_string(method: &str, url: &str, timestamp: i64, body: &str) -> String {
    format!("{}|{}|{}|{}", method.to_uppercase(), url, timestamp, body)
}

/// Lower-case hex HMAC-SHA256 of `message`.
pub fn sign(key: &[u8], message: &str) -> Result<String, BrokerError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BrokerError::Crypto(format!("Invalid HMAC key: {e}")))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Recomputes the signature of `request` and compares it in constant time.
pub fn verify_signature(
    key: &[u8],
    request: &SignedRequest<'_>,
    timestamp: i64,
    signature: &str,
) -> Result<bool, BrokerError> {
    let message = signing_string(
        request.method,
        request.url,
        timestamp,
        &canonical_body(request.body),
    );
    let expected = sign(key, &message)?;

    Ok(expected.len() == signature.len()
        && bool::from(expected.as_bytes().ct_eq(signature.as_bytes())))
}

/// Whether `timestamp_ms` lies within `max_drift_ms` of now, in either direction.
pub fn within_drift(timestamp_ms: i64, max_drift_ms: i64) -> bool {
    let now = Utc::now().timestamp_millis();
    now.abs_diff(timestamp_ms) <= max_drift_ms.unsigned_abs()
}

/// Signs an outbound call with the internal secret.
pub fn create_internal_signature(
    secret: &str,
    method: &str,
    url: &str,
    body: Option<&Value>,
) -> Result<InternalSignature, BrokerError> {
    let timestamp = Utc::now().timestamp_millis();
    let body = body.map(canonical_json).unwrap_or_default();
    let signature = sign(
        secret.as_bytes(),
        &signing_string(method, url, timestamp, &body),
    )?;

    Ok(InternalSignature {
        timestamp: timestamp.to_string(),
        signature,
    })
}
