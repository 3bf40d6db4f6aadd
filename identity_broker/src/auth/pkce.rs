//! Escrow of login responses behind a PKCE challenge
//!
//! The response is parked under a random key and handed out once, to whoever presents
//! a verifier that hashes to the stored challenge.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::errors::BrokerError;
use crate::storage::{CacheData, CacheStore};
use crate::utils::{gen_random_string, pkce_s256};

const CACHE_PREFIX: &str = "pkce";

#[derive(Debug, Serialize, Deserialize)]
struct EscrowEntry {
    code_challenge: String,
    response: Value,
}

/// What the caller gets instead of the escrowed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscrowReceipt {
    pub secret_key: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PkceVerifyRequest {
    pub secret_key: String,
    pub code_verifier: String,
}

#[derive(Clone)]
pub struct ChallengeEscrow {
    cache: Arc<dyn CacheStore>,
    ttl: usize,
}

impl ChallengeEscrow {
    pub fn new(cache: Arc<dyn CacheStore>, ttl: usize) -> Self {
        Self { cache, ttl }
    }

    /// Stores `response` behind `code_challenge` and returns the retrieval key.
    #[tracing::instrument(skip_all)]
    pub async fn save(&self, code_challenge: &str, response: Value) -> Result<String, BrokerError> {
        let key = gen_random_string(32)?;
        let entry = EscrowEntry {
            code_challenge: code_challenge.to_string(),
            response,
        };
        let value = serde_json::to_string(&entry)
            .map_err(|e| BrokerError::Crypto(format!("Failed to encode escrow entry: {e}")))?;

        self.cache
            .put_with_ttl(CACHE_PREFIX, &key, CacheData::from(value), self.ttl)
            .await?;

        tracing::debug!(ttl = self.ttl, "Response escrowed");
        Ok(key)
    }

    /// Saves the response and builds the receipt returned to the caller.
    pub async fn escrow(
        &self,
        code_challenge: &str,
        response: Value,
    ) -> Result<EscrowReceipt, BrokerError> {
        Ok(EscrowReceipt {
            secret_key: self.save(code_challenge, response).await?,
            message: "Waiting for verification".to_string(),
        })
    }

    /// Redeems an escrowed response. The entry is consumed whether or not the verifier matches.
    #[tracing::instrument(skip_all)]
    pub async fn verify(&self, secret_key: &str, code_verifier: &str) -> Result<Value, BrokerError> {
        let data = self
            .cache
            .take(CACHE_PREFIX, secret_key)
            .await?
            .ok_or_else(|| BrokerError::auth("Code challenge not found"))?;

        let entry: EscrowEntry = serde_json::from_str(&data.value)
            .map_err(|_| BrokerError::auth("Stored code challenge is invalid"))?;

        let computed = pkce_s256(code_verifier);
        let matches = computed.len() == entry.code_challenge.len()
            && bool::from(computed.as_bytes().ct_eq(entry.code_challenge.as_bytes()));
        if !matches {
            tracing::warn!("Code verifier does not match challenge");
            return Err(BrokerError::auth("Invalid code verifier"));
        }

        let mut response = entry.response;
        if let Value::Object(map) = &mut response {
            map.remove("code_challenge");
        }

        Ok(response)
    }
}
