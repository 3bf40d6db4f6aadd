//! Central configuration for the identity_broker crate
//!
//! Everything is read from environment variables once, at process start, and the
//! resulting [`BrokerConfig`] is handed to [`crate::Broker::connect`].

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_ACCESS_TOKEN_TTL: i64 = 900;
pub const DEFAULT_REFRESH_TOKEN_TTL: i64 = 604_800;
pub const DEFAULT_PKCE_ESCROW_TTL: usize = 300;
pub const DEFAULT_HMAC_MAX_DRIFT_MS: i64 = 60_000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStoreKind {
    Sqlite,
    Postgres,
}

impl FromStr for DataStoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" => Ok(Self::Postgres),
            other => Err(ConfigError::Invalid {
                name: "GENERIC_DATA_STORE_TYPE",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for DataStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStoreKind {
    Memory,
    Redis,
}

impl FromStr for CacheStoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(ConfigError::Invalid {
                name: "GENERIC_CACHE_STORE_TYPE",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CacheStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

/// Process-wide settings for the broker.
#[derive(Clone)]
pub struct BrokerConfig {
    pub data_store_type: DataStoreKind,
    pub data_store_url: String,
    pub cache_store_type: CacheStoreKind,
    pub cache_store_url: String,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub internal_secret: String,
    /// Seconds
    pub access_token_ttl: i64,
    /// Seconds
    pub refresh_token_ttl: i64,
    /// Seconds
    pub pkce_escrow_ttl: usize,
    pub hmac_max_drift_ms: i64,
}

impl BrokerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let config = Self {
            data_store_type: lookup("GENERIC_DATA_STORE_TYPE")
                .unwrap_or_else(|| "sqlite".to_string())
                .parse()?,
            data_store_url: lookup("GENERIC_DATA_STORE_URL")
                .unwrap_or_else(|| "sqlite::memory:".to_string()),
            cache_store_type: lookup("GENERIC_CACHE_STORE_TYPE")
                .unwrap_or_else(|| "memory".to_string())
                .parse()?,
            cache_store_url: lookup("GENERIC_CACHE_STORE_URL")
                .unwrap_or_else(|| "redis://localhost:6379".to_string()),
            access_token_secret: required("ACCESS_TOKEN_SECRET")?,
            refresh_token_secret: required("REFRESH_TOKEN_SECRET")?,
            internal_secret: required("INTERNAL_SECRET")?,
            access_token_ttl: parse_or("ACCESS_TOKEN_TTL", &lookup, DEFAULT_ACCESS_TOKEN_TTL)?,
            refresh_token_ttl: parse_or(
                "REFRESH_TOKEN_TTL",
                &lookup,
                DEFAULT_REFRESH_TOKEN_TTL,
            )?,
            pkce_escrow_ttl: parse_or("PKCE_ESCROW_TTL", &lookup, DEFAULT_PKCE_ESCROW_TTL)?,
            hmac_max_drift_ms: parse_or(
                "HMAC_MAX_DRIFT_MS",
                &lookup,
                DEFAULT_HMAC_MAX_DRIFT_MS,
            )?,
        };

        if config.access_token_secret == config.refresh_token_secret {
            return Err(ConfigError::Invalid {
                name: "REFRESH_TOKEN_SECRET",
                value: "must differ from ACCESS_TOKEN_SECRET".to_string(),
            });
        }

        Ok(config)
    }
}

fn parse_or<T, F>(name: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.clone(),
        }),
        None => Ok(default),
    }
}

// Secrets stay out of logs.
impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("data_store_type", &self.data_store_type)
            .field("data_store_url", &self.data_store_url)
            .field("cache_store_type", &self.cache_store_type)
            .field("cache_store_url", &self.cache_store_url)
            .field("access_token_secret", &"<redacted>")
            .field("refresh_token_secret", &"<redacted>")
            .field("internal_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("pkce_escrow_ttl", &self.pkce_escrow_ttl)
            .field("hmac_max_drift_ms", &self.hmac_max_drift_ms)
            .finish()
    }
}
