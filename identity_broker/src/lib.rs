//! identity_broker - multi-tenant identity and session broker
//!
//! Authenticates users against stored credentials, issues and rotates token pairs
//! scoped to a `(user, app, device)` triple, and authenticates inbound requests by
//! exactly one of three schemes: PKCE challenge, per-app HMAC or internal HMAC.
//!
//! Everything hangs off a [`Broker`] built once from a [`BrokerConfig`]:
//!
//! ```rust,no_run
//! use identity_broker::{Broker, BrokerConfig};
//!
//! # async fn run() -> Result<(), identity_broker::BrokerError> {
//! let broker = Broker::connect(BrokerConfig::from_env()?).await?;
//! broker.init().await?;
//! # Ok(())
//! # }
//! ```

mod auth;
mod broker;
mod config;
mod coordination;
mod errors;
mod session;
mod storage;
mod token;
mod userdb;
mod utils;

#[cfg(test)]
mod test_utils;

pub use broker::Broker;
pub use config::{BrokerConfig, CacheStoreKind, ConfigError, DataStoreKind};
pub use errors::BrokerError;

pub use auth::{
    AppAuthContext, AppAuthenticator, AuthScheme, ChallengeEscrow, CredentialVerifier,
    DeviceIdentity, EscrowReceipt, GuardOptions, HEADER_APP_ID, HEADER_CODE_CHALLENGER,
    HEADER_INTERNAL_SIGNATURE, HEADER_INTERNAL_TIMESTAMP, HEADER_SIGNATURE, HEADER_TIMESTAMP,
    Identity, IdentityGuard, InternalSignature, PkceVerifyRequest, RefreshRequest,
    RequestAuthenticator, RequestSources, RequestedIds, RotationEngine, RotationOutcome,
    SignedRequest, canonical_body, classify, create_internal_signature, parse_device_identifier,
    sign, signing_string, verify_signature, within_drift,
};

pub use coordination::{
    ChangePasswordRequest, LoginOutcome, LoginRequest, RegisterRequest, SessionResponse,
    change_password_core, create_session_core, delete_session_core, delete_sessions_core,
    device_session_core, get_session_core, list_sessions_core, login_core, refresh_core,
    register_core, verify_pkce_core,
};

pub use session::{
    CLIENT_TYPES, DEFAULT_CLIENT_TYPE, NewSession, SessionFilter, SessionRecord, SessionStore,
};

pub use storage::{
    CacheData, CacheStore, DataStore, InMemoryCacheStore, PostgresDataStore, RedisCacheStore,
    SqliteDataStore, StorageError, connect_cache_store, connect_data_store,
};

pub use token::{
    IssueRequest, IssuedSession, MAX_TOKEN_TTL_SECS, TokenClaims, TokenCodec, TokenError,
    TokenIssuer, TokenPair, TokenType, validate_ttl,
};

pub use userdb::{
    App, AppSearchField, AppStore, CreateOutcome, Device, DeviceStore, User, UserApp,
    UserSearchField, UserStore, hash_app_secret,
};

pub use utils::{UtilError, gen_random_string, pkce_s256, sha256_hex};
