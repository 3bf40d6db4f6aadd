//! The injected handle every flow and HTTP layer works through
//!
//! `Broker::connect` builds the store handles once; each component keeps a clone of
//! the `Arc` it needs. Nothing in the crate reaches for a global.

use std::sync::Arc;

use crate::auth::{
    AppAuthenticator, ChallengeEscrow, CredentialVerifier, IdentityGuard, RequestAuthenticator,
    RotationEngine,
};
use crate::config::BrokerConfig;
use crate::errors::BrokerError;
use crate::session::SessionStore;
use crate::storage::{CacheStore, DataStore, connect_cache_store, connect_data_store};
use crate::token::{TokenCodec, TokenIssuer};
use crate::userdb::{AppStore, DeviceStore, UserStore, create_directory_tables};

pub struct Broker {
    config: BrokerConfig,
    data_store: Arc<dyn DataStore>,
    cache_store: Arc<dyn CacheStore>,
    users: UserStore,
    apps: AppStore,
    devices: DeviceStore,
    sessions: SessionStore,
    credentials: CredentialVerifier,
    issuer: TokenIssuer,
    rotation: RotationEngine,
    authenticator: RequestAuthenticator,
    app_authenticator: AppAuthenticator,
    escrow: ChallengeEscrow,
    guard: IdentityGuard,
}

impl Broker {
    /// Opens the configured stores and wires every component to them.
    pub async fn connect(config: BrokerConfig) -> Result<Self, BrokerError> {
        tracing::info!(?config, "Connecting identity broker");
        let data_store = connect_data_store(config.data_store_type, &config.data_store_url)?;
        let cache_store =
            connect_cache_store(config.cache_store_type, &config.cache_store_url).await?;
        Ok(Self::from_stores(config, data_store, cache_store))
    }

    /// Wires the components over already opened stores.
    pub fn from_stores(
        config: BrokerConfig,
        data_store: Arc<dyn DataStore>,
        cache_store: Arc<dyn CacheStore>,
    ) -> Self {
        let users = UserStore::new(data_store.clone());
        let apps = AppStore::new(data_store.clone());
        let devices = DeviceStore::new(data_store.clone());
        let sessions = SessionStore::new(data_store.clone());

        let codec = Arc::new(TokenCodec::new(
            &config.access_token_secret,
            &config.refresh_token_secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
        ));
        let issuer = TokenIssuer::new(codec.clone(), sessions.clone());

        Self {
            credentials: CredentialVerifier::new(data_store.clone()),
            rotation: RotationEngine::new(issuer.clone(), sessions.clone()),
            authenticator: RequestAuthenticator::new(codec, sessions.clone()),
            app_authenticator: AppAuthenticator::new(
                apps.clone(),
                config.internal_secret.clone(),
                config.hmac_max_drift_ms,
            ),
            escrow: ChallengeEscrow::new(cache_store.clone(), config.pkce_escrow_ttl),
            guard: IdentityGuard::new(users.clone()),
            issuer,
            users,
            apps,
            devices,
            sessions,
            config,
            data_store,
            cache_store,
        }
    }

    /// Creates every table. Safe to call on each start.
    pub async fn init(&self) -> Result<(), BrokerError> {
        create_directory_tables(self.data_store.as_ref()).await?;
        self.sessions.init().await?;
        tracing::info!("Identity broker tables ready");
        Ok(())
    }

    /// Closes the relational pool. The cache needs no shutdown.
    pub async fn close(&self) {
        if let Some(pool) = self.data_store.as_sqlite() {
            pool.close().await;
        } else if let Some(pool) = self.data_store.as_postgres() {
            pool.close().await;
        }
        tracing::info!("Identity broker closed");
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn cache_store(&self) -> &Arc<dyn CacheStore> {
        &self.cache_store
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    pub fn apps(&self) -> &AppStore {
        &self.apps
    }

    pub fn devices(&self) -> &DeviceStore {
        &self.devices
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn credentials(&self) -> &CredentialVerifier {
        &self.credentials
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn rotation(&self) -> &RotationEngine {
        &self.rotation
    }

    pub fn authenticator(&self) -> &RequestAuthenticator {
        &self.authenticator
    }

    pub fn app_authenticator(&self) -> &AppAuthenticator {
        &self.app_authenticator
    }

    pub fn escrow(&self) -> &ChallengeEscrow {
        &self.escrow
    }

    pub fn guard(&self) -> &IdentityGuard {
        &self.guard
    }
}
