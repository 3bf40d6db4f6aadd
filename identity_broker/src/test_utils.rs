//! Shared fixtures for unit tests
//!
//! Every helper builds a fresh in-memory SQLite database, so tests never see each
//! other's rows and need no cleanup.

use std::sync::Arc;

use crate::broker::Broker;
use crate::config::BrokerConfig;
use crate::session::SessionStore;
use crate::storage::{DataStore, InMemoryCacheStore, connect_data_store};
use crate::userdb::{App, User, create_directory_tables, hash_password};

pub(crate) const TEST_PASSWORD: &str = "correct-horse-battery";
pub(crate) const TEST_APP_SECRET: &str = "app-raw-secret";

pub(crate) fn test_config() -> BrokerConfig {
    BrokerConfig::from_lookup(|name| {
        match name {
            "ACCESS_TOKEN_SECRET" => Some("test-access-secret"),
            "REFRESH_TOKEN_SECRET" => Some("test-refresh-secret"),
            "INTERNAL_SECRET" => Some("test-internal-secret"),
            _ => None,
        }
        .map(str::to_string)
    })
    .expect("test config")
}

/// A fresh in-memory database with every table created.
pub(crate) async fn memory_data_store() -> Arc<dyn DataStore> {
    let store = connect_data_store(crate::config::DataStoreKind::Sqlite, "sqlite::memory:")
        .expect("in-memory sqlite");
    create_directory_tables(store.as_ref())
        .await
        .expect("directory tables");
    SessionStore::new(store.clone())
        .init()
        .await
        .expect("session tables");
    store
}

pub(crate) async fn test_broker() -> Broker {
    let broker = Broker::from_stores(
        test_config(),
        memory_data_store().await,
        Arc::new(InMemoryCacheStore::new()),
    );
    broker.init().await.expect("broker init");
    broker
}

/// Registers an app named `name` with [`TEST_APP_SECRET`].
pub(crate) async fn create_app(broker: &Broker, name: &str) -> App {
    broker
        .apps()
        .create_app(App::new(
            name.to_string(),
            name.to_uppercase(),
            Some(TEST_APP_SECRET),
        ))
        .await
        .expect("create app")
        .into_inner()
}

/// Creates a user whose password is [`TEST_PASSWORD`].
pub(crate) async fn create_user(broker: &Broker, email: &str) -> User {
    let hash = hash_password(TEST_PASSWORD).expect("hash");
    broker
        .users()
        .create_user(User::new(email.to_string(), None, Some(hash)))
        .await
        .expect("create user")
        .into_inner()
}
