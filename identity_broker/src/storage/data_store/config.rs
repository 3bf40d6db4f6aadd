use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{env, str::FromStr, sync::Arc, sync::LazyLock};

use crate::config::DataStoreKind;
use crate::storage::errors::StorageError;

use super::types::{DataStore, PostgresDataStore, SqliteDataStore};

pub static DB_TABLE_PREFIX: LazyLock<String> =
    LazyLock::new(|| env::var("DB_TABLE_PREFIX").unwrap_or_else(|_| "ib_".to_string()));

/// Creates a lazily connecting pool for the configured backend.
///
/// In-memory SQLite databases live only as long as their connection, so those
/// pools are pinned to a single connection that is never recycled.
pub fn connect_data_store(
    kind: DataStoreKind,
    url: &str,
) -> Result<Arc<dyn DataStore>, StorageError> {
    tracing::info!(store_type = %kind, "Initializing data store");

    let store: Arc<dyn DataStore> = match kind {
        DataStoreKind::Sqlite => {
            let opts = SqliteConnectOptions::from_str(url)
                .map_err(|e| {
                    StorageError::Storage(format!("Failed to parse SQLite connection string: {e}"))
                })?
                .create_if_missing(true);

            let pool = if is_in_memory_sqlite(url) {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_lazy_with(opts)
            } else {
                sqlx::sqlite::SqlitePool::connect_lazy_with(opts)
            };

            Arc::new(SqliteDataStore::new(pool))
        }
        DataStoreKind::Postgres => {
            let pool = sqlx::PgPool::connect_lazy(url).map_err(|e| {
                tracing::error!("Failed to create Postgres pool: {}", e);
                StorageError::from(e)
            })?;
            Arc::new(PostgresDataStore::new(pool))
        }
    };

    tracing::info!(store_type = %kind, "Data store pool created");
    Ok(store)
}

fn is_in_memory_sqlite(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
