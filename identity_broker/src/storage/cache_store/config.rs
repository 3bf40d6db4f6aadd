use std::sync::Arc;

use crate::config::CacheStoreKind;
use crate::storage::errors::StorageError;

use super::types::{CacheStore, InMemoryCacheStore, RedisCacheStore};

/// Builds the cache handle described by `kind` and verifies it can be reached.
pub async fn connect_cache_store(
    kind: CacheStoreKind,
    url: &str,
) -> Result<Arc<dyn CacheStore>, StorageError> {
    tracing::info!(store_type = %kind, "Initializing cache store");

    let store: Arc<dyn CacheStore> = match kind {
        CacheStoreKind::Memory => Arc::new(InMemoryCacheStore::new()),
        CacheStoreKind::Redis => {
            let client = redis::Client::open(url).map_err(|e| {
                tracing::error!("Failed to create Redis client: {}", e);
                StorageError::from(e)
            })?;
            Arc::new(RedisCacheStore::new(client))
        }
    };

    if let Err(e) = store.init().await {
        tracing::error!(store_type = %kind, "Failed to connect to cache store: {}", e);
        return Err(e);
    }

    tracing::info!(store_type = %kind, "Connected to cache store");
    Ok(store)
}
