use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

pub(super) struct MemoryEntry {
    pub(super) data: CacheData,
    pub(super) expires_at: Instant,
}

/// Process-local cache. Entries expire lazily on access.
pub struct InMemoryCacheStore {
    pub(super) entry: Mutex<HashMap<String, MemoryEntry>>,
}

pub struct RedisCacheStore {
    pub(super) client: redis::Client,
}

/// Expiring key-value store shared by every component that needs ephemeral state.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    async fn init(&self) -> Result<(), StorageError>;

    async fn put_with_ttl(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError>;

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;

    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StorageError>;

    /// Reads and deletes an entry in one step; concurrent callers see it at most once.
    async fn take(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;
}
