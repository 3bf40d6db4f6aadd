use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CacheStore, InMemoryCacheStore, MemoryEntry};

const CACHE_PREFIX: &str = "cache";

impl InMemoryCacheStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory generic cache store");
        Self {
            entry: Mutex::new(HashMap::new()),
        }
    }

    fn make_key(prefix: &str, key: &str) -> String {
        format!("{CACHE_PREFIX}:{prefix}:{key}")
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(()) // Nothing to initialize for in-memory store
    }

    async fn put_with_ttl(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError> {
        let key = Self::make_key(prefix, key);
        let expires_at = Instant::now() + Duration::from_secs(ttl as u64);
        self.entry.lock().await.insert(
            key,
            MemoryEntry {
                data: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let key = Self::make_key(prefix, key);
        let mut entries = self.entry.lock().await;

        match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.data.clone())),
            Some(_) => {
                entries.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StorageError> {
        let key = Self::make_key(prefix, key);
        self.entry.lock().await.remove(&key);
        Ok(())
    }

    async fn take(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let key = Self::make_key(prefix, key);
        let removed = self.entry.lock().await.remove(&key);

        Ok(removed
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn data(value: &str) -> CacheData {
        CacheData {
            value: value.to_string(),
        }
    }

    #[test]
    fn test_make_key() {
        // Given a prefix and key
        let result = InMemoryCacheStore::make_key("pkce", "abc");

        // Then it should be namespaced under the cache prefix
        assert_eq!(result, "cache:pkce:abc");
    }

    #[tokio::test]
    async fn test_put_and_get() {
        // Given an in-memory cache store with a stored value
        let store = InMemoryCacheStore::new();
        store
            .put_with_ttl("test", "key1", data("test value"), 60)
            .await
            .unwrap();

        // When getting the value
        let retrieved = store.get("test", "key1").await.unwrap();

        // Then it should return the stored value
        assert_eq!(retrieved, Some(data("test value")));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        // Given a value stored with a one second TTL
        let store = InMemoryCacheStore::new();
        store
            .put_with_ttl("test", "short", data("short lived"), 1)
            .await
            .unwrap();
        assert!(store.get("test", "short").await.unwrap().is_some());

        // When the TTL has elapsed
        tokio::time::sleep(Duration::from_millis(1100)).await;

        // Then the value is gone for both get and take
        assert!(store.get("test", "short").await.unwrap().is_none());
        assert!(store.take("test", "short").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = InMemoryCacheStore::new();
        store
            .put_with_ttl("test", "key3", data("value to remove"), 60)
            .await
            .unwrap();

        store.remove("test", "key3").await.unwrap();

        assert!(store.get("test", "key3").await.unwrap().is_none());
        // Removing again is not an error
        assert!(store.remove("test", "key3").await.is_ok());
    }

    #[tokio::test]
    async fn test_take_returns_value_once() {
        // Given a stored value
        let store = InMemoryCacheStore::new();
        store
            .put_with_ttl("test", "once", data("single use"), 60)
            .await
            .unwrap();

        // When taking it twice
        let first = store.take("test", "once").await.unwrap();
        let second = store.take("test", "once").await.unwrap();

        // Then only the first take sees it
        assert_eq!(first, Some(data("single use")));
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn test_concurrent_take_single_winner() {
        // Given one stored value and many concurrent takers
        let store = Arc::new(InMemoryCacheStore::new());
        store
            .put_with_ttl("race", "key", data("prize"), 60)
            .await
            .unwrap();

        let mut handles = vec![];
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(
                async move { store.take("race", "key").await.unwrap() },
            ));
        }

        // Then exactly one of them receives the value
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_prefix_isolation() {
        let store = InMemoryCacheStore::new();
        store
            .put_with_ttl("prefix1", "same_key", data("one"), 60)
            .await
            .unwrap();
        store
            .put_with_ttl("prefix2", "same_key", data("two"), 60)
            .await
            .unwrap();

        assert_eq!(
            store.get("prefix1", "same_key").await.unwrap(),
            Some(data("one"))
        );
        assert_eq!(
            store.get("prefix2", "same_key").await.unwrap(),
            Some(data("two"))
        );
    }
}
