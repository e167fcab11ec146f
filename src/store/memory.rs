//! In-process store adapter.
//!
//! Backs the limiter with a concurrent map. Suitable for tests and for
//! single-instance deployments; multi-instance deployments need an
//! adapter over a networked store implementing the same trait.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{KeyValueStore, StoreError};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// An in-memory [`KeyValueStore`] with per-entry expiry.
///
/// Atomicity of `compare_and_swap` comes from the map's per-shard entry
/// lock, which is held across the compare and the write.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries. Primarily useful for tests.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.value().is_expired()).count()
    }

    /// Whether the store holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Drop expired entries lazily on read.
        self.entries.remove_if(key, |_, v| v.is_expired());
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                let live = !current.is_expired();
                let matches = match (live, expected) {
                    (true, Some(expected)) => current.value == expected,
                    (true, None) => false,
                    // Expired entries count as absent.
                    (false, None) => true,
                    (false, Some(_)) => false,
                };
                if matches {
                    occupied.insert(StoredValue::new(value, ttl));
                }
                Ok(matches)
            }
            Entry::Vacant(vacant) => {
                if expected.is_none() {
                    vacant.insert(StoredValue::new(value, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let store = MemoryStore::new();
        store
            .set("k", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cas_creates_when_absent() {
        let store = MemoryStore::new();
        assert!(store.compare_and_swap("k", None, "v1", None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn test_cas_rejects_create_over_existing() {
        let store = MemoryStore::new();
        store.set("k", "v1", None).await.unwrap();
        assert!(!store.compare_and_swap("k", None, "v2", None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn test_cas_swaps_on_match() {
        let store = MemoryStore::new();
        store.set("k", "v1", None).await.unwrap();
        assert!(store
            .compare_and_swap("k", Some("v1"), "v2", None)
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_cas_rejects_on_mismatch() {
        let store = MemoryStore::new();
        store.set("k", "v1", None).await.unwrap();
        assert!(!store
            .compare_and_swap("k", Some("stale"), "v2", None)
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn test_cas_treats_expired_as_absent() {
        let store = MemoryStore::new();
        store
            .set("k", "old", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Create-if-absent succeeds over the expired entry.
        assert!(store.compare_and_swap("k", None, "new", None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("new".to_string()));
    }
}
