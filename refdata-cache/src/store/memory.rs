//! In-process cache store.
//!
//! Shares state between tasks of one process only. Expiry follows the tokio
//! clock so paused-time tests can step over TTLs.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{CacheStore, GetOrSet};
use crate::errors::CacheError;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_or_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<GetOrSet, CacheError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if let Some(entry) = entries.get(key) {
            if entry.is_live(now) {
                return Ok(GetOrSet::existing(entry.value.clone()));
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(GetOrSet::inserted(value))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryCacheStore::new();

        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_or_set_keeps_existing() {
        let store = MemoryCacheStore::new();

        let first = store
            .get_or_set("lock", "a", Duration::from_secs(10))
            .await
            .unwrap();
        let second = store
            .get_or_set("lock", "b", Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(first, GetOrSet::inserted("a"));
        assert_eq!(second, GetOrSet::existing("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_expire() {
        let store = MemoryCacheStore::new();
        store
            .get_or_set("lock", "a", Duration::from_secs(120))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(119)).await;
        assert!(store.get("lock").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("lock").await.unwrap().is_none());

        let again = store
            .get_or_set("lock", "b", Duration::from_secs(120))
            .await
            .unwrap();
        assert!(!again.was_present);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_set_has_one_winner() {
        let store = Arc::new(MemoryCacheStore::new());

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .get_or_set("lock", &i.to_string(), Duration::from_secs(60))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if !handle.await.unwrap().was_present {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
