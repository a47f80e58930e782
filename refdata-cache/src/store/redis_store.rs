//! Redis-backed cache store shared by all worker processes.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::{debug, info};

use super::{CacheStore, GetOrSet};
use crate::errors::CacheError;

/// Cache store over a multiplexed Redis connection.
///
/// The connection is cheap to clone and safe to use from many tasks.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: MultiplexedConnection,
}

impl RedisCacheStore {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        info!(url = %url, "Connected to cache store");
        Ok(Self { connection })
    }
}

/// Redis expiry in milliseconds, at least one.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn get_or_set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<GetOrSet, CacheError> {
        let mut conn = self.connection.clone();

        // SET NX replies OK when it wrote the key and nil otherwise.
        let written: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;

        if written.is_some() {
            return Ok(GetOrSet::inserted(value));
        }

        let existing: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        match existing {
            Some(existing) => Ok(GetOrSet::existing(existing)),
            None => {
                // Expired or deleted between the two commands; the holder is
                // gone but this caller did not write, so it still lost.
                debug!(key = %key, "Key vanished after a failed SET NX");
                Ok(GetOrSet::existing(value))
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_keeps_sub_second_precision() {
        assert_eq!(ttl_millis(Duration::from_millis(1900)), 1900);
        assert_eq!(ttl_millis(Duration::from_secs(120)), 120_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
    }

    /// Needs a running server: `REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_get_or_set_against_server() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let store = RedisCacheStore::connect(&url).await.unwrap();
        store.delete("refdata_test_lock").await.unwrap();

        let first = store
            .get_or_set("refdata_test_lock", "a", Duration::from_secs(5))
            .await
            .unwrap();
        let second = store
            .get_or_set("refdata_test_lock", "b", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!first.was_present);
        assert_eq!(second, GetOrSet::existing("a"));
        store.delete("refdata_test_lock").await.unwrap();
    }
}
