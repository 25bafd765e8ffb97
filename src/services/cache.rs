//! Redis caching service for read-heavy lookups.
//!
//! Provides a type-safe caching layer with:
//! - Automatic serialization/deserialization via serde
//! - Configurable TTL
//! - Key and pattern invalidation
//!
//! When no Redis URL is configured the cache is disabled: reads miss and
//! writes are dropped, so callers never need to branch on it.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Redis cache client with connection pooling.
#[derive(Clone)]
pub struct RedisCache {
    conn: Option<ConnectionManager>,
    default_ttl: Duration,
}

impl RedisCache {
    /// Connect to Redis, or build a disabled cache when `redis_url` is `None`.
    pub async fn new(redis_url: Option<&str>, default_ttl_seconds: u64) -> Result<Self> {
        let default_ttl = Duration::from_secs(default_ttl_seconds);
        let Some(redis_url) = redis_url else {
            tracing::info!("REDIS_URL not set, caching disabled");
            return Ok(Self::disabled(default_ttl));
        };

        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!("Redis cache connected");

        Ok(Self {
            conn: Some(conn),
            default_ttl,
        })
    }

    pub fn disabled(default_ttl: Duration) -> Self {
        Self {
            conn: None,
            default_ttl,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Get a value from cache.
    #[instrument(skip(self), fields(cache_hit))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone()?;

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => {
                    debug!(key = key, "Cache hit");
                    tracing::Span::current().record("cache_hit", true);
                    Some(value)
                }
                Err(e) => {
                    warn!(key = key, error = %e, "Failed to deserialize cached value");
                    tracing::Span::current().record("cache_hit", false);
                    None
                }
            },
            Ok(None) => {
                debug!(key = key, "Cache miss");
                tracing::Span::current().record("cache_hit", false);
                None
            }
            Err(e) => {
                error!(key = key, error = %e, "Redis get error");
                tracing::Span::current().record("cache_hit", false);
                None
            }
        }
    }

    /// Set a value in cache with default TTL.
    #[instrument(skip(self, value))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Set a value in cache with custom TTL.
    #[instrument(skip(self, value))]
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let Some(mut conn) = self.conn.clone() else {
            return Ok(());
        };

        let data = serde_json::to_string(value).context("Failed to serialize value for cache")?;

        conn.set_ex::<_, _, ()>(key, data, ttl.as_secs())
            .await
            .context("Failed to set cache value")?;

        debug!(key = key, ttl_secs = ttl.as_secs(), "Cached value");
        Ok(())
    }

    /// Delete a specific key from cache.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let Some(mut conn) = self.conn.clone() else {
            return Ok(false);
        };

        let deleted: i32 = conn.del(key).await.context("Failed to delete cache key")?;

        debug!(key = key, deleted = deleted > 0, "Cache delete");
        Ok(deleted > 0)
    }

    /// Delete all keys matching a pattern (e.g., "services:*").
    #[instrument(skip(self))]
    pub async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let Some(mut conn) = self.conn.clone() else {
            return Ok(0);
        };

        // SCAN instead of KEYS so a large keyspace never blocks Redis
        let keys: Vec<String> = redis::cmd("SCAN")
            .cursor_arg(0)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(1000)
            .query_async(&mut conn)
            .await
            .map(|(_, keys): (u64, Vec<String>)| keys)
            .unwrap_or_default();

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: i32 = conn
            .del(&keys)
            .await
            .context("Failed to delete cache keys")?;

        debug!(pattern = pattern, deleted = deleted, "Cache pattern delete");
        Ok(deleted as usize)
    }

    /// Check if Redis is healthy. A disabled cache reports an error.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone().context("Redis cache disabled")?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;
        Ok(())
    }
}

/// Cache key builders for consistent key formats.
pub mod keys {
    use uuid::Uuid;

    /// Profile cache key
    pub fn profile(user_id: Uuid) -> String {
        format!("profile:{}", user_id)
    }

    /// Active service catalogue
    pub fn active_services() -> String {
        "services:active".to_string()
    }

    /// Offered services of one professional
    pub fn professional_services(professional_id: Uuid) -> String {
        format!("services:professional:{}", professional_id)
    }

    /// Pattern covering every catalogue-derived key
    pub fn services_pattern() -> String {
        "services:*".to_string()
    }

    /// Branding settings document
    pub fn branding() -> String {
        "settings:branding".to_string()
    }
}

/// TTLs per cached entity
pub mod ttl {
    use std::time::Duration;

    pub const PROFILE: Duration = Duration::from_secs(300);
    pub const SERVICES: Duration = Duration::from_secs(600);
    pub const BRANDING: Duration = Duration::from_secs(3600);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_misses_and_accepts_writes() {
        let cache = RedisCache::disabled(Duration::from_secs(60));
        assert!(!cache.is_enabled());
        cache.set("k", &42u32).await.unwrap();
        assert_eq!(cache.get::<u32>("k").await, None);
        assert!(!cache.delete("k").await.unwrap());
        assert_eq!(cache.delete_pattern("k*").await.unwrap(), 0);
        assert!(cache.health_check().await.is_err());
    }

    #[test]
    fn keys_share_the_services_prefix() {
        let pro = uuid::Uuid::nil();
        assert!(keys::active_services().starts_with("services:"));
        assert!(keys::professional_services(pro).starts_with("services:"));
        assert_eq!(keys::services_pattern(), "services:*");
    }
}
