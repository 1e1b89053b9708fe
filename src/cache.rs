use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// CacheService
///
/// Key-value cache contract consumed by the auth orchestrator. Each call reports success
/// as a boolean instead of raising, mirroring a fire-and-check cache client; callers decide
/// whether a `false` is fatal.
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Stores `value` under `key`. `ttl` of `None` keeps the entry until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool;
    async fn get(&self, key: &str) -> Option<String>;
    /// Resets the remaining lifetime of an existing entry. `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> bool;
    async fn delete(&self, key: &str) -> bool;
    async fn exists(&self, key: &str) -> bool;
    /// Drops every entry.
    async fn clear(&self) -> bool;
    /// Releases the underlying connection. Called once at shutdown.
    async fn close(&self);
}

/// CacheState
///
/// The concrete type used to share the cache handle across the application state.
pub type CacheState = Arc<dyn CacheService>;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// MemoryCache
///
/// TTL-aware in-process cache. Expired entries are treated as absent and dropped lazily on access.
/// After `close` every operation fails, which is also how tests simulate an unreachable cache.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    closed: RwLock<bool>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn is_closed(&self) -> bool {
        *self.closed.read().await
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        if self.is_closed().await {
            tracing::error!(key, "cache set on closed cache");
            return false;
        }
        let entry = CacheEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        true
    }

    async fn get(&self, key: &str) -> Option<String> {
        if self.is_closed().await {
            return None;
        }
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> bool {
        if self.is_closed().await {
            return false;
        }
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + ttl);
                true
            }
            _ => false,
        }
    }

    async fn delete(&self, key: &str) -> bool {
        if self.is_closed().await {
            return false;
        }
        self.entries.write().await.remove(key);
        true
    }

    async fn exists(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    async fn clear(&self) -> bool {
        if self.is_closed().await {
            return false;
        }
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        tracing::info!(dropped, "cache cleared");
        true
    }

    async fn close(&self) {
        *self.closed.write().await = true;
        self.entries.write().await.clear();
        tracing::info!("cache closed");
    }
}
