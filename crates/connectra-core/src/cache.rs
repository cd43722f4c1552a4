//! In-memory TTL cache used by the FilterRegistry (§4.8).
//!
//! Deliberately NOT backed by Redis: the keys are process-local
//! (`filters:<service>`, `filter_data:<service>:<md5>`) and the spec calls
//! for a thread-safe in-memory map with a background sweeper, not a
//! distributed cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A thread-safe map with per-entry TTL, a background sweeper, and
/// prefix-based invalidation.
pub struct TtlCache<V: Clone + Send + Sync + 'static> {
    entries: Arc<RwLock<HashMap<String, Entry<V>>>>,
    max_entries: usize,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entries,
        }
    }

    /// Spawn a background task that sweeps expired entries every
    /// `interval`. Returns a handle; dropping it does not stop the sweep —
    /// callers that need to stop it should `abort()` explicitly.
    pub fn spawn_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let entries = self.entries.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let mut guard = entries.write().await;
                let before = guard.len();
                guard.retain(|_, entry| entry.expires_at > now);
                let removed = before - guard.len();
                if removed > 0 {
                    debug!(removed, "cache sweeper evicted expired entries");
                }
            }
        })
    }

    /// Returns the cached value iff `set` was called within the last TTL
    /// and the entry has not been evicted (§8, invariant 7).
    pub async fn get(&self, key: &str) -> Option<V> {
        let guard = self.entries.read().await;
        let entry = guard.get(key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut guard = self.entries.write().await;

        if guard.len() >= self.max_entries && !guard.contains_key(&key) {
            Self::evict_one(&mut guard);
        }

        guard.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove every entry whose key starts with `prefix`. Used on writes
    /// that touch filter values so stale cached listings don't survive.
    pub async fn invalidate_by_prefix(&self, prefix: &str) {
        let mut guard = self.entries.write().await;
        guard.retain(|k, _| !k.starts_with(prefix));
    }

    /// Eviction on overflow: first drop expired entries; if still at
    /// capacity, drop one arbitrary entry (FIFO-approximate via HashMap
    /// iteration order, which is not insertion-ordered but is stable
    /// enough for a soft capacity bound).
    fn evict_one(guard: &mut HashMap<String, Entry<V>>) {
        let now = Instant::now();
        let expired_key = guard
            .iter()
            .find(|(_, entry)| entry.expires_at <= now)
            .map(|(k, _)| k.clone());

        if let Some(key) = expired_key {
            guard.remove(&key);
            return;
        }

        if let Some(key) = guard.keys().next().cloned() {
            guard.remove(&key);
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_before_set_is_none() {
        let cache: TtlCache<String> = TtlCache::new(10);
        assert!(cache.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_set_then_get_within_ttl() {
        let cache = TtlCache::new(10);
        cache
            .set("k", "v".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await, Some("v".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = TtlCache::new(10);
        cache
            .set("k", "v".to_string(), Duration::from_millis(10))
            .await;
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_by_prefix_removes_matching_keys() {
        let cache = TtlCache::new(10);
        cache
            .set("filters:companies", "a".to_string(), Duration::from_secs(60))
            .await;
        cache
            .set("filters:contacts", "b".to_string(), Duration::from_secs(60))
            .await;
        cache
            .set("other:key", "c".to_string(), Duration::from_secs(60))
            .await;

        cache.invalidate_by_prefix("filters:").await;

        assert!(cache.get("filters:companies").await.is_none());
        assert!(cache.get("filters:contacts").await.is_none());
        assert_eq!(cache.get("other:key").await, Some("c".to_string()));
    }

    #[tokio::test]
    async fn test_overflow_evicts_to_stay_at_capacity() {
        let cache = TtlCache::new(2);
        cache.set("a", "1".to_string(), Duration::from_secs(60)).await;
        cache.set("b", "2".to_string(), Duration::from_secs(60)).await;
        cache.set("c", "3".to_string(), Duration::from_secs(60)).await;
        assert_eq!(cache.len().await, 2);
    }
}
