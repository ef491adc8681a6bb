//! Content-Addressed Generation Cache
//!
//! Memoizes prior generation results keyed by a deterministic hash of the
//! semantically relevant request fields. Entries expire after a fixed TTL and
//! are lazily evicted on the next lookup rather than swept proactively.
//!
//! This is an optimization layer, not a source of truth: callers must behave
//! correctly if the cache is entirely disabled, and nothing here survives a
//! process restart.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Default entry lifetime: 1 hour
const DEFAULT_TTL_SECS: i64 = 3600;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

// ============================================================================
// Cache Types
// ============================================================================

/// A single stored result with its creation timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: Value,
    created_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(value: Value) -> Self {
        Self {
            value,
            created_at: Utc::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        Utc::now() - self.created_at >= ttl
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: usize,
}

// ============================================================================
// Content Cache
// ============================================================================

/// TTL-bounded memoization of generation results, keyed by content hash
pub struct ContentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ContentCache {
    /// Create a cache whose entries live for `ttl_secs` seconds
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a cache with the default 1-hour TTL
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }

    /// Deterministic content hash of a structured record.
    ///
    /// The record is serialized through `serde_json::Value`, whose object
    /// maps store keys sorted, so structurally-equal records hash to the
    /// same key regardless of field insertion order. The digest is SHA-256,
    /// hex encoded.
    pub fn hash<T: Serialize>(content: &T) -> CacheResult<String> {
        let canonical = serde_json::to_string(&serde_json::to_value(content)?)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    /// Look up a stored result.
    ///
    /// An entry older than the TTL is treated as absent and removed as a
    /// side effect of the lookup.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.write().await;

        match entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Typed lookup convenience; a value that fails to decode is a miss
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        serde_json::from_value(value).ok()
    }

    /// Store a result, unconditionally overwriting with a fresh timestamp
    pub async fn set(&self, key: impl Into<String>, value: Value) {
        let mut entries = self.entries.write().await;
        entries.insert(key.into(), CacheEntry::new(value));
    }

    /// Drop all entries
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Snapshot of hit/miss/eviction counters
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: self.entries.read().await.len(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_hash_ignores_field_order() {
        let a = json!({"topic": "moon landing", "stage": "events", "style": "Photorealistic"});
        let b = json!({"style": "Photorealistic", "stage": "events", "topic": "moon landing"});

        assert_eq!(
            ContentCache::hash(&a).unwrap(),
            ContentCache::hash(&b).unwrap()
        );
    }

    #[test]
    fn test_hash_ignores_nested_field_order() {
        let a = json!({"outer": {"x": 1, "y": 2}, "z": [1, 2]});
        let b = json!({"z": [1, 2], "outer": {"y": 2, "x": 1}});

        assert_eq!(
            ContentCache::hash(&a).unwrap(),
            ContentCache::hash(&b).unwrap()
        );
    }

    #[test]
    fn test_hash_distinguishes_values() {
        let a = json!({"topic": "moon landing"});
        let b = json!({"topic": "mars landing"});

        assert_ne!(
            ContentCache::hash(&a).unwrap(),
            ContentCache::hash(&b).unwrap()
        );
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = ContentCache::with_defaults();
        cache.set("k", json!({"events": 3})).await;

        let value = cache.get("k").await.unwrap();
        assert_eq!(value["events"], 3);
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_and_evicted() {
        let cache = ContentCache::new(0);
        cache.set("k", json!(1)).await;

        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.len().await, 0);

        let stats = cache.stats().await;
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let cache = ContentCache::with_defaults();
        cache.set("k", json!("old")).await;
        cache.set("k", json!("new")).await;

        assert_eq!(cache.get("k").await.unwrap(), json!("new"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_typed_lookup() {
        let cache = ContentCache::with_defaults();
        cache.set("k", json!(["a", "b"])).await;

        let values: Vec<String> = cache.get_as("k").await.unwrap();
        assert_eq!(values, vec!["a", "b"]);

        let wrong_shape: Option<u64> = cache.get_as("k").await;
        assert!(wrong_shape.is_none());
    }

    #[tokio::test]
    async fn test_clear_drops_everything() {
        let cache = ContentCache::with_defaults();
        cache.set("a", json!(1)).await;
        cache.set("b", json!(2)).await;

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_stats_track_hits_and_misses() {
        let cache = ContentCache::with_defaults();
        cache.set("k", json!(1)).await;

        cache.get("k").await;
        cache.get("absent").await;

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
    }

    proptest! {
        #[test]
        fn prop_hash_is_insertion_order_stable(
            entries in proptest::collection::hash_map("[a-z]{1,8}", 0i64..1000, 1..8)
        ) {
            let pairs: Vec<(String, i64)> = entries.into_iter().collect();
            let forward: serde_json::Map<String, Value> = pairs
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            let reversed: serde_json::Map<String, Value> = pairs
                .iter()
                .rev()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();

            prop_assert_eq!(
                ContentCache::hash(&forward).unwrap(),
                ContentCache::hash(&reversed).unwrap()
            );
        }
    }
}
