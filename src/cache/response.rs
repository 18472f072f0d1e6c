//! TTL response cache for tool results.
//!
//! [`ResponseCache`] stores the JSON result of a tool call keyed on
//! [`CacheKey`]: the tool name plus a digest of its arguments. Entries are
//! never served after their TTL; expired entries are dropped lazily when
//! read, or all at once via [`ResponseCache::clear`].
//!
//! # Capacity
//!
//! By default the cache is unbounded, matching the observed behaviour of
//! the upstream proxy. Setting [`CacheConfig::max_entries`] switches moka
//! to size-based eviction; this is an explicit opt-in.
//!
//! # Key stability
//!
//! The digest walks the argument value with object keys sorted, so
//! `{"a":1,"b":2}` and `{"b":2,"a":1}` share an entry regardless of how
//! `serde_json` orders maps. `DefaultHasher` is deterministic within a
//! process lifetime, which is sufficient for an in-memory cache.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use serde_json::Value;

use crate::config::MAX_CACHE_TTL_SECS;
use crate::telemetry;

/// Configuration for the response cache.
///
/// ```rust
/// # use r2r_mcp::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(10_000)
///     .ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: unbounded.
    pub max_entries: Option<u64>,
    /// Time-to-live for cached entries. Default: 300s.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            ttl: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the cache to `n` entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = Some(n);
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Cache key: operation name plus argument digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub operation: String,
    pub digest: u64,
}

impl CacheKey {
    pub fn new(operation: &str, arguments: &Value) -> Self {
        let mut hasher = DefaultHasher::new();
        hash_value(arguments, &mut hasher);
        Self {
            operation: operation.to_string(),
            digest: hasher.finish(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{:016x}", self.operation, self.digest)
    }
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(b) => {
            1u8.hash(state);
            b.hash(state);
        }
        Value::Number(n) => {
            2u8.hash(state);
            n.to_string().hash(state);
        }
        Value::String(s) => {
            3u8.hash(state);
            s.hash(state);
        }
        Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                key.hash(state);
                hash_value(&map[key], state);
            }
        }
    }
}

/// Hit/miss counters since the last clear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate in percent, or `None` before the first lookup.
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        (total > 0).then(|| self.hits as f64 / total as f64 * 100.0)
    }

    /// Hit rate formatted as `"87.5%"`, or `"N/A"`.
    pub fn hit_rate_display(&self) -> String {
        match self.hit_rate() {
            Some(rate) => format!("{rate:.1}%"),
            None => "N/A".to_string(),
        }
    }
}

/// In-memory TTL cache for tool results.
pub struct ResponseCache {
    cache: Cache<CacheKey, Value>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// TTLs past [`MAX_CACHE_TTL_SECS`] are clamped to it.
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = config.ttl.min(Duration::from_secs(MAX_CACHE_TTL_SECS));
        let builder = Cache::builder().time_to_live(ttl);
        let cache = match config.max_entries {
            Some(n) => builder.max_capacity(n).build(),
            None => builder.build(),
        };
        Self {
            cache,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry. Emits cache hit/miss metrics.
    pub async fn get(&self, key: &CacheKey) -> Option<Value> {
        match self.cache.get(key).await {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => key.operation.clone())
                    .increment(1);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => key.operation.clone())
                    .increment(1);
                None
            }
        }
    }

    /// Insert (or overwrite) an entry, stamping it with the current time.
    pub async fn insert(&self, key: CacheKey, value: Value) {
        self.cache.insert(key, value).await;
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop every entry and reset hit/miss counters.
    ///
    /// Returns the number of entries removed.
    pub async fn clear(&self) -> u64 {
        let removed = self.len().await;
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        removed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn cache_key_deterministic() {
        let k1 = CacheKey::new("search", &json!({"query": "rust"}));
        let k2 = CacheKey::new("search", &json!({"query": "rust"}));
        assert_eq!(k1, k2);
    }

    #[test]
    fn cache_key_differs_on_operation() {
        let args = json!({"query": "rust"});
        assert_ne!(CacheKey::new("search", &args), CacheKey::new("rag", &args));
    }

    #[test]
    fn cache_key_differs_on_arguments() {
        let k1 = CacheKey::new("search", &json!({"query": "rust"}));
        let k2 = CacheKey::new("search", &json!({"query": "go"}));
        assert_ne!(k1, k2);
    }

    #[test]
    fn cache_key_ignores_object_key_order() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":[true,null]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":[true,null],"a":1}"#).unwrap();
        assert_eq!(CacheKey::new("t", &a), CacheKey::new("t", &b));
    }

    #[test]
    fn cache_key_distinguishes_string_from_number() {
        let k1 = CacheKey::new("t", &json!({"limit": 10}));
        let k2 = CacheKey::new("t", &json!({"limit": "10"}));
        assert_ne!(k1, k2);
    }

    #[test]
    fn cache_key_display_includes_operation() {
        let key = CacheKey::new("get_document", &json!({}));
        assert!(key.to_string().starts_with("get_document:"));
    }

    #[test]
    fn oversized_ttl_is_clamped() {
        let cache = ResponseCache::new(&CacheConfig::new().ttl(Duration::MAX));
        assert_eq!(cache.ttl(), Duration::from_secs(MAX_CACHE_TTL_SECS));
    }

    #[test]
    fn hit_rate_display() {
        let empty = CacheStats { hits: 0, misses: 0 };
        assert_eq!(empty.hit_rate_display(), "N/A");
        let some = CacheStats { hits: 3, misses: 1 };
        assert_eq!(some.hit_rate_display(), "75.0%");
    }
}
