//! Result Cache keyed by task fingerprint
//!
//! Executors consult this cache before contacting a source collaborator, so
//! an identical task (same category, normalized fragment and region filter)
//! is answered from memory until its entry expires.
//!
//! # Freshness
//!
//! Every entry carries a `valid_until` instant. Expired entries are treated
//! as misses and dropped lazily on access, or eagerly via
//! [`ResultCache::cleanup_expired`]. When the cache is full the least
//! recently used entry is evicted.
//!
//! # Concurrency
//!
//! Two identical tasks racing past an empty cache both compute and both
//! write; the second write replaces the first with an equivalent value.
//!
//! # Example
//!
//! ```ignore
//! use scout::store::cache::{CacheConfig, ResultCache};
//!
//! let cache = ResultCache::new(CacheConfig::default());
//! if cache.get(&fingerprint).is_none() {
//!     let results = executor.fetch(task).await?;
//!     cache.put(&fingerprint, results, None);
//! }
//! ```

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::ResultSet;

// ============================================================================
// Cache Types
// ============================================================================

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses (including expired entries)
    pub misses: u64,
    /// Number of entries in cache
    pub entry_count: usize,
    /// Number of evictions due to capacity
    pub evictions: u64,
    /// Number of entries dropped because `valid_until` passed
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Configuration for the result cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether the cache is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Default time-to-live for entries, in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of result sets held before LRU eviction
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_max_entries() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

impl CacheConfig {
    /// Default TTL as a `Duration`
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ============================================================================
// Cache Entry
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    results: ResultSet,
    valid_until: Instant,
}

impl CacheEntry {
    fn new(results: ResultSet, ttl: Duration) -> Self {
        Self {
            results,
            valid_until: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.valid_until
    }
}

// ============================================================================
// Result Cache
// ============================================================================

/// In-memory LRU cache of executor result sets.
pub struct ResultCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl ResultCache {
    /// Create a new cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Create a cache with default configuration
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Look up a fresh entry, promoting it in LRU order.
    pub fn get(&self, fingerprint: &str) -> Option<ResultSet> {
        if !self.config.enabled {
            return None;
        }

        let mut entries = self.entries.lock();
        let expired = match entries.peek(fingerprint) {
            Some(entry) => entry.is_expired(),
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            entries.pop(fingerprint);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        entries.get(fingerprint).map(|entry| entry.results.clone())
    }

    /// Store a result set. `ttl` falls back to the configured default.
    pub fn put(&self, fingerprint: &str, results: ResultSet, ttl: Option<Duration>) {
        if !self.config.enabled {
            return;
        }

        let entry = CacheEntry::new(results, ttl.unwrap_or_else(|| self.config.ttl()));
        let displaced = self.entries.lock().push(fingerprint.to_string(), entry);

        if let Some((key, _)) = displaced {
            if key != fingerprint {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Remove an entry
    pub fn invalidate(&self, fingerprint: &str) -> bool {
        self.entries.lock().pop(fingerprint).is_some()
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Remove expired entries, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        self.expirations
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
