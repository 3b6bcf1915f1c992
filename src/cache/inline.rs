//! Bounded TTL cache for inline query results
//!
//! Keyed by the exact, case-sensitive (sender, query) pair. Entries expire
//! after [`INLINE_CACHE_TTL`] and the cache holds at most
//! [`INLINE_CACHE_CAPACITY`] entries, so memory stays bounded no matter how
//! many distinct sender/query pairs show up.

use std::sync::Arc;
use std::time::Duration;

use mini_moka::sync::Cache;
use serde_json::Value;

/// How long an answered inline query stays servable from cache
pub const INLINE_CACHE_TTL: Duration = Duration::from_secs(10);

/// Maximum cached (sender, query) pairs
pub const INLINE_CACHE_CAPACITY: u64 = 1024;

/// Cache key: exact-match sender and query text, no normalization
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct InlineCacheKey {
    sender_id: String,
    query: String,
}

/// TTL + capacity bounded cache of answered inline query results
#[derive(Clone, Debug)]
pub struct InlineQueryCache {
    entries: Cache<InlineCacheKey, Arc<Vec<Value>>>,
}

impl Default for InlineQueryCache {
    fn default() -> Self {
        Self::with_ttl(INLINE_CACHE_TTL)
    }
}

impl InlineQueryCache {
    /// Create a cache with the default TTL
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache with a custom TTL (used by tests)
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(INLINE_CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Look up the cached result set for (`sender_id`, `query`)
    ///
    /// Returns `None` once the entry's TTL has elapsed.
    #[must_use]
    pub fn get(&self, sender_id: &str, query: &str) -> Option<Arc<Vec<Value>>> {
        self.entries.get(&InlineCacheKey {
            sender_id: sender_id.to_string(),
            query: query.to_string(),
        })
    }

    /// Insert or overwrite the entry for (`sender_id`, `query`) with a fresh
    /// timestamp
    pub fn put(&self, sender_id: &str, query: &str, results: Vec<Value>) {
        self.entries.insert(
            InlineCacheKey {
                sender_id: sender_id.to_string(),
                query: query.to_string(),
            },
            Arc::new(results),
        );
    }
}
