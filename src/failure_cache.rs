//! Memory of URLs that exhausted every extraction strategy.
//!
//! Once a URL lands here, repeat requests fail immediately without invoking
//! any extractor. Entries are permanent for the process lifetime unless a TTL
//! is configured; [`FailureCache::clear`] is always available to operators.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Concurrent set of permanently failed URLs.
///
/// Safe to share across tasks behind an `Arc`; membership checks and inserts
/// never block each other beyond a shard lock.
#[derive(Debug, Default)]
pub struct FailureCache {
    entries: DashMap<String, Instant>,
    ttl: Option<Duration>,
}

impl FailureCache {
    /// Creates a cache whose entries never expire.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache whose entries expire after `ttl` (`None` = never).
    #[must_use]
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Configured time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns true if `url` is marked as permanently failed.
    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        let key = normalize_key(url);
        if let Some(ttl) = self.ttl
            && self
                .entries
                .remove_if(&key, |_, marked_at| marked_at.elapsed() >= ttl)
                .is_some()
        {
            debug!(url = %key, "Failure cache entry expired");
            return false;
        }
        self.entries.contains_key(&key)
    }

    /// Marks `url` as permanently failed. Returns false if it already was.
    pub fn insert(&self, url: &str) -> bool {
        let key = normalize_key(url);
        let mut inserted = false;
        self.entries.entry(key).or_insert_with(|| {
            inserted = true;
            Instant::now()
        });
        inserted
    }

    /// Removes every entry and returns how many there were.
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        debug!(count, "Failure cache cleared");
        count
    }

    /// Number of cached URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache key for a URL: parsed and re-serialized (lowercase scheme and host,
/// default port dropped) without its fragment. Unparseable input is trimmed
/// and lowercased.
#[must_use]
pub fn normalize_key(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => trimmed.to_lowercase(),
    }
}
