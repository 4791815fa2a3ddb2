//! In-memory TTL cache for fetched images.
//!
//! # Responsibilities
//! - Store fetched payloads keyed by canonical target URL
//! - Report entries as absent once their TTL has elapsed
//! - Track hit/miss counters for diagnostics
//!
//! Expiry is evaluated lazily at lookup time; an expired entry is logically
//! absent even while still physically present. There is no persistence and
//! no cross-process coherency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::observability::metrics;

/// Prefix applied to every cache key so the same URL always maps to the
/// same entry regardless of request metadata.
const KEY_PREFIX: &str = "image-proxy:";

/// An immutable cached image. Never mutated after creation; only replaced
/// or evicted.
#[derive(Debug, Clone)]
pub struct CachedImage {
    /// Raw image bytes. `Bytes` makes clones cheap reference bumps.
    pub payload: Bytes,
    /// Declared content type of the upstream response.
    pub content_type: String,
    /// Payload size in bytes.
    pub size_bytes: u64,
    /// Point in time after which the entry is logically absent.
    pub expires_at: Instant,
}

impl CachedImage {
    /// Whether the entry is still visible to lookups.
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Counter snapshot for diagnostics, attached to error responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// A thread-safe TTL cache mapping canonical URL keys to images.
///
/// `get`/`insert` are safe under concurrent invocation; racing inserts for
/// the same key resolve last-writer-wins with no torn values.
pub struct ImageCache {
    entries: DashMap<String, CachedImage>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImageCache {
    /// Create an empty cache with the given entry TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Derive the canonical cache key for a target URL.
    pub fn key_for(url: &str) -> String {
        format!("{}{}", KEY_PREFIX, url)
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a key, treating expired entries as absent.
    pub fn get(&self, key: &str) -> Option<CachedImage> {
        let now = Instant::now();
        let found = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.clone()),
            Some(_) => None,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match found {
            Some(image) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(image)
            }
            None => {
                // The read guard above is dropped; reap the dead entry
                // unless a concurrent insert already replaced it.
                self.entries.remove_if(key, |_, entry| !entry.is_live(now));
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store an image under `key`, unconditionally overwriting any existing
    /// entry and re-arming its expiry at `now + ttl`.
    pub fn insert(&self, key: &str, payload: Bytes, content_type: String) -> CachedImage {
        let image = CachedImage {
            size_bytes: payload.len() as u64,
            payload,
            content_type,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.insert(key.to_string(), image.clone());
        metrics::record_cache_size(self.entries.len());
        image
    }

    /// Explicitly invalidate a key.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
        metrics::record_cache_size(self.entries.len());
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
