//! TTL-bounded result cache with FIFO capacity eviction.
//!
//! Lookups touch only the shard holding the key. Inserts additionally take
//! the insertion-order lock so the capacity bound and eviction order hold
//! under concurrent writers.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::media::{QualityTier, ResolutionRequest, TargetKind};
use crate::source::SourceId;

/// Cache key in one of the independent keyspaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `"{id}:{kind}:{tier}"`
    Stream {
        source_id: SourceId,
        target: TargetKind,
        quality: QualityTier,
    },
    /// `"audio:{id}"`
    Audio { source_id: SourceId },
    /// `"info:{id}"`
    Details { source_id: SourceId },
    /// `"search:{query}:{limit}"`
    Search { query: String, limit: usize },
}

impl CacheKey {
    /// Generic stream key for a request.
    pub fn for_request(request: &ResolutionRequest) -> Self {
        CacheKey::Stream {
            source_id: request.source_id.clone(),
            target: request.target,
            quality: request.quality,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Stream {
                source_id,
                target,
                quality,
            } => write!(f, "{source_id}:{target}:{quality}"),
            CacheKey::Audio { source_id } => write!(f, "audio:{source_id}"),
            CacheKey::Details { source_id } => write!(f, "info:{source_id}"),
            CacheKey::Search { query, limit } => write!(f, "search:{query}:{limit}"),
        }
    }
}

/// A cached value and its expiry bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub created_at: Instant,
    pub ttl: Duration,
    sequence: u64,
}

impl<V> CacheEntry<V> {
    /// An entry is stale once strictly more than `ttl` has elapsed.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    /// Calculate hit rate percentage
    pub fn calculate_hit_rate(hits: u64, misses: u64) -> f64 {
        if hits + misses == 0 {
            0.0
        } else {
            (hits as f64) / ((hits + misses) as f64) * 100.0
        }
    }
}

/// Bounded mapping from derived key to a previously computed value.
///
/// Expired entries are dropped lazily when a lookup finds them. When an
/// insert of a new key would exceed `max_entries`, the earliest inserted
/// entry still present is evicted first. Overwriting a key counts as a
/// fresh insertion.
pub struct ResultCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    insertion_order: Mutex<VecDeque<(String, u64)>>,
    next_sequence: AtomicU64,
    max_entries: usize,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> ResultCache<V> {
    /// Creates a cache on the system clock. A zero capacity is raised to one.
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self::with_clock(max_entries, default_ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            insertion_order: Mutex::new(VecDeque::new()),
            next_sequence: AtomicU64::new(0),
            max_entries: max_entries.max(1),
            default_ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the live value for `key`, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();

        let expired_sequence = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, age = ?now.saturating_duration_since(entry.created_at), "Cache hit");
                return Some(entry.value.clone());
            }
            Some(entry) => Some(entry.sequence),
            None => None,
        };

        if let Some(sequence) = expired_sequence {
            // Only remove the entry we saw; a concurrent set may have replaced it
            if self
                .entries
                .remove_if(key, |_, entry| entry.sequence == sequence)
                .is_some()
            {
                debug!(key, "Evicted expired cache entry");
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key, "Cache miss");
        None
    }

    /// Inserts with the cache's default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Inserts or overwrites `key`, evicting the oldest insertion when full.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut order = self.insertion_order.lock();
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);

        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.max_entries {
                if !self.evict_oldest(&mut order) {
                    break;
                }
            }
        }

        self.entries.insert(
            key.clone(),
            CacheEntry {
                key: key.clone(),
                value,
                created_at: self.clock.now(),
                ttl,
                sequence,
            },
        );
        order.push_back((key, sequence));

        // Overwrites and lazy expiry leave dead records behind
        if order.len() > self.max_entries.saturating_mul(2) {
            order.retain(|(key, sequence)| self.is_current(key, *sequence));
        }
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&self) {
        let mut order = self.insertion_order.lock();
        self.entries.clear();
        order.clear();
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            entries: self.entries.len(),
            capacity: self.max_entries,
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: CacheStats::calculate_hit_rate(hits, misses),
        }
    }

    fn evict_oldest(&self, order: &mut VecDeque<(String, u64)>) -> bool {
        while let Some((key, sequence)) = order.pop_front() {
            if self
                .entries
                .remove_if(&key, |_, entry| entry.sequence == sequence)
                .is_some()
            {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Evicted oldest cache entry");
                return true;
            }
        }
        false
    }

    fn is_current(&self, key: &str, sequence: u64) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.sequence == sequence)
    }
}

impl<V> fmt::Debug for ResultCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn cache_with_clock(capacity: usize) -> (ResultCache<String>, ManualClock) {
        let clock = ManualClock::new();
        let cache = ResultCache::with_clock(capacity, Duration::from_secs(60), Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let (cache, _clock) = cache_with_clock(4);
        cache.set("k", "v".to_string());

        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let (cache, clock) = cache_with_clock(4);
        cache.set_with_ttl("k", "v".to_string(), Duration::from_secs(10));

        clock.advance(Duration::from_secs(10));
        assert!(cache.get("k").is_some(), "entry at exactly ttl is still live");

        clock.advance(Duration::from_millis(1));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0, "expired entry is evicted on lookup");
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_capacity_evicts_earliest_insertion() {
        let (cache, _clock) = cache_with_clock(3);
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.set("c", "3".to_string());

        // Reads do not refresh position
        assert!(cache.get("a").is_some());

        cache.set("d", "4".to_string());
        assert_eq!(cache.len(), 3);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("d").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let (cache, _clock) = cache_with_clock(2);
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.set("a", "1b".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").as_deref(), Some("1b"));

        // "b" is now the oldest insertion
        cache.set("c", "3".to_string());
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn test_eviction_skips_already_expired_records() {
        let (cache, clock) = cache_with_clock(2);
        cache.set_with_ttl("short", "x".to_string(), Duration::from_secs(1));
        cache.set("long", "y".to_string());

        clock.advance(Duration::from_secs(2));
        assert!(cache.get("short").is_none());

        cache.set("new", "z".to_string());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("long").is_some());
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let (cache, _clock) = cache_with_clock(5);
        for i in 0..50 {
            cache.set(format!("key-{i}"), i.to_string());
            assert!(cache.len() <= 5);
        }
        assert!(cache.get("key-49").is_some());
        assert!(cache.get("key-44").is_none());
    }

    #[test]
    fn test_clear_and_purge() {
        let (cache, clock) = cache_with_clock(4);
        cache.set_with_ttl("a", "1".to_string(), Duration::from_secs(1));
        cache.set("b", "2".to_string());

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keyspaces_do_not_collide() {
        let source_id = SourceId::from_url("abc123DEF_-").unwrap();
        let stream = CacheKey::Stream {
            source_id: source_id.clone(),
            target: TargetKind::Audio,
            quality: QualityTier::Best,
        };
        let audio = CacheKey::Audio {
            source_id: source_id.clone(),
        };

        assert_eq!(stream.to_string(), "abc123DEF_-:audio:best");
        assert_eq!(audio.to_string(), "audio:abc123DEF_-");
        assert_eq!(CacheKey::Details { source_id }.to_string(), "info:abc123DEF_-");
        assert_ne!(stream.to_string(), audio.to_string());
    }

    #[test]
    fn test_concurrent_writers_respect_capacity() {
        let cache = Arc::new(ResultCache::<u64>::new(16, Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        cache.set(format!("{thread}-{i}"), i);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 16);
    }
}
