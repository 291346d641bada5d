//! Bounded, time-limited cache region.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::coalescer::LoadCoalescer;
use super::entry::CacheEntry;
use super::stats::{RegionStats, StatsCounters};
use super::{LoadError, RegionConfig};

/// A named cache region holding at most `max_size` entries, each for at most `ttl`.
///
/// This region is:
/// - Thread-safe (one lock per region, so regions never contend with each other)
/// - LRU-bounded, with expired entries purged before any live entry is evicted
/// - Clone-friendly (cloning is cheap, shares the same underlying storage)
pub struct CacheRegion<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<RegionInner<K, V>>,
}

struct RegionInner<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    name: Arc<str>,
    config: RegionConfig,
    entries: Mutex<Entries<K, V>>,
    coalescer: LoadCoalescer<K, V>,
    stats: StatsCounters,
}

/// LRU-ordered entries plus what is needed to find expired ones cheaply.
struct Entries<K, V> {
    lru: LruCache<K, CacheEntry<V>>,
    /// Never later than the `inserted_at` of any entry present.
    oldest_insert: Option<Instant>,
    #[cfg(test)]
    scans: usize,
}

impl<K, V> Entries<K, V>
where
    K: Hash + Eq + Clone,
{
    fn new() -> Self {
        Self {
            lru: LruCache::unbounded(),
            oldest_insert: None,
            #[cfg(test)]
            scans: 0,
        }
    }

    fn insert(&mut self, key: K, value: V, now: Instant) {
        // `now` is never earlier than the current bound, so only an empty bound moves.
        self.oldest_insert.get_or_insert(now);
        self.lru.put(key, CacheEntry::new(value, now));
    }

    fn clear(&mut self) {
        self.lru.clear();
        self.oldest_insert = None;
    }

    /// Drop every expired entry. Skips the scan while no entry can be expired.
    fn purge_expired(&mut self, ttl: Duration, now: Instant) -> usize {
        match self.oldest_insert {
            Some(oldest) if now.saturating_duration_since(oldest) > ttl => {}
            _ => return 0,
        }
        #[cfg(test)]
        {
            self.scans += 1;
        }

        let stale: Vec<K> = self
            .lru
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl, now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            self.lru.pop(key);
        }

        self.oldest_insert = self.lru.iter().map(|(_, entry)| entry.inserted_at()).min();
        stale.len()
    }
}

// Clones the shared handle only, never the entries.
impl<K, V> Clone for CacheRegion<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> CacheRegion<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty region. `config` must already be validated.
    pub(crate) fn new(name: impl Into<Arc<str>>, config: RegionConfig) -> Self {
        Self {
            inner: Arc::new(RegionInner {
                name: name.into(),
                config,
                entries: Mutex::new(Entries::new()),
                coalescer: LoadCoalescer::new(),
                stats: StatsCounters::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> RegionConfig {
        self.inner.config
    }

    /// Get a value from the region.
    ///
    /// Returns `Some(value)` if the key exists and hasn't expired, and marks
    /// it as most recently used. An expired entry found here is removed.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.lookup(key);
        if value.is_some() {
            self.inner.stats.hit();
        } else {
            self.inner.stats.miss();
        }
        value
    }

    /// Check whether a fresh entry exists without touching its recency.
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        self.inner
            .entries
            .lock()
            .lru
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(self.inner.config.ttl, now))
    }

    /// Insert or replace a value, evicting the least recently used entry if
    /// the region is full.
    pub fn put(&self, key: K, value: V) {
        let now = Instant::now();
        let RegionConfig { max_size, ttl } = self.inner.config;
        let mut entries = self.inner.entries.lock();

        let mut evicted = 0u64;
        if !entries.lru.contains(&key) {
            if entries.lru.len() >= max_size {
                let expired = entries.purge_expired(ttl, now);
                self.inner.stats.expired(expired as u64);
            }
            while entries.lru.len() >= max_size {
                if entries.lru.pop_lru().is_none() {
                    break;
                }
                evicted += 1;
            }
        }
        entries.insert(key, value, now);
        drop(entries);

        if evicted > 0 {
            self.inner.stats.evicted(evicted);
            trace!(region = %self.inner.name, evicted, "Evicted least recently used entries");
        }
    }

    /// Remove a key from the region.
    ///
    /// A load already running for this key keeps serving its current waiters
    /// but will not store its result.
    pub fn invalidate(&self, key: &K) {
        self.inner.coalescer.detach(key);
        self.inner.entries.lock().lru.pop(key);
        trace!(region = %self.inner.name, "Invalidated entry");
    }

    /// Remove all entries from the region.
    ///
    /// Loads in flight keep serving their current waiters but store nothing.
    pub fn clear(&self) {
        self.inner.coalescer.detach_all();
        self.inner.entries.lock().clear();
        trace!(region = %self.inner.name, "Cleared region");
    }

    /// Remove every expired entry, returning how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let removed = self
            .inner
            .entries
            .lock()
            .purge_expired(self.inner.config.ttl, now);
        self.inner.stats.expired(removed as u64);
        removed
    }

    /// Get the cached value, or run `loader` to produce it.
    ///
    /// Concurrent callers missing on the same key share a single loader run.
    /// A failed load is reported to every waiter and nothing is cached.
    pub async fn get_or_load<F, Fut>(&self, key: K, loader: F) -> Result<V, LoadError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        self.inner.coalescer.get_or_load(self, key, loader).await
    }

    /// Number of entries physically present, expired or not.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegionStats {
        self.inner.stats.snapshot(&self.inner.name, self.len())
    }

    /// Fresh lookup that neither records hit/miss nor touches recency.
    pub(super) fn peek_fresh(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.inner
            .entries
            .lock()
            .lru
            .peek(key)
            .filter(|entry| !entry.is_expired(self.inner.config.ttl, now))
            .map(|entry| entry.value().clone())
    }

    pub(super) fn coalescer(&self) -> &LoadCoalescer<K, V> {
        &self.inner.coalescer
    }

    pub(super) fn counters(&self) -> &StatsCounters {
        &self.inner.stats
    }

    pub(super) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.inner.name)
    }

    /// Like [`CacheRegion::get`] but leaves hit/miss accounting to the caller.
    pub(super) fn lookup(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let ttl = self.inner.config.ttl;
        let mut entries = self.inner.entries.lock();

        let expired = match entries.lru.get_mut(key) {
            Some(entry) if !entry.is_expired(ttl, now) => {
                entry.touch(now);
                return Some(entry.value().clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.lru.pop(key);
            self.inner.stats.expired(1);
        }
        None
    }

    #[cfg(test)]
    fn expiry_scans(&self) -> usize {
        self.inner.entries.lock().scans
    }
}

impl<K, V> fmt::Debug for CacheRegion<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegion")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .field("entry_count", &self.len())
            .finish()
    }
}
