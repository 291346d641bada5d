//! A single stored value with its bookkeeping timestamps.

use std::time::Duration;

use tokio::time::Instant;

/// A value held by a region.
///
/// The key lives in the region's map; the entry only tracks when it was
/// stored and when it was last read.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    last_accessed_at: Instant,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, now: Instant) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed_at: now,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn inserted_at(&self) -> Instant {
        self.inserted_at
    }

    pub fn last_accessed_at(&self) -> Instant {
        self.last_accessed_at
    }

    /// Time since the entry was stored.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.inserted_at)
    }

    /// An entry exactly `ttl` old is still fresh.
    #[inline]
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        self.age(now) > ttl
    }

    pub(crate) fn touch(&mut self, now: Instant) {
        self.last_accessed_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expiry_boundary_is_inclusive() {
        let ttl = Duration::from_secs(60);
        let entry = CacheEntry::new("card", Instant::now());

        tokio::time::advance(ttl).await;
        assert!(!entry.is_expired(ttl, Instant::now()));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired(ttl, Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn touch_only_moves_last_access() {
        let start = Instant::now();
        let mut entry = CacheEntry::new(7, start);

        tokio::time::advance(Duration::from_secs(5)).await;
        entry.touch(Instant::now());

        assert_eq!(entry.inserted_at(), start);
        assert_eq!(entry.last_accessed_at(), start + Duration::from_secs(5));
        assert_eq!(entry.age(Instant::now()), Duration::from_secs(5));
        assert_eq!(*entry.value(), 7);
    }
}
