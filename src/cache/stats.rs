//! Per-region counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    load_failures: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn load_started(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn load_failed(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn evicted(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn expired(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, region: &str, entries: usize) -> RegionStats {
        RegionStats {
            region: region.to_string(),
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a region's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionStats {
    pub region: String,
    pub entries: usize,
    /// Every `get` and `get_or_load` call counts as exactly one hit or miss.
    pub hits: u64,
    pub misses: u64,
    /// Loader executions started by `get_or_load`.
    pub loads: u64,
    pub load_failures: u64,
    /// Entries removed to respect the size bound.
    pub evictions: u64,
    /// Entries removed because their ttl elapsed.
    pub expirations: u64,
}

impl RegionStats {
    /// Fraction of lookups served from the region, or 0.0 when there were none.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let counters = StatsCounters::default();
        counters.hit();
        counters.hit();
        counters.hit();
        counters.miss();
        counters.evicted(2);

        let stats = counters.snapshot("doctors", 4);
        assert_eq!(stats.region, "doctors");
        assert_eq!(stats.entries, 4);
        assert_eq!(stats.evictions, 2);
        assert!((stats.hit_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_ratio_is_zero() {
        let stats = StatsCounters::default().snapshot("offices", 0);
        assert_eq!(stats.hit_ratio(), 0.0);
    }
}
