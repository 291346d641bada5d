//! Cache manager - Central registry for all named regions.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{CacheRegion, ConfigurationError, RegionConfig, RegionStats};

/// Type-erased view of a region, used for registry-wide maintenance.
trait RegionHandle: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn clear(&self);
    fn sweep_expired(&self) -> usize;
    fn stats(&self) -> RegionStats;
}

impl<K, V> RegionHandle for CacheRegion<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clear(&self) {
        CacheRegion::clear(self);
    }

    fn sweep_expired(&self) -> usize {
        CacheRegion::sweep_expired(self)
    }

    fn stats(&self) -> RegionStats {
        CacheRegion::stats(self)
    }
}

/// Internal registry slot storing a type-erased region.
struct RegisteredRegion {
    handle: Arc<dyn RegionHandle>,
    type_name: &'static str,
}

/// Central registry of named cache regions.
///
/// Regions are created once at startup and live for the rest of the process.
/// Each region has its own lock, so work on one entity's cache never blocks
/// another's; the registry lock itself is only written during setup.
///
/// ## Example
///
/// ```rust,ignore
/// let manager = CacheManager::new();
///
/// // Create a region for patients
/// let patients: CacheRegion<i64, Patient> =
///     manager.create_region("patientsById", RegionConfig::default())?;
///
/// // Later, retrieve the same region
/// let patients: CacheRegion<i64, Patient> = manager.region("patientsById")?;
/// ```
#[derive(Clone)]
pub struct CacheManager {
    regions: Arc<RwLock<HashMap<String, RegisteredRegion>>>,
}

impl CacheManager {
    /// Create a new empty manager.
    pub fn new() -> Self {
        Self {
            regions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a new region and register it.
    ///
    /// Fails if the name is taken or the config is invalid.
    pub fn create_region<K, V>(
        &self,
        name: &str,
        config: RegionConfig,
    ) -> Result<CacheRegion<K, V>, ConfigurationError>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        config.validate(name)?;

        let mut regions = self.regions.write();
        if regions.contains_key(name) {
            return Err(ConfigurationError::DuplicateRegion(name.to_string()));
        }

        let region = CacheRegion::<K, V>::new(name, config);
        regions.insert(
            name.to_string(),
            RegisteredRegion {
                handle: Arc::new(region.clone()),
                type_name: type_name::<CacheRegion<K, V>>(),
            },
        );

        info!(
            region = name,
            max_size = config.max_size,
            ttl_secs = config.ttl.as_secs(),
            "Cache region created"
        );
        Ok(region)
    }

    /// Get an existing region by name.
    ///
    /// Fails if the region is unknown or was created with other key/value types.
    pub fn region<K, V>(&self, name: &str) -> Result<CacheRegion<K, V>, ConfigurationError>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let regions = self.regions.read();
        let slot = regions
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownRegion(name.to_string()))?;

        slot.handle
            .as_any()
            .downcast_ref::<CacheRegion<K, V>>()
            .cloned()
            .ok_or_else(|| ConfigurationError::TypeMismatch {
                region: name.to_string(),
                expected: type_name::<CacheRegion<K, V>>(),
                actual: slot.type_name,
            })
    }

    /// Check if a region with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.regions.read().contains_key(name)
    }

    /// Get the number of registered regions.
    pub fn len(&self) -> usize {
        self.regions.read().len()
    }

    /// Check if the manager has no regions.
    pub fn is_empty(&self) -> bool {
        self.regions.read().is_empty()
    }

    /// Get a sorted list of all registered region names.
    pub fn region_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.regions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove all entries from every region.
    pub fn clear_all(&self) {
        for handle in self.handles() {
            handle.clear();
        }
        debug!("Cleared all cache regions");
    }

    /// Remove expired entries from every region, returning the total removed.
    pub fn sweep_expired(&self) -> usize {
        self.handles().iter().map(|handle| handle.sweep_expired()).sum()
    }

    /// Snapshot the counters of every region, sorted by name.
    pub fn stats(&self) -> Vec<RegionStats> {
        let mut stats: Vec<RegionStats> = self.handles().iter().map(|handle| handle.stats()).collect();
        stats.sort_by(|a, b| a.region.cmp(&b.region));
        stats
    }

    /// Start a background task that sweeps expired entries every `interval`.
    pub fn spawn_sweeper(&self, interval: Duration) -> Result<Sweeper, ConfigurationError> {
        if interval.is_zero() {
            return Err(ConfigurationError::InvalidSetting {
                key: "sweep interval".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = manager.sweep_expired();
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
        });

        info!(interval_secs = interval.as_secs(), "Cache sweeper started");
        Ok(Sweeper { handle })
    }

    // Handles are cloned out so region work happens without the registry lock.
    fn handles(&self) -> Vec<Arc<dyn RegionHandle>> {
        self.regions
            .read()
            .values()
            .map(|slot| Arc::clone(&slot.handle))
            .collect()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("region_count", &self.len())
            .field("region_names", &self.region_names())
            .finish()
    }
}

/// Handle to the periodic sweep task. Dropping it stops the task.
#[derive(Debug)]
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Stop sweeping.
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.handle.abort();
        debug!("Cache sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RegionConfig {
        RegionConfig::new(10, Duration::from_secs(60))
    }

    #[test]
    fn create_then_lookup_shares_storage() {
        let manager = CacheManager::new();
        let created: CacheRegion<i64, String> = manager.create_region("doctorsById", config()).unwrap();

        created.put(1, "Dr. Grey".to_string());

        let found: CacheRegion<i64, String> = manager.region("doctorsById").unwrap();
        assert_eq!(found.get(&1).as_deref(), Some("Dr. Grey"));
        assert!(manager.contains("doctorsById"));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let manager = CacheManager::new();
        manager.create_region::<i64, String>("offices", config()).unwrap();

        let err = manager.create_region::<i64, String>("offices", config()).unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateRegion("offices".to_string()));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let manager = CacheManager::new();

        let err = manager
            .create_region::<i64, String>("offices", config().max_size(0))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidMaxSize { .. }));
        assert!(manager.is_empty());
    }

    #[test]
    fn unknown_region_is_an_error() {
        let manager = CacheManager::new();
        let err = manager.region::<i64, String>("nope").unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownRegion("nope".to_string()));
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let manager = CacheManager::new();
        manager.create_region::<i64, String>("patients", config()).unwrap();

        let err = manager.region::<String, String>("patients").unwrap_err();
        assert!(matches!(err, ConfigurationError::TypeMismatch { .. }));
    }

    #[test]
    fn names_and_stats_are_sorted() {
        let manager = CacheManager::new();
        manager.create_region::<i64, String>("specializations", config()).unwrap();
        manager.create_region::<i64, String>("doctors", config()).unwrap();

        assert_eq!(manager.region_names(), vec!["doctors", "specializations"]);

        let stats = manager.stats();
        assert_eq!(stats[0].region, "doctors");
        assert_eq!(stats[1].region, "specializations");
    }

    #[test]
    fn clear_all_empties_every_region() {
        let manager = CacheManager::new();
        let a: CacheRegion<i64, String> = manager.create_region("a", config()).unwrap();
        let b: CacheRegion<String, u32> = manager.create_region("b", config()).unwrap();

        a.put(1, "x".to_string());
        b.put("y".to_string(), 2);
        manager.clear_all();

        assert!(a.is_empty());
        assert!(b.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_entries() {
        let manager = CacheManager::new();
        let region: CacheRegion<i64, String> = manager
            .create_region("patientCardHistory", RegionConfig::new(10, Duration::from_secs(5)))
            .unwrap();
        region.put(1, "visit".to_string());

        let sweeper = manager.spawn_sweeper(Duration::from_secs(2)).unwrap();
        assert!(sweeper.is_running());

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(region.is_empty());
        assert_eq!(region.stats().expirations, 1);

        sweeper.stop();
    }

    #[tokio::test]
    async fn zero_sweep_interval_is_rejected() {
        let manager = CacheManager::new();
        assert!(manager.spawn_sweeper(Duration::ZERO).is_err());
    }
}
