//! Single-flight loading for cache misses.
//!
//! Each region owns one coalescer. The first caller to miss on a key registers
//! a pending load and starts the loader on its own task; later callers for the
//! same key await that load's shared result instead of starting another.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::LoadError;
use super::region::CacheRegion;

type SharedLoad<V> = Shared<BoxFuture<'static, Result<V, LoadError>>>;

/// One miss episode for one key.
struct PendingLoad<V> {
    episode: u64,
    result: SharedLoad<V>,
    waiters: usize,
}

pub(crate) struct LoadCoalescer<K, V> {
    pending: Mutex<HashMap<K, PendingLoad<V>>>,
    next_episode: AtomicU64,
}

impl<K, V> LoadCoalescer<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_episode: AtomicU64::new(0),
        }
    }

    pub(crate) async fn get_or_load<F, Fut>(
        &self,
        region: &CacheRegion<K, V>,
        key: K,
        loader: F,
    ) -> Result<V, LoadError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        // Each call records exactly one hit or one miss, decided below.
        if let Some(value) = region.lookup(&key) {
            region.counters().hit();
            return Ok(value);
        }

        let load = {
            let mut pending = self.pending.lock();
            match pending.entry(key) {
                Entry::Occupied(mut occupied) => {
                    region.counters().miss();
                    let inflight = occupied.get_mut();
                    inflight.waiters += 1;
                    debug!(
                        region = region.name(),
                        waiters = inflight.waiters,
                        "Joining in-flight load"
                    );
                    inflight.result.clone()
                }
                Entry::Vacant(vacant) => {
                    // The previous episode may have stored its value after our miss.
                    if let Some(value) = region.peek_fresh(vacant.key()) {
                        region.counters().hit();
                        return Ok(value);
                    }
                    region.counters().miss();

                    let episode = self.next_episode.fetch_add(1, Ordering::Relaxed);
                    let load = spawn_load(region.clone(), vacant.key().clone(), episode, loader);
                    vacant.insert(PendingLoad {
                        episode,
                        result: load.clone(),
                        waiters: 1,
                    });
                    debug!(region = region.name(), episode, "Cache miss, loading");
                    load
                }
            }
        };

        load.await
    }

    /// Settle a finished load: store it if its episode is still registered.
    fn complete(
        &self,
        region: &CacheRegion<K, V>,
        key: K,
        episode: u64,
        outcome: Result<V, LoadError>,
    ) -> Result<V, LoadError> {
        let mut pending = self.pending.lock();
        let current = pending.get(&key).is_some_and(|load| load.episode == episode);

        let waiters = if current {
            let waiters = pending.remove(&key).map_or(0, |load| load.waiters);
            if let Ok(value) = &outcome {
                region.put(key, value.clone());
            }
            Some(waiters)
        } else {
            None
        };
        drop(pending);

        if outcome.is_err() {
            region.counters().load_failed();
        }

        match (&outcome, waiters) {
            (Ok(_), Some(waiters)) => {
                debug!(region = region.name(), episode, waiters, "Load complete");
            }
            (Err(err), Some(waiters)) => {
                warn!(
                    region = region.name(),
                    episode,
                    waiters,
                    error = %err.cause(),
                    "Load failed, nothing cached"
                );
            }
            (_, None) => {
                debug!(
                    region = region.name(),
                    episode, "Load finished after invalidation, result not stored"
                );
            }
        }

        outcome
    }

    /// Forget a pending load that can no longer complete.
    fn abandon(&self, key: &K, episode: u64) {
        let mut pending = self.pending.lock();
        if pending.get(key).is_some_and(|load| load.episode == episode) {
            pending.remove(key);
        }
    }

    /// Detach the in-flight load for `key`, if any.
    pub(crate) fn detach(&self, key: &K) {
        self.pending.lock().remove(key);
    }

    pub(crate) fn detach_all(&self) {
        self.pending.lock().clear();
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }
}

fn spawn_load<K, V, F, Fut>(region: CacheRegion<K, V>, key: K, episode: u64, loader: F) -> SharedLoad<V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    region.counters().load_started();

    let task_region = region.clone();
    let task_key = key.clone();
    let handle = tokio::spawn(async move {
        let name = task_region.shared_name();
        let outcome = match AssertUnwindSafe(async move { loader().await })
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(LoadError::new(name, err)),
            Err(_) => Err(LoadError::new(name, anyhow::anyhow!("loader panicked"))),
        };
        task_region
            .coalescer()
            .complete(&task_region, task_key, episode, outcome)
    });

    async move {
        match handle.await {
            Ok(result) => result,
            Err(err) => {
                region.coalescer().abandon(&key, episode);
                Err(LoadError::new(
                    region.shared_name(),
                    anyhow::Error::new(err).context("load task did not complete"),
                ))
            }
        }
    }
    .boxed()
    .shared()
}
