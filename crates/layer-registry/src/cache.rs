//! Single-flight layer cache.
//!
//! Each key moves through `Absent -> Loading -> Ready`, or back to `Absent`
//! when the load fails. Concurrent requests for a key that is `Loading`
//! subscribe to the in-flight result instead of starting a second load.
//!
//! ```text
//! get_or_load(k) ─┐
//!                 │   slots[k] = Loading(tx)     spawned task
//! get_or_load(k) ─┼─► subscribe(tx) ◄──────────── loader().await
//!                 │                                  │
//! get_or_load(k) ─┘                                  ▼
//!                                      slots[k] = Ready | (removed)
//!                                      tx.send(outcome)
//! ```
//!
//! The load runs on its own task, so a caller that stops waiting does not
//! cancel it; the result still lands in the cache for later callers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use heatmap_common::{LayerKey, LoadError};
use metrics::counter;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::binding::LayerBinding;

type LoadOutcome = Result<Arc<LayerBinding>, LoadError>;

/// Observable state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerState {
    Absent,
    Loading,
    Ready,
}

enum Slot {
    Loading { id: u64, tx: broadcast::Sender<LoadOutcome> },
    Ready(Arc<LayerBinding>),
}

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// `get_or_load` calls.
    pub requests: u64,
    /// Calls answered from a `Ready` slot.
    pub hits: u64,
    /// Calls that joined an in-flight load.
    pub coalesced: u64,
    /// Loader invocations.
    pub loads: u64,
    /// Loads that ended in an error.
    pub failures: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.requests as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    hits: AtomicU64,
    coalesced: AtomicU64,
    loads: AtomicU64,
    failures: AtomicU64,
}

struct Inner {
    slots: Mutex<HashMap<LayerKey, Slot>>,
    counters: Counters,
    next_load_id: AtomicU64,
}

/// Registry of layer bindings keyed by source identity.
///
/// Cheap to clone; clones share the same slots. Owned by the host
/// application, there is no global instance.
#[derive(Clone)]
pub struct LayerCache {
    inner: Arc<Inner>,
}

impl Default for LayerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LayerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl LayerCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: Mutex::new(HashMap::new()),
                counters: Counters::default(),
                next_load_id: AtomicU64::new(0),
            }),
        }
    }

    /// Return the binding for `key`, running `loader` only if no binding is
    /// ready and no load is in flight.
    ///
    /// Must be called from within a Tokio runtime: the loader runs on a
    /// spawned task.
    pub async fn get_or_load<F, Fut>(&self, key: LayerKey, loader: F) -> LoadOutcome
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<LayerBinding, LoadError>> + Send + 'static,
    {
        self.inner.counters.requests.fetch_add(1, Ordering::Relaxed);
        counter!("layer_cache_requests_total").increment(1);

        let mut rx = {
            let mut slots = self.inner.slots.lock().await;
            match slots.get(&key) {
                Some(Slot::Ready(binding)) => {
                    self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                    counter!("layer_cache_hits_total").increment(1);
                    return Ok(Arc::clone(binding));
                }
                Some(Slot::Loading { tx, .. }) => {
                    self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    counter!("layer_cache_coalesced_total").increment(1);
                    debug!(key = %key, waiters = tx.receiver_count() + 1, "Joining in-flight load");
                    tx.subscribe()
                }
                None => {
                    let id = self.inner.next_load_id.fetch_add(1, Ordering::Relaxed);
                    let (tx, rx) = broadcast::channel(1);
                    slots.insert(key.clone(), Slot::Loading { id, tx: tx.clone() });
                    self.inner.counters.loads.fetch_add(1, Ordering::Relaxed);
                    counter!("layer_cache_loads_total").increment(1);
                    debug!(key = %key, "Absent -> Loading");
                    self.spawn_load(key.clone(), id, tx, loader);
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(LoadError::Interrupted(format!(
                "load of {} ended without a result",
                key
            ))),
        }
    }

    fn spawn_load<F, Fut>(&self, key: LayerKey, id: u64, tx: broadcast::Sender<LoadOutcome>, loader: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<LayerBinding, LoadError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            // The inner task turns a panicking loader into an error result
            let outcome = match tokio::spawn(async move { loader().await }).await {
                Ok(Ok(binding)) => Ok(Arc::new(binding)),
                Ok(Err(e)) => Err(e),
                Err(join_error) => Err(LoadError::Interrupted(if join_error.is_panic() {
                    format!("loader for {} panicked", key)
                } else {
                    format!("loader for {} was cancelled", key)
                })),
            };

            {
                let mut slots = inner.slots.lock().await;
                // An evict/clear during the load detaches this result from
                // the cache; waiters still receive it
                let current = matches!(slots.get(&key), Some(Slot::Loading { id: slot_id, .. }) if *slot_id == id);

                match &outcome {
                    Ok(binding) => {
                        if current {
                            slots.insert(key.clone(), Slot::Ready(Arc::clone(binding)));
                        }
                        info!(
                            key = %key,
                            width = binding.dataset().width(),
                            height = binding.dataset().height(),
                            valid = binding.summary().count,
                            cached = current,
                            "Loading -> Ready"
                        );
                    }
                    Err(e) => {
                        if current {
                            slots.remove(&key);
                        }
                        inner.counters.failures.fetch_add(1, Ordering::Relaxed);
                        counter!("layer_cache_failures_total", "category" => e.category()).increment(1);
                        warn!(key = %key, error = %e, "Loading -> Absent after failure");
                    }
                }
            }

            // No receivers left is fine: every caller stopped waiting
            let _ = tx.send(outcome);
        });
    }

    pub async fn state(&self, key: &LayerKey) -> LayerState {
        match self.inner.slots.lock().await.get(key) {
            None => LayerState::Absent,
            Some(Slot::Loading { .. }) => LayerState::Loading,
            Some(Slot::Ready(_)) => LayerState::Ready,
        }
    }

    /// The ready binding for `key`, without loading.
    pub async fn get(&self, key: &LayerKey) -> Option<Arc<LayerBinding>> {
        match self.inner.slots.lock().await.get(key) {
            Some(Slot::Ready(binding)) => Some(Arc::clone(binding)),
            _ => None,
        }
    }

    /// Number of ready bindings.
    pub async fn len(&self) -> usize {
        self.inner
            .slots
            .lock()
            .await
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Keys of ready bindings, sorted.
    pub async fn keys(&self) -> Vec<LayerKey> {
        let mut keys: Vec<LayerKey> = self
            .inner
            .slots
            .lock()
            .await
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop the slot for `key`. Returns true if anything was removed.
    ///
    /// Evicting a key that is loading lets the load finish for its current
    /// waiters without caching the result.
    pub async fn evict(&self, key: &LayerKey) -> bool {
        let removed = self.inner.slots.lock().await.remove(key).is_some();
        if removed {
            counter!("layer_cache_evictions_total").increment(1);
            debug!(key = %key, "Evicted layer");
        }
        removed
    }

    /// Drop every slot. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut slots = self.inner.slots.lock().await;
        let removed = slots.len();
        slots.clear();
        info!(removed, "Cleared layer cache");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            requests: c.requests.load(Ordering::Relaxed),
            hits: c.hits.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            loads: c.loads.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colormap::MappingPolicy;
    use raster_ingest::RasterDataset;

    fn binding(key: &str) -> LayerBinding {
        let dataset = RasterDataset::new(2, 1, vec![1.0, 2.0], None).unwrap();
        LayerBinding::new(LayerKey::new(key), dataset, &MappingPolicy::threshold_gradient(0.7))
    }

    #[tokio::test]
    async fn test_ready_is_a_hit() {
        let cache = LayerCache::new();
        let key = LayerKey::new("a");

        let first = cache
            .get_or_load(key.clone(), || async { Ok::<_, LoadError>(binding("a")) })
            .await
            .unwrap();
        let second = cache
            .get_or_load(key.clone(), || async {
                Err::<LayerBinding, _>(LoadError::Interrupted("must not reload".to_string()))
            })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.state(&key).await, LayerState::Ready);
        let stats = cache.stats();
        assert_eq!((stats.requests, stats.hits, stats.loads), (2, 1, 1));
        assert_eq!(stats.hit_ratio(), 0.5);
    }

    #[tokio::test]
    async fn test_failure_returns_to_absent() {
        let cache = LayerCache::new();
        let key = LayerKey::new("broken");

        let err = cache
            .get_or_load(key.clone(), || async {
                Err::<LayerBinding, _>(LoadError::Interrupted("boom".to_string()))
            })
            .await
            .unwrap_err();
        assert_eq!(err, LoadError::Interrupted("boom".to_string()));
        assert_eq!(cache.state(&key).await, LayerState::Absent);
        assert_eq!(cache.stats().failures, 1);

        // A retry runs the loader again
        cache
            .get_or_load(key.clone(), || async { Ok::<_, LoadError>(binding("broken")) })
            .await
            .unwrap();
        assert_eq!(cache.state(&key).await, LayerState::Ready);
        assert_eq!(cache.stats().loads, 2);
    }

    #[tokio::test]
    async fn test_evict_and_clear() {
        let cache = LayerCache::new();
        for name in ["b", "a", "c"] {
            cache
                .get_or_load(LayerKey::new(name), move || async move { Ok::<_, LoadError>(binding(name)) })
                .await
                .unwrap();
        }
        assert_eq!(
            cache.keys().await,
            vec![LayerKey::new("a"), LayerKey::new("b"), LayerKey::new("c")]
        );

        assert!(cache.evict(&LayerKey::new("b")).await);
        assert!(!cache.evict(&LayerKey::new("b")).await);
        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&LayerKey::new("b")).await.is_none());

        assert_eq!(cache.clear().await, 2);
        assert!(cache.is_empty().await);
    }
}
