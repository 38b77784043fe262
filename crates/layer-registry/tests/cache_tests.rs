//! Concurrency tests for the single-flight layer cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use colormap::{MappingPolicy, HEAT_HIGH};
use heatmap_common::{LayerKey, LoadError, PixelColor};
use layer_registry::{make_binding, LayerBinding, LayerCache, LayerState};
use raster_ingest::RasterDataset;

fn binding(key: &str, values: Vec<f64>) -> LayerBinding {
    let n = values.len();
    let dataset = RasterDataset::new(n, 1, values, None).unwrap();
    make_binding(LayerKey::new(key), dataset, &MappingPolicy::threshold_gradient(0.0))
}

/// A loader that counts its invocations and takes `delay` to finish.
fn slow_loader(
    calls: Arc<AtomicUsize>,
    delay: Duration,
) -> impl FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<LayerBinding, LoadError>> + Send>>
       + Send
       + 'static {
    move || {
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(binding("slow", vec![0.0, 10.0]))
        })
    }
}

async fn panicking_load() -> Result<LayerBinding, LoadError> {
    panic!("decoder crashed")
}

// ============================================================================
// Single flight
// ============================================================================

#[tokio::test]
async fn test_two_concurrent_requests_share_one_load() {
    let cache = LayerCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = LayerKey::new("data/lst.tif");

    let (a, b) = tokio::join!(
        cache.get_or_load(key.clone(), slow_loader(calls.clone(), Duration::from_millis(50))),
        cache.get_or_load(key.clone(), slow_loader(calls.clone(), Duration::from_millis(50))),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stats = cache.stats();
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.coalesced, 1);
    assert_eq!(cache.state(&key).await, LayerState::Ready);
}

#[tokio::test]
async fn test_many_concurrent_requests_across_tasks() {
    let cache = LayerCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = LayerKey::new("data/uhi.tif");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = cache.clone();
            let key = key.clone();
            let loader = slow_loader(calls.clone(), Duration::from_millis(30));
            tokio::spawn(async move { cache.get_or_load(key, loader).await })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|b| Arc::ptr_eq(b, &results[0])));
    assert_eq!(cache.stats().hits + cache.stats().coalesced, 15);
}

#[tokio::test]
async fn test_distinct_keys_load_independently() {
    let cache = LayerCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
        cache.get_or_load(LayerKey::new("a.tif"), slow_loader(calls.clone(), Duration::from_millis(10))),
        cache.get_or_load(LayerKey::new("b.tif"), slow_loader(calls.clone(), Duration::from_millis(10))),
    );

    assert!(!Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len().await, 2);
}

// ============================================================================
// Failure and cancellation
// ============================================================================

#[tokio::test]
async fn test_waiters_all_see_the_failure() {
    let cache = LayerCache::new();
    let key = LayerKey::new("missing.tif");

    let failing = || async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Err::<LayerBinding, _>(LoadError::Interrupted("gone".to_string()))
    };
    let (a, b) = tokio::join!(
        cache.get_or_load(key.clone(), failing),
        cache.get_or_load(key.clone(), failing),
    );

    assert_eq!(a.unwrap_err(), b.unwrap_err());
    assert_eq!(cache.state(&key).await, LayerState::Absent);
    assert_eq!(cache.stats().failures, 1);
}

#[tokio::test]
async fn test_dropped_caller_does_not_cancel_load() {
    let cache = LayerCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = LayerKey::new("slow.tif");

    let waited = tokio::time::timeout(
        Duration::from_millis(5),
        cache.get_or_load(key.clone(), slow_loader(calls.clone(), Duration::from_millis(60))),
    )
    .await;
    assert!(waited.is_err());
    assert_eq!(cache.state(&key).await, LayerState::Loading);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(cache.state(&key).await, LayerState::Ready);

    // Later callers get the finished binding without another load
    cache
        .get_or_load(key.clone(), slow_loader(calls.clone(), Duration::from_millis(60)))
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_panicking_loader_is_interrupted() {
    let cache = LayerCache::new();
    let key = LayerKey::new("crash.tif");

    let err = cache.get_or_load(key.clone(), panicking_load).await.unwrap_err();
    assert!(matches!(err, LoadError::Interrupted(_)));
    assert_eq!(err.category(), "interrupted");
    assert_eq!(cache.state(&key).await, LayerState::Absent);

    // The cache is still usable afterwards
    cache
        .get_or_load(key.clone(), || async { Ok::<_, LoadError>(binding("crash", vec![1.0])) })
        .await
        .unwrap();
    assert_eq!(cache.state(&key).await, LayerState::Ready);
}

#[tokio::test]
async fn test_evict_while_loading_detaches_result() {
    let cache = LayerCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = LayerKey::new("evicted.tif");

    let pending = {
        let cache = cache.clone();
        let key = key.clone();
        let loader = slow_loader(calls.clone(), Duration::from_millis(40));
        tokio::spawn(async move { cache.get_or_load(key, loader).await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(cache.evict(&key).await);

    // The waiter still receives the binding
    pending.await.unwrap().unwrap();
    assert_eq!(cache.state(&key).await, LayerState::Absent);
}

// ============================================================================
// Display state and per-layer scales
// ============================================================================

#[tokio::test]
async fn test_toggling_visibility_keeps_layer_ready() {
    let cache = LayerCache::new();
    let key = LayerKey::new("lst.tif");

    let first = cache
        .get_or_load(key.clone(), || async { Ok::<_, LoadError>(binding("lst", vec![0.0, 1.0])) })
        .await
        .unwrap();
    assert!(!first.toggle_visibility());
    first.set_opacity(0.25);

    let again = cache.get(&key).await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert!(!again.is_visible());
    assert_eq!(again.opacity(), 0.25);
    assert_eq!(cache.state(&key).await, LayerState::Ready);

    assert!(again.toggle_visibility());
    assert_eq!(cache.stats().loads, 1);
}

#[tokio::test]
async fn test_layers_keep_their_own_scales() {
    let cache = LayerCache::new();

    let narrow = cache
        .get_or_load(LayerKey::new("narrow.tif"), || async {
            Ok::<_, LoadError>(binding("narrow", vec![0.0, 10.0]))
        })
        .await
        .unwrap();
    let wide = cache
        .get_or_load(LayerKey::new("wide.tif"), || async {
            Ok::<_, LoadError>(binding("wide", vec![0.0, 100.0]))
        })
        .await
        .unwrap();

    assert_eq!(narrow.pixel_to_color(10.0), PixelColor::Color(HEAT_HIGH));
    assert_ne!(wide.pixel_to_color(10.0), PixelColor::Color(HEAT_HIGH));
    // Loading the wide layer did not recalibrate the narrow one
    assert_eq!(narrow.scale().domain(), Some((0.0, 10.0)));
}
