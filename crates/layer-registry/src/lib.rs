//! Layer registry: per-layer color bindings and a single-flight cache.
//!
//! A [`LayerBinding`] pairs one decoded dataset with a color scale calibrated
//! to that dataset's own range, so two layers never share normalization
//! state. The [`LayerCache`] makes sure each source is fetched and decoded
//! at most once however many requests arrive for it at the same time.
//!
//! ```ignore
//! let cache = LayerCache::new();
//! let loader = RasterLoader::from_config(&IngestConfig::from_env())?;
//! let binding = loader
//!     .load_cached(&cache, LayerKey::new("data/lst.tif"), preset.policy.clone(), preset.opacity)
//!     .await?;
//! let rgba = binding.pixel_to_color(31.5).to_rgba_bytes();
//! ```

pub mod binding;
pub mod cache;
pub mod loader;

pub use binding::{make_binding, LayerBinding};
pub use cache::{CacheStats, LayerCache, LayerState};
pub use loader::RasterLoader;
