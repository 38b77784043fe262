//! Layer bindings and the per-pixel color adapter.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use colormap::{build, build_empty, ColorScale, MappingPolicy};
use heatmap_common::{LayerKey, PixelColor};
use raster_ingest::{summarize, DistributionSummary, RasterDataset};
use tracing::{debug, trace, warn};

/// Evaluated samples traced per binding.
const TRACED_SAMPLES: usize = 5;

const DEFAULT_OPACITY: f32 = 1.0;

/// One decoded dataset paired with its own color scale and display state.
///
/// The dataset and scale are owned exclusively and never change after
/// construction. Visibility and opacity are atomics so a shared
/// `Arc<LayerBinding>` can be toggled without leaving the cache.
#[derive(Debug)]
pub struct LayerBinding {
    key: LayerKey,
    dataset: RasterDataset,
    summary: DistributionSummary,
    scale: ColorScale,
    visible: AtomicBool,
    opacity: AtomicU32,
    traced: AtomicUsize,
}

impl LayerBinding {
    /// Summarize the dataset and calibrate a fresh scale to its observed
    /// range. A dataset with no valid samples gets an always-transparent
    /// scale.
    pub fn new(key: LayerKey, dataset: RasterDataset, policy: &MappingPolicy) -> Self {
        let summary = summarize(&dataset);
        let scale = if summary.is_empty() {
            warn!(
                key = %key,
                width = dataset.width(),
                height = dataset.height(),
                "Dataset has no valid samples, layer will render transparent"
            );
            build_empty(policy)
        } else {
            build(policy, summary.min, summary.max)
        };
        Self::assemble(key, dataset, summary, scale)
    }

    /// Calibrate to caller-supplied bounds instead of the observed range.
    pub fn with_bounds(
        key: LayerKey,
        dataset: RasterDataset,
        policy: &MappingPolicy,
        min: f64,
        max: f64,
    ) -> Self {
        let summary = summarize(&dataset);
        let scale = build(policy, min, max);
        Self::assemble(key, dataset, summary, scale)
    }

    fn assemble(
        key: LayerKey,
        dataset: RasterDataset,
        summary: DistributionSummary,
        scale: ColorScale,
    ) -> Self {
        debug!(
            key = %key,
            policy = scale.policy().name(),
            domain = ?scale.domain(),
            valid = summary.count,
            "Created layer binding"
        );
        Self {
            key,
            dataset,
            summary,
            scale,
            visible: AtomicBool::new(true),
            opacity: AtomicU32::new(DEFAULT_OPACITY.to_bits()),
            traced: AtomicUsize::new(0),
        }
    }

    pub fn with_opacity(self, opacity: f32) -> Self {
        self.set_opacity(opacity);
        self
    }

    pub fn key(&self) -> &LayerKey {
        &self.key
    }

    pub fn dataset(&self) -> &RasterDataset {
        &self.dataset
    }

    pub fn summary(&self) -> &DistributionSummary {
        &self.summary
    }

    pub fn scale(&self) -> &ColorScale {
        &self.scale
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    pub fn set_visible(&self, visible: bool) {
        self.visible.store(visible, Ordering::Release);
    }

    /// Flip visibility and return the new value.
    pub fn toggle_visibility(&self) -> bool {
        !self.visible.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn opacity(&self) -> f32 {
        f32::from_bits(self.opacity.load(Ordering::Acquire))
    }

    /// Clamped to `[0, 1]`; NaN becomes 0.
    pub fn set_opacity(&self, opacity: f32) {
        let opacity = if opacity.is_nan() {
            0.0
        } else {
            opacity.clamp(0.0, 1.0)
        };
        self.opacity.store(opacity.to_bits(), Ordering::Release);
    }

    /// Color for one raw sample as read from the raster.
    ///
    /// No-data and NaN are transparent before the scale is consulted.
    #[inline]
    pub fn pixel_to_color(&self, raw: f64) -> PixelColor {
        let color = if self.dataset.is_valid_value(raw) {
            self.scale.evaluate(raw)
        } else {
            PixelColor::Transparent
        };

        if self.traced.load(Ordering::Relaxed) < TRACED_SAMPLES {
            let n = self.traced.fetch_add(1, Ordering::Relaxed);
            if n < TRACED_SAMPLES {
                trace!(key = %self.key, sample = n, raw, color = %color, "Pixel sample");
            }
        }

        color
    }

    /// Write RGBA bytes for `values` into `out`, four bytes per value.
    ///
    /// Stops at the shorter of the two buffers; returns the number of
    /// non-transparent pixels written.
    pub fn colorize_into(&self, values: &[f64], out: &mut [u8]) -> usize {
        let mut drawn = 0;
        for (&raw, pixel) in values.iter().zip(out.chunks_exact_mut(4)) {
            let color = self.pixel_to_color(raw);
            if !color.is_transparent() {
                drawn += 1;
            }
            pixel.copy_from_slice(&color.to_rgba_bytes());
        }
        drawn
    }

    /// RGBA buffer for the whole grid, row-major.
    pub fn colorize(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.dataset.values().len() * 4];
        self.colorize_into(self.dataset.values(), &mut out);
        out
    }
}

/// Bind a dataset to a new scale built from `policy`.
pub fn make_binding(key: LayerKey, dataset: RasterDataset, policy: &MappingPolicy) -> LayerBinding {
    LayerBinding::new(key, dataset, policy)
}
