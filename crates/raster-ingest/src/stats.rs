//! Distribution statistics over valid raster samples.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::{PixelWindow, RasterDataset};

/// Summary of the valid samples in a grid.
///
/// An all-zero summary with `count == 0` means no valid samples; this is a
/// normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

impl DistributionSummary {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn median(&self) -> f64 {
        self.p50
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}

/// Summarize every valid sample of the dataset.
pub fn summarize(dataset: &RasterDataset) -> DistributionSummary {
    let summary = summarize_values(dataset.valid_values());
    debug!(
        width = dataset.width(),
        height = dataset.height(),
        valid = summary.count,
        min = summary.min,
        max = summary.max,
        "Summarized raster"
    );
    summary
}

/// Summarize the valid samples inside a pixel window.
pub fn summarize_window(dataset: &RasterDataset, window: PixelWindow) -> DistributionSummary {
    summarize_values(
        dataset
            .window_values(window)
            .filter(|v| dataset.is_valid_value(*v)),
    )
}

/// Summarize already-filtered samples. NaN and infinite values are still
/// skipped.
pub fn summarize_values<I>(values: I) -> DistributionSummary
where
    I: IntoIterator<Item = f64>,
{
    let mut valid: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if valid.is_empty() {
        return DistributionSummary::default();
    }

    let n = valid.len();
    let (mut min, mut max, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
    for &v in &valid {
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }
    let mean = sum / n as f64;
    let variance = valid.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;

    // Exact percentiles: full sort with a total order
    valid.sort_unstable_by(f64::total_cmp);

    DistributionSummary {
        count: n,
        min,
        max,
        mean,
        std_dev: variance.sqrt(),
        p10: percentile_of_sorted(&valid, 0.10),
        p50: percentile_of_sorted(&valid, 0.50),
        p90: percentile_of_sorted(&valid, 0.90),
    }
}

/// Value at index `floor(n * p)`, clamped to `[0, n - 1]`.
///
/// Returns 0.0 for an empty slice.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (sorted.len() as f64 * p).floor();
    let idx = if idx.is_nan() || idx < 0.0 {
        0
    } else {
        (idx as usize).min(sorted.len() - 1)
    };
    sorted[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_index_clamping() {
        let sorted = [1.0, 2.0, 3.0];
        assert_eq!(percentile_of_sorted(&sorted, 0.0), 1.0);
        assert_eq!(percentile_of_sorted(&sorted, 0.5), 2.0);
        assert_eq!(percentile_of_sorted(&sorted, 1.0), 3.0);
        assert_eq!(percentile_of_sorted(&sorted, 7.5), 3.0);
        assert_eq!(percentile_of_sorted(&sorted, -1.0), 1.0);
        assert_eq!(percentile_of_sorted(&[], 0.5), 0.0);
    }

    #[test]
    fn test_single_value() {
        let summary = summarize_values([4.0]);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.range(), (4.0, 4.0));
        assert_eq!(summary.p10, 4.0);
        assert_eq!(summary.p90, 4.0);
        assert_eq!(summary.std_dev, 0.0);
    }

    #[test]
    fn test_nan_is_skipped_even_without_sentinel() {
        let summary = summarize_values([f64::NAN, 2.0, 4.0]);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean, 3.0);
        assert_eq!(summary.std_dev, 1.0);
    }

    #[test]
    fn test_window_summary() {
        let ds = RasterDataset::new(3, 2, vec![1.0, 2.0, 3.0, 4.0, -1.0, 6.0], Some(-1.0)).unwrap();
        let summary = summarize_window(&ds, PixelWindow::new(1, 0, 2, 2));
        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 6.0);
    }
}
