//! Class breakdowns for pre-classified rasters.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dataset::RasterDataset;

/// One class of a classification scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassBand {
    pub label: String,
    /// Inclusive lower bound. `None` means unbounded below.
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub description: String,
}

impl ClassBand {
    pub fn new(label: impl Into<String>, lower: Option<f64>, description: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            lower,
            description: description.into(),
        }
    }
}

/// Low / moderate / high heat-island intensity bands.
pub fn heat_island_bands() -> Vec<ClassBand> {
    vec![
        ClassBand::new("Low", None, "Acts as a cooling or neutral zone"),
        ClassBand::new("Moderate", Some(5.0), "Potential heat accumulation zone"),
        ClassBand::new("High", Some(10.0), "Urban heat hotspot requiring mitigation"),
    ]
}

/// Index of the band a value belongs to: the highest band whose lower bound
/// is `<= value`. The first band also absorbs anything below every bound.
///
/// `bands` must be ordered low to high. Returns `None` for an empty scheme.
pub fn classify_index(bands: &[ClassBand], value: f64) -> Option<usize> {
    if bands.is_empty() {
        return None;
    }
    let idx = bands
        .iter()
        .rposition(|band| band.lower.map_or(true, |lower| value >= lower))
        .unwrap_or(0);
    Some(idx)
}

pub fn classify(bands: &[ClassBand], value: f64) -> Option<&ClassBand> {
    classify_index(bands, value).map(|idx| &bands[idx])
}

/// Pixel counts for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCount {
    pub label: String,
    pub count: usize,
    /// Share of valid pixels, rounded to two decimals.
    pub percentage: f64,
}

/// How valid pixels spread across a classification scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDistribution {
    pub classes: Vec<ClassCount>,
    /// Label of the most populated class; ties go to the lower class.
    pub dominant: Option<String>,
    /// Weighted score in `[0, 1]`: band `i` of `k` weighs `i / (k - 1)`.
    /// Rounded to three decimals.
    pub severity_index: f64,
    pub total_pixels: usize,
}

pub fn class_distribution(dataset: &RasterDataset, bands: &[ClassBand]) -> ClassDistribution {
    class_distribution_of(dataset.valid_values(), bands)
}

/// Distribution over already-filtered samples; non-finite values are skipped.
pub fn class_distribution_of<I>(values: I, bands: &[ClassBand]) -> ClassDistribution
where
    I: IntoIterator<Item = f64>,
{
    let mut counts = vec![0usize; bands.len()];
    let mut total = 0usize;

    for value in values.into_iter().filter(|v| v.is_finite()) {
        if let Some(idx) = classify_index(bands, value) {
            counts[idx] += 1;
            total += 1;
        }
    }

    let classes: Vec<ClassCount> = bands
        .iter()
        .zip(&counts)
        .map(|(band, &count)| ClassCount {
            label: band.label.clone(),
            count,
            percentage: if total == 0 {
                0.0
            } else {
                round_to(count as f64 / total as f64 * 100.0, 2)
            },
        })
        .collect();

    let dominant = if total == 0 {
        None
    } else {
        let mut best = 0;
        for (idx, &count) in counts.iter().enumerate() {
            if count > counts[best] {
                best = idx;
            }
        }
        Some(bands[best].label.clone())
    };

    let severity_index = if total == 0 || bands.len() < 2 {
        0.0
    } else {
        let steps = (bands.len() - 1) as f64;
        let weighted: f64 = counts
            .iter()
            .enumerate()
            .map(|(idx, &count)| count as f64 * idx as f64 / steps)
            .sum();
        round_to(weighted / total as f64, 3)
    };

    let distribution = ClassDistribution {
        classes,
        dominant,
        severity_index,
        total_pixels: total,
    };

    info!(
        total = distribution.total_pixels,
        dominant = ?distribution.dominant,
        severity = distribution.severity_index,
        "Class distribution computed"
    );

    distribution
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
