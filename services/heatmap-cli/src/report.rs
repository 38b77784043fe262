//! Command results, printable as text or JSON.

use std::fmt;

use chrono::{DateTime, Utc};
use heatmap_common::{BoundingBox, PixelColor};
use raster_ingest::{ClassDistribution, DistributionSummary};
use serde::Serialize;

/// Outcome of `validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateReport {
    pub source: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    /// Pixels that are neither no-data nor non-numeric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_pixels: Option<usize>,
    /// Machine-readable failure category, e.g. `markup_response`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl fmt::Display for ValidateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid {
            writeln!(f, "OK        {}", self.source)?;
            if let (Some(w), Some(h)) = (self.width, self.height) {
                writeln!(f, "  grid:   {} x {} ({})", w, h, self.crs.as_deref().unwrap_or("unknown"))?;
            }
            if let Some(count) = self.valid_pixels {
                writeln!(f, "  valid:  {}", count)?;
            }
        } else {
            writeln!(f, "INVALID   {}", self.source)?;
            if let Some(category) = &self.category {
                writeln!(f, "  reason: {}", category)?;
            }
            if let Some(error) = &self.error {
                writeln!(f, "  detail: {}", error)?;
            }
        }
        Ok(())
    }
}

/// How the layer's scale was calibrated.
#[derive(Debug, Clone, Serialize)]
pub struct ScaleInfo {
    pub policy: String,
    pub domain: Option<(f64, f64)>,
    pub threshold: Option<f64>,
    pub always_transparent: bool,
}

/// Outcome of `inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    pub source: String,
    pub preset: String,
    pub width: usize,
    pub height: usize,
    pub crs: String,
    pub no_data: Option<f64>,
    pub bounds: Option<BoundingBox>,
    pub declared_range: Option<(f64, f64)>,
    pub summary: DistributionSummary,
    pub scale: ScaleInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<ClassDistribution>,
    pub generated_at: DateTime<Utc>,
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.source)?;
        writeln!(f, "  grid:      {} x {} ({})", self.width, self.height, self.crs)?;
        if let Some(nd) = self.no_data {
            writeln!(f, "  no-data:   {}", nd)?;
        }
        if let Some(b) = &self.bounds {
            writeln!(f, "  bounds:    {},{},{},{}", b.min_x, b.min_y, b.max_x, b.max_y)?;
        }

        let s = &self.summary;
        if s.is_empty() {
            writeln!(f, "  valid:     0 (layer renders transparent)")?;
        } else {
            writeln!(f, "  valid:     {}", s.count)?;
            writeln!(f, "  range:     {:.4} .. {:.4}", s.min, s.max)?;
            writeln!(f, "  mean:      {:.4} (sd {:.4})", s.mean, s.std_dev)?;
            writeln!(f, "  p10/50/90: {:.4} / {:.4} / {:.4}", s.p10, s.p50, s.p90)?;
        }

        write!(f, "  scale:     {} [{}]", self.scale.policy, self.preset)?;
        if let Some(t) = self.scale.threshold {
            write!(f, ", hidden below {:.4}", t)?;
        }
        writeln!(f)?;

        if let Some(classes) = &self.classes {
            writeln!(f, "  classes:")?;
            for class in &classes.classes {
                writeln!(
                    f,
                    "    {:<10} {:>8} {:>7.2}%",
                    class.label, class.count, class.percentage
                )?;
            }
            if let Some(dominant) = &classes.dominant {
                writeln!(f, "  dominant:  {}", dominant)?;
            }
            writeln!(f, "  severity:  {:.3}", classes.severity_index)?;
        }
        Ok(())
    }
}

/// One raw value and the color the layer gives it.
#[derive(Debug, Clone, Serialize)]
pub struct ColorizedValue {
    pub value: f64,
    /// `None` when the pixel is not drawn.
    pub color: Option<String>,
    pub rgba: [u8; 4],
}

impl ColorizedValue {
    pub fn new(value: f64, color: PixelColor) -> Self {
        Self {
            value,
            color: color.color().map(|c| c.to_hex()),
            rgba: color.to_rgba_bytes(),
        }
    }
}

/// Outcome of `colorize`.
#[derive(Debug, Clone, Serialize)]
pub struct ColorizeReport {
    pub source: String,
    pub preset: String,
    pub opacity: f32,
    pub values: Vec<ColorizedValue>,
}

impl fmt::Display for ColorizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{}], opacity {}", self.source, self.preset, self.opacity)?;
        for entry in &self.values {
            writeln!(
                f,
                "  {:>12} -> {}",
                entry.value,
                entry.color.as_deref().unwrap_or("transparent")
            )?;
        }
        Ok(())
    }
}
