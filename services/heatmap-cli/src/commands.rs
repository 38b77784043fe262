//! Command implementations.
//!
//! Each command resolves its source, runs the pipeline and returns a report;
//! printing is left to the caller.

use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use heatmap_common::{LayerKey, SourceLocator};
use layer_registry::{LayerBinding, RasterLoader};
use raster_ingest::{class_distribution, heat_island_bands};
use tracing::{info, warn};

use crate::config::CliConfig;
use crate::report::{ColorizeReport, ColorizedValue, InspectReport, ScaleInfo, ValidateReport};

/// Preset whose values are heat island intensities; its layers get a class
/// breakdown by default.
const CLASSIFIED_PRESET: &str = "uhi";

/// Check that `source` is a readable raster.
///
/// Load failures are part of the report, not an `Err`; only setup problems
/// (an unusable HTTP client) are returned as errors.
pub async fn validate(config: &CliConfig, source: &str) -> Result<ValidateReport> {
    let loader = RasterLoader::from_config(&config.ingest).context("Failed to build raster loader")?;
    let outcome = loader.load_dataset(&SourceLocator::parse(source)).await;

    let mut report = ValidateReport {
        source: source.to_string(),
        valid: false,
        width: None,
        height: None,
        crs: None,
        valid_pixels: None,
        category: None,
        error: None,
    };

    match outcome {
        Ok(dataset) => {
            report.valid = true;
            report.width = Some(dataset.width());
            report.height = Some(dataset.height());
            report.crs = Some(dataset.crs().to_string());
            report.valid_pixels = Some(dataset.valid_values().count());
            info!(source, width = dataset.width(), height = dataset.height(), "Source is valid");
        }
        Err(e) => {
            warn!(source, category = e.category(), error = %e, "Source failed validation");
            report.category = Some(e.category().to_string());
            report.error = Some(e.to_string());
        }
    }
    Ok(report)
}

/// Load `source` under `preset` and describe its distribution and scale.
///
/// `classes` forces a heat island class breakdown; the `uhi` preset always
/// gets one.
pub async fn inspect(
    config: &CliConfig,
    source: &str,
    preset_id: &str,
    classes: bool,
) -> Result<InspectReport> {
    let binding = load(config, source, preset_id).await?;
    let dataset = binding.dataset();
    let scale = binding.scale();

    let classes = (classes || preset_id == CLASSIFIED_PRESET)
        .then(|| class_distribution(dataset, &heat_island_bands()));

    Ok(InspectReport {
        source: source.to_string(),
        preset: preset_id.to_string(),
        width: dataset.width(),
        height: dataset.height(),
        crs: dataset.crs().to_string(),
        no_data: dataset.no_data(),
        bounds: dataset.bounds(),
        declared_range: dataset.declared_range(),
        summary: *binding.summary(),
        scale: ScaleInfo {
            policy: scale.policy().name().to_string(),
            domain: scale.domain(),
            threshold: scale.threshold(),
            always_transparent: scale.is_always_transparent(),
        },
        classes,
        generated_at: Utc::now(),
    })
}

/// Run raw `values` through the layer's pixel adapter.
pub async fn colorize(
    config: &CliConfig,
    source: &str,
    preset_id: &str,
    values: &[f64],
) -> Result<ColorizeReport> {
    let binding = load(config, source, preset_id).await?;

    let values = values
        .iter()
        .map(|&v| ColorizedValue::new(v, binding.pixel_to_color(v)))
        .collect();

    Ok(ColorizeReport {
        source: source.to_string(),
        preset: preset_id.to_string(),
        opacity: binding.opacity(),
        values,
    })
}

async fn load(config: &CliConfig, source: &str, preset_id: &str) -> Result<LayerBinding> {
    let preset = config.preset(preset_id)?;
    let loader = RasterLoader::from_config(&config.ingest).context("Failed to build raster loader")?;

    let started = Instant::now();
    let binding = loader
        .load_binding(&LayerKey::new(source), &preset.policy)
        .await
        .with_context(|| format!("Failed to load {}", source))?
        .with_opacity(preset.opacity);

    info!(
        source,
        preset = preset_id,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Layer ready"
    );
    Ok(binding)
}
