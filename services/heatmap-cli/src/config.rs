//! CLI configuration.

use std::path::Path;

use anyhow::{Context, Result};
use colormap::{LayerPreset, PresetConfig};
use raster_ingest::IngestConfig;
use tracing::{debug, info};

use crate::config_loader;

/// Everything a command needs: ingestion tunables plus the preset table.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub ingest: IngestConfig,
    pub presets: PresetConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            presets: PresetConfig::builtin(),
        }
    }
}

impl CliConfig {
    /// Ingest settings from the environment, presets from the built-ins and
    /// the optional preset file.
    pub fn load(presets_path: Option<&Path>) -> Result<Self> {
        let ingest = IngestConfig::from_env();
        ingest.validate().context("Invalid ingest configuration")?;
        debug!(?ingest, "Loaded ingest configuration");

        let presets = config_loader::load_presets_over_builtin(presets_path)?;
        if let Some(path) = presets_path {
            info!(
                path = %path.display(),
                presets = ?presets.ids().collect::<Vec<_>>(),
                "Loaded preset file"
            );
        }

        Ok(Self { ingest, presets })
    }

    pub fn preset(&self, id: &str) -> Result<&LayerPreset> {
        self.presets.get(id).with_context(|| {
            format!(
                "Available presets: {}",
                self.presets.ids().collect::<Vec<_>>().join(", ")
            )
        })
    }
}
