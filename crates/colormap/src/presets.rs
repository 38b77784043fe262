//! Named layer presets.
//!
//! A preset bundles a mapping policy with display defaults for one kind of
//! raster (land surface temperature, heat island index, ...). Presets load
//! from YAML or JSON:
//!
//! ```yaml
//! version: "1"
//! presets:
//!   lst:
//!     name: Land Surface Temperature
//!     units: "°C"
//!     opacity: 0.8
//!     policy:
//!       type: threshold_gradient
//!       hide_below: 0.7
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use heatmap_common::Rgba;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::{ColorClass, MappingPolicy, PolicyError};

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("failed to read preset file {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid preset YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid preset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("preset '{name}': {source}")]
    InvalidPolicy {
        name: String,
        #[source]
        source: PolicyError,
    },

    #[error("preset '{name}': opacity {opacity} is outside [0, 1]")]
    InvalidOpacity { name: String, opacity: f32 },
}

pub type Result<T> = std::result::Result<T, PresetError>;

/// Display defaults plus the policy for one layer kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerPreset {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    pub policy: MappingPolicy,
}

fn default_opacity() -> f32 {
    0.8
}

/// A set of presets keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetConfig {
    #[serde(default)]
    pub version: Option<String>,
    pub presets: BTreeMap<String, LayerPreset>,
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PresetConfig {
    /// Presets for the four standard urban heat layers.
    pub fn builtin() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert("lst".to_string(), lst());
        presets.insert("uhi".to_string(), uhi());
        presets.insert("ndvi".to_string(), ndvi());
        presets.insert("ndbi".to_string(), ndbi());
        Self {
            version: Some("1".to_string()),
            presets,
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load by extension: `.json` is JSON, anything else YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PresetError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, preset) in &self.presets {
            preset
                .policy
                .validate()
                .map_err(|source| PresetError::InvalidPolicy {
                    name: name.clone(),
                    source,
                })?;
            if !(0.0..=1.0).contains(&preset.opacity) {
                return Err(PresetError::InvalidOpacity {
                    name: name.clone(),
                    opacity: preset.opacity,
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&LayerPreset> {
        self.presets
            .get(id)
            .ok_or_else(|| PresetError::UnknownPreset(id.to_string()))
    }

    /// Preset ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.presets.keys().map(String::as_str)
    }

    /// Add or replace presets from `other`.
    pub fn merge(&mut self, other: PresetConfig) {
        self.presets.extend(other.presets);
    }
}

/// Land surface temperature: heat ramp over the hottest 30% of the range.
pub fn lst() -> LayerPreset {
    LayerPreset {
        name: "Land Surface Temperature".to_string(),
        description: Some("Hottest surfaces in the scene".to_string()),
        units: Some("°C".to_string()),
        opacity: 0.8,
        policy: MappingPolicy::threshold_gradient(0.7),
    }
}

/// Urban heat island intensity, pre-classified.
pub fn uhi() -> LayerPreset {
    LayerPreset {
        name: "Urban Heat Island".to_string(),
        description: Some("Moderate and high heat island intensity classes".to_string()),
        units: None,
        opacity: 0.7,
        policy: MappingPolicy::discrete(vec![
            ColorClass::labeled(1.33, Rgba::opaque(0xFD, 0xAE, 0x61), "Moderate"),
            ColorClass::labeled(2.66, Rgba::opaque(0xD7, 0x19, 0x1C), "High"),
        ]),
    }
}

/// Vegetation index: four green bands over the upper 40% of the range.
pub fn ndvi() -> LayerPreset {
    LayerPreset {
        name: "Vegetation Index (NDVI)".to_string(),
        description: Some("Densest vegetation cover".to_string()),
        units: None,
        opacity: 0.7,
        policy: MappingPolicy::bucketed(
            0.6,
            [
                Rgba::opaque(0xD9, 0xF0, 0xA3),
                Rgba::opaque(0xAD, 0xDD, 0x8E),
                Rgba::opaque(0x41, 0xAB, 0x5D),
                Rgba::opaque(0x00, 0x68, 0x37),
            ],
        ),
    }
}

/// Built-up index: light to dark purple over the upper 40% of the range.
pub fn ndbi() -> LayerPreset {
    LayerPreset {
        name: "Built-up Index (NDBI)".to_string(),
        description: Some("Densest built-up surfaces".to_string()),
        units: None,
        opacity: 0.7,
        policy: MappingPolicy::two_color(
            0.6,
            Rgba::opaque(0xF2, 0xF0, 0xF7),
            Rgba::opaque(0x54, 0x27, 0x8F),
        ),
    }
}
