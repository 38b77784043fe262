//! Configuration for raster ingestion.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for validating and fetching raster sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Buffers shorter than this are rejected before any parsing. Large enough
    /// to tell a real raster from an empty or placeholder response.
    pub min_container_bytes: usize,

    /// How many leading bytes are inspected for HTML/XML error-page markers.
    pub markup_sniff_bytes: usize,

    /// Timeout for a single remote fetch, in seconds.
    pub http_timeout_secs: u64,

    /// Run decode and statistics on the blocking thread pool.
    pub decode_on_blocking_pool: bool,

    /// Largest image, in pixels, the decoder will allocate a band for.
    pub max_pixels: usize,
}

/// 16384 x 16384.
pub const DEFAULT_MAX_PIXELS: usize = 1 << 28;

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            min_container_bytes: 256,
            markup_sniff_bytes: 512,
            http_timeout_secs: 30,
            decode_on_blocking_pool: true,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ingest configuration: {0}")]
pub struct ConfigError(pub String);

impl IngestConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("HEATMAP_MIN_CONTAINER_BYTES") {
            if let Ok(bytes) = val.parse() {
                config.min_container_bytes = bytes;
            }
        }

        if let Ok(val) = std::env::var("HEATMAP_MARKUP_SNIFF_BYTES") {
            if let Ok(bytes) = val.parse() {
                config.markup_sniff_bytes = bytes;
            }
        }

        if let Ok(val) = std::env::var("HEATMAP_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.http_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("HEATMAP_BLOCKING_DECODE") {
            config.decode_on_blocking_pool = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("HEATMAP_MAX_PIXELS") {
            if let Ok(pixels) = val.parse() {
                config.max_pixels = pixels;
            }
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // The byte-order marker alone needs two bytes.
        if self.min_container_bytes < 2 {
            return Err(ConfigError("min_container_bytes must be >= 2".to_string()));
        }

        if self.markup_sniff_bytes == 0 {
            return Err(ConfigError("markup_sniff_bytes must be > 0".to_string()));
        }

        if self.http_timeout_secs == 0 {
            return Err(ConfigError("http_timeout_secs must be > 0".to_string()));
        }

        if self.max_pixels == 0 {
            return Err(ConfigError("max_pixels must be > 0".to_string()));
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = IngestConfig {
            markup_sniff_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IngestConfig {
            min_container_bytes: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: IngestConfig = serde_json::from_str(r#"{"http_timeout_secs": 5}"#).unwrap();
        assert_eq!(config.http_timeout_secs, 5);
        assert_eq!(config.min_container_bytes, 256);
        assert_eq!(config.max_pixels, DEFAULT_MAX_PIXELS);
    }

    #[test]
    fn test_validate_rejects_zero_pixel_cap() {
        let config = IngestConfig {
            max_pixels: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
