//! Fetch, validate, decode and bind a layer.

use std::sync::Arc;
use std::time::Instant;

use colormap::MappingPolicy;
use heatmap_common::{LayerKey, LoadError, LoadResult, SourceLocator};
use raster_ingest::{
    open_raster, DefaultFetcher, FormatValidator, GeoTiffDecoder, IngestConfig, RasterDataset,
    RasterDecoder, SourceFetcher,
};
use tracing::{debug, info, instrument};

use crate::binding::LayerBinding;
use crate::cache::LayerCache;

/// Loads layers from source locators.
///
/// Decoding and statistics are CPU-bound and run on Tokio's blocking pool
/// unless `decode_on_blocking_pool` is off.
#[derive(Clone)]
pub struct RasterLoader {
    fetcher: Arc<dyn SourceFetcher>,
    decoder: Arc<dyn RasterDecoder>,
    validator: FormatValidator,
    blocking_decode: bool,
}

impl std::fmt::Debug for RasterLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterLoader")
            .field("validator", &self.validator)
            .field("blocking_decode", &self.blocking_decode)
            .finish_non_exhaustive()
    }
}

impl RasterLoader {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        decoder: Arc<dyn RasterDecoder>,
        config: &IngestConfig,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            validator: FormatValidator::from_config(config),
            blocking_decode: config.decode_on_blocking_pool,
        }
    }

    /// File/HTTP fetching with the GeoTIFF decoder.
    pub fn from_config(config: &IngestConfig) -> LoadResult<Self> {
        let fetcher = DefaultFetcher::new(config)?;
        Ok(Self::new(Arc::new(fetcher), Arc::new(GeoTiffDecoder::from_config(config)), config))
    }

    /// Fetch and decode a dataset.
    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn load_dataset(&self, locator: &SourceLocator) -> LoadResult<RasterDataset> {
        let bytes = self.fetcher.fetch(locator).await?;
        debug!(bytes = bytes.len(), "Fetched source");

        let decoder = Arc::clone(&self.decoder);
        let validator = self.validator;
        self.run_cpu(move || open_raster(&bytes, &validator, decoder.as_ref()))
            .await
    }

    /// Fetch, decode, summarize and bind to a fresh scale.
    pub async fn load_binding(&self, key: &LayerKey, policy: &MappingPolicy) -> LoadResult<LayerBinding> {
        let started = Instant::now();
        let bytes = self.fetcher.fetch(&key.locator()).await?;

        let decoder = Arc::clone(&self.decoder);
        let validator = self.validator;
        let policy = policy.clone();
        let binding_key = key.clone();
        let binding = self
            .run_cpu(move || {
                let dataset = open_raster(&bytes, &validator, decoder.as_ref())?;
                Ok(LayerBinding::new(binding_key, dataset, &policy))
            })
            .await?;

        info!(
            key = %key,
            width = binding.dataset().width(),
            height = binding.dataset().height(),
            valid = binding.summary().count,
            min = binding.summary().min,
            max = binding.summary().max,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded layer"
        );
        Ok(binding)
    }

    /// Load through `cache`, so concurrent requests for one key share a
    /// single fetch and decode.
    pub async fn load_cached(
        &self,
        cache: &LayerCache,
        key: LayerKey,
        policy: MappingPolicy,
        opacity: f32,
    ) -> LoadResult<Arc<LayerBinding>> {
        let loader = self.clone();
        let load_key = key.clone();
        cache
            .get_or_load(key, move || async move {
                loader
                    .load_binding(&load_key, &policy)
                    .await
                    .map(|binding| binding.with_opacity(opacity))
            })
            .await
    }

    async fn run_cpu<T, F>(&self, work: F) -> LoadResult<T>
    where
        F: FnOnce() -> LoadResult<T> + Send + 'static,
        T: Send + 'static,
    {
        if !self.blocking_decode {
            return work();
        }
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| LoadError::Interrupted(format!("decode task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatmap_common::DecodeError;
    use raster_ingest::{ByteOrder, DecodedRaster};

    fn two_pixels(_: &[u8], _: ByteOrder) -> Result<DecodedRaster, DecodeError> {
        Ok(DecodedRaster::single_band(2, 1, vec![1.0, 3.0], None))
    }

    #[tokio::test]
    async fn test_decoder_closure_and_inline_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.tif");
        let mut bytes = b"II*\0".to_vec();
        bytes.resize(300, 0);
        std::fs::write(&path, &bytes).unwrap();

        let config = IngestConfig {
            decode_on_blocking_pool: false,
            ..IngestConfig::default()
        };
        let loader = RasterLoader::new(
            Arc::new(raster_ingest::FileFetcher),
            Arc::new(two_pixels),
            &config,
        );

        let dataset = loader
            .load_dataset(&SourceLocator::Path(path))
            .await
            .unwrap();
        assert_eq!(dataset.observed_range(), Some((1.0, 3.0)));
    }
}
