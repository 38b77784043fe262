//! Raster ingestion: byte validation, GeoTIFF decoding, source fetching and
//! value statistics.
//!
//! # Pipeline
//!
//! ```text
//! SourceFetcher -> FormatValidator -> RasterDecoder -> RasterDataset -> summarize
//! ```
//!
//! Validation always runs before decoding, so an HTML error page or an empty
//! body never reaches the decoder. Datasets are immutable once built and are
//! safe to share across tasks.

pub mod classes;
pub mod config;
pub mod dataset;
pub mod decoder;
pub mod format;
pub mod geotiff;
pub mod source;
pub mod stats;

use heatmap_common::LoadResult;

// Re-exports
pub use classes::{
    class_distribution, classify, heat_island_bands, ClassBand, ClassCount, ClassDistribution,
};
pub use config::{ConfigError, IngestConfig, DEFAULT_MAX_PIXELS};
pub use dataset::{GeoTransform, PixelWindow, RasterDataset};
pub use decoder::{DecodedRaster, RasterDecoder};
pub use format::{ByteOrder, FormatValidator};
pub use geotiff::GeoTiffDecoder;
pub use source::{DefaultFetcher, FileFetcher, HttpFetcher, SourceFetcher};
pub use stats::{summarize, summarize_values, summarize_window, DistributionSummary};

/// Validate and decode an in-memory container into a dataset.
pub fn open_raster(
    bytes: &[u8],
    validator: &FormatValidator,
    decoder: &dyn RasterDecoder,
) -> LoadResult<RasterDataset> {
    let byte_order = validator.validate(bytes)?;
    let decoded = decoder.decode(bytes, byte_order)?;
    Ok(RasterDataset::from_decoded(decoded)?)
}
