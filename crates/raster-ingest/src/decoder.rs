//! The decoder seam: validated bytes in, band grids out.

use heatmap_common::{CrsDescriptor, DecodeError};

use crate::dataset::GeoTransform;
use crate::format::ByteOrder;

/// What a decoder extracts from a raster container.
///
/// Grids are row-major, `width * height` samples per band.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRaster {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<Vec<f64>>,
    pub no_data: Option<f64>,
    pub crs: CrsDescriptor,
    /// Bounds written by the producer. Informational only; statistics are
    /// always recomputed from the samples.
    pub declared_range: Option<(f64, f64)>,
    pub geo_transform: Option<GeoTransform>,
}

impl DecodedRaster {
    /// A single-band raster with no georeferencing.
    pub fn single_band(width: usize, height: usize, values: Vec<f64>, no_data: Option<f64>) -> Self {
        Self {
            width,
            height,
            bands: vec![values],
            no_data,
            crs: CrsDescriptor::Unknown,
            declared_range: None,
            geo_transform: None,
        }
    }
}

/// Turns validated container bytes into grids.
///
/// Implementations are synchronous and CPU-bound; callers decide whether to
/// run them on a blocking pool.
pub trait RasterDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], byte_order: ByteOrder) -> Result<DecodedRaster, DecodeError>;
}

impl<F> RasterDecoder for F
where
    F: Fn(&[u8], ByteOrder) -> Result<DecodedRaster, DecodeError> + Send + Sync,
{
    fn decode(&self, bytes: &[u8], byte_order: ByteOrder) -> Result<DecodedRaster, DecodeError> {
        self(bytes, byte_order)
    }
}
