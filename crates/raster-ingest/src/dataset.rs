//! Decoded raster grids.

use heatmap_common::{BoundingBox, CrsDescriptor, DecodeError};
use serde::{Deserialize, Serialize};

use crate::decoder::DecodedRaster;

/// Affine placement of a north-up grid: the world coordinate of the top-left
/// corner of pixel (0, 0) and the size of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Positive; rows advance toward decreasing y.
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Fractional (col, row) of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (self.origin_y - y) / self.pixel_height,
        )
    }

    /// World coordinate of the top-left corner of a pixel.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y - row * self.pixel_height,
        )
    }
}

/// A rectangular block of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelWindow {
    pub col_off: usize,
    pub row_off: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn new(col_off: usize, row_off: usize, width: usize, height: usize) -> Self {
        Self {
            col_off,
            row_off,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clip to a `width x height` grid.
    pub fn clip(&self, width: usize, height: usize) -> PixelWindow {
        let col_off = self.col_off.min(width);
        let row_off = self.row_off.min(height);
        PixelWindow {
            col_off,
            row_off,
            width: self.width.min(width - col_off),
            height: self.height.min(height - row_off),
        }
    }
}

/// One band of decoded samples plus its metadata. Immutable once built.
#[derive(Debug, Clone)]
pub struct RasterDataset {
    width: usize,
    height: usize,
    values: Vec<f64>,
    no_data: Option<f64>,
    crs: CrsDescriptor,
    declared_range: Option<(f64, f64)>,
    geo_transform: Option<GeoTransform>,
    observed: Option<(f64, f64)>,
}

impl RasterDataset {
    pub fn new(
        width: usize,
        height: usize,
        values: Vec<f64>,
        no_data: Option<f64>,
    ) -> Result<Self, DecodeError> {
        if width.checked_mul(height) != Some(values.len()) {
            return Err(DecodeError::malformed(format!(
                "grid of {}x{} does not match {} samples",
                width,
                height,
                values.len()
            )));
        }

        let mut dataset = Self {
            width,
            height,
            values,
            no_data,
            crs: CrsDescriptor::Unknown,
            declared_range: None,
            geo_transform: None,
            observed: None,
        };
        dataset.observed = dataset.scan_range();
        Ok(dataset)
    }

    /// Build from decoder output. Only the first band is used.
    pub fn from_decoded(decoded: DecodedRaster) -> Result<Self, DecodeError> {
        let DecodedRaster {
            width,
            height,
            bands,
            no_data,
            crs,
            declared_range,
            geo_transform,
        } = decoded;

        let first = bands.into_iter().next().ok_or(DecodeError::NoBands)?;
        let mut dataset = Self::new(width, height, first, no_data)?;
        dataset.crs = crs;
        dataset.declared_range = declared_range;
        dataset.geo_transform = geo_transform;
        Ok(dataset)
    }

    pub fn with_crs(mut self, crs: CrsDescriptor) -> Self {
        self.crs = crs;
        self
    }

    pub fn with_geo_transform(mut self, transform: GeoTransform) -> Self {
        self.geo_transform = Some(transform);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn no_data(&self) -> Option<f64> {
        self.no_data
    }

    pub fn crs(&self) -> &CrsDescriptor {
        &self.crs
    }

    pub fn declared_range(&self) -> Option<(f64, f64)> {
        self.declared_range
    }

    pub fn geo_transform(&self) -> Option<&GeoTransform> {
        self.geo_transform.as_ref()
    }

    /// True for finite samples other than the no-data sentinel. NaN and
    /// infinities are non-numeric and never valid.
    #[inline]
    pub fn is_valid_value(&self, value: f64) -> bool {
        value.is_finite() && self.no_data != Some(value)
    }

    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied().filter(|v| self.is_valid_value(*v))
    }

    /// Observed `(min, max)` over valid samples; `None` when there are none.
    pub fn observed_range(&self) -> Option<(f64, f64)> {
        self.observed
    }

    pub fn observed_min(&self) -> f64 {
        self.observed.map(|(min, _)| min).unwrap_or(0.0)
    }

    pub fn observed_max(&self) -> f64 {
        self.observed.map(|(_, max)| max).unwrap_or(0.0)
    }

    fn scan_range(&self) -> Option<(f64, f64)> {
        self.valid_values().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((min, max)) => Some((min.min(v), max.max(v))),
        })
    }

    /// Raw sample at (col, row), including no-data.
    pub fn value(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }

    /// Sample at (col, row) if it is a valid measurement.
    pub fn valid_value(&self, col: usize, row: usize) -> Option<f64> {
        self.value(col, row).filter(|v| self.is_valid_value(*v))
    }

    pub fn full_window(&self) -> PixelWindow {
        PixelWindow::new(0, 0, self.width, self.height)
    }

    /// Iterate the samples of a window (clipped to the grid), row by row.
    pub fn window_values(&self, window: PixelWindow) -> impl Iterator<Item = f64> + '_ {
        let window = window.clip(self.width, self.height);
        (window.row_off..window.row_off + window.height).flat_map(move |row| {
            let start = row * self.width + window.col_off;
            self.values[start..start + window.width].iter().copied()
        })
    }

    /// Native-CRS extent of the grid, when georeferenced.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let gt = self.geo_transform?;
        let (max_x, min_y) = gt.pixel_to_world(self.width as f64, self.height as f64);
        Some(BoundingBox::new(gt.origin_x, min_y, max_x, gt.origin_y))
    }

    /// Pixel window covering a native-CRS bbox. `None` when the raster is not
    /// georeferenced or the bbox misses it.
    pub fn window_for_bbox(&self, bbox: &BoundingBox) -> Option<PixelWindow> {
        let gt = self.geo_transform?;
        let overlap = self.bounds()?.intersection(bbox)?;

        let (col_start, row_start) = gt.world_to_pixel(overlap.min_x, overlap.max_y);
        let (col_end, row_end) = gt.world_to_pixel(overlap.max_x, overlap.min_y);

        let col_off = col_start.floor().max(0.0) as usize;
        let row_off = row_start.floor().max(0.0) as usize;
        let col_end = (col_end.ceil() as usize).min(self.width);
        let row_end = (row_end.ceil() as usize).min(self.height);

        let window = PixelWindow::new(
            col_off,
            row_off,
            col_end.saturating_sub(col_off),
            row_end.saturating_sub(row_off),
        );
        (!window.is_empty()).then_some(window)
    }

    /// Valid sample under a native-CRS coordinate.
    pub fn sample_at(&self, x: f64, y: f64) -> Option<f64> {
        let gt = self.geo_transform?;
        let (col, row) = gt.world_to_pixel(x, y);
        if col < 0.0 || row < 0.0 {
            return None;
        }
        self.valid_value(col.floor() as usize, row.floor() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn georeferenced() -> RasterDataset {
        // 4x3 grid, 1 unit pixels, top-left at (100, 50)
        let values = (0..12).map(|v| v as f64).collect();
        RasterDataset::new(4, 3, values, Some(5.0))
            .unwrap()
            .with_geo_transform(GeoTransform::new(100.0, 50.0, 1.0, 1.0))
    }

    #[test]
    fn test_rejects_wrong_sample_count() {
        let err = RasterDataset::new(3, 3, vec![0.0; 8], None).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_observed_range_skips_sentinels() {
        let ds = RasterDataset::new(2, 2, vec![-9999.0, 3.0, f64::NAN, -1.5], Some(-9999.0)).unwrap();
        assert_eq!(ds.observed_range(), Some((-1.5, 3.0)));
        assert_eq!(ds.valid_values().count(), 2);
    }

    #[test]
    fn test_all_invalid_has_no_range() {
        let ds = RasterDataset::new(2, 1, vec![0.0, 0.0], Some(0.0)).unwrap();
        assert_eq!(ds.observed_range(), None);
        assert_eq!(ds.observed_min(), 0.0);
        assert_eq!(ds.observed_max(), 0.0);
    }

    #[test]
    fn test_from_decoded_requires_a_band() {
        let mut decoded = DecodedRaster::single_band(1, 1, vec![1.0], None);
        decoded.bands.clear();
        assert_eq!(
            RasterDataset::from_decoded(decoded).unwrap_err(),
            DecodeError::NoBands
        );
    }

    #[test]
    fn test_bounds_and_sampling() {
        let ds = georeferenced();
        assert_eq!(ds.bounds(), Some(BoundingBox::new(100.0, 47.0, 104.0, 50.0)));

        // Pixel (1, 0) holds 1.0
        assert_eq!(ds.sample_at(101.5, 49.5), Some(1.0));
        // Pixel (1, 1) holds the no-data value 5.0
        assert_eq!(ds.sample_at(101.5, 48.5), None);
        assert_eq!(ds.sample_at(99.0, 49.5), None);
    }

    #[test]
    fn test_window_for_bbox() {
        let ds = georeferenced();
        let window = ds
            .window_for_bbox(&BoundingBox::new(101.2, 47.5, 102.8, 49.9))
            .unwrap();
        assert_eq!(window, PixelWindow::new(1, 0, 2, 3));

        let values: Vec<f64> = ds.window_values(window).collect();
        assert_eq!(values, vec![1.0, 2.0, 5.0, 6.0, 9.0, 10.0]);

        assert!(ds
            .window_for_bbox(&BoundingBox::new(0.0, 0.0, 10.0, 10.0))
            .is_none());
    }

    #[test]
    fn test_window_clip() {
        let window = PixelWindow::new(3, 2, 10, 10).clip(4, 3);
        assert_eq!(window, PixelWindow::new(3, 2, 1, 1));
        assert!(PixelWindow::new(5, 0, 1, 1).clip(4, 3).is_empty());
    }
}
