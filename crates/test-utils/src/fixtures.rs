//! Common test fixtures for heatmap pipeline tests.
//!
//! This module provides pre-defined test data that represents common
//! scenarios in raster ingestion and color mapping.

/// Land surface temperature samples in degrees Celsius.
pub mod lst {
    /// Valid samples of a small city LST scene, including a sub-zero minimum.
    pub const VALUES: [f64; 4] = [-0.97, 10.0, 30.0, 48.89];

    /// The GDAL no-data sentinel most LST exports use.
    pub const NO_DATA: f64 = -9999.0;

    /// A 3x2 grid: the four valid samples plus one no-data cell and one NaN.
    pub fn grid() -> (usize, usize, Vec<f64>) {
        (3, 2, vec![-0.97, NO_DATA, 10.0, 30.0, f64::NAN, 48.89])
    }

    /// Threshold fraction of the LST preset.
    pub const HIDE_BELOW: f64 = 0.7;
}

/// Urban heat island index samples.
pub mod uhi {
    /// Mostly low intensity with one moderate and one high reading.
    pub const VALUES: [f64; 6] = [0.4, 1.1, 2.0, 2.65, 2.67, 3.9];
}

/// Vegetation / built-up index samples in `[-1, 1]`.
pub mod index {
    pub const NDVI: [f64; 5] = [-0.2, 0.1, 0.35, 0.6, 0.85];
    pub const NDBI: [f64; 5] = [-0.5, -0.1, 0.0, 0.3, 0.7];
}

/// Non-raster payloads an upstream service may return with a 200 status.
pub mod responses {
    /// An HTML gateway error page padded past the minimum container size.
    pub fn html_error_page() -> Vec<u8> {
        format!(
            "<!DOCTYPE html>\n<html><head><title>502 Bad Gateway</title></head>\
             <body><h1>Bad Gateway</h1><p>{}</p></body></html>",
            "The upstream server returned an invalid response. ".repeat(8)
        )
        .into_bytes()
    }

    /// An OGC service exception report.
    pub fn ogc_exception_report() -> Vec<u8> {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <ows:ExceptionReport xmlns:ows=\"http://www.opengis.net/ows/1.1\">\
             <ows:Exception exceptionCode=\"NoApplicableCode\">{}</ows:Exception>\
             </ows:ExceptionReport>",
            "Layer not found. ".repeat(16)
        )
        .into_bytes()
    }

    /// A PNG signature followed by zeros.
    pub fn png_bytes() -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.resize(512, 0);
        bytes
    }
}

/// Common CRS codes.
pub mod crs {
    pub const EPSG_4326: u16 = 4326;
    /// UTM zone 43N, typical for city-scale scenes.
    pub const EPSG_32643: u16 = 32643;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lst_grid_shape() {
        let (w, h, values) = lst::grid();
        assert_eq!(values.len(), w * h);
        assert_eq!(values.iter().filter(|v| **v == lst::NO_DATA).count(), 1);
    }

    #[test]
    fn test_error_pages_exceed_minimum_size() {
        assert!(responses::html_error_page().len() > 256);
        assert!(responses::ogc_exception_report().len() > 256);
    }
}
