//! Byte-level sniffing of raster containers.
//!
//! Runs before any decoding so that empty responses, HTML error pages and
//! non-TIFF payloads are rejected with a precise reason.

use heatmap_common::FormatError;
use serde::{Deserialize, Serialize};

use crate::config::IngestConfig;

/// Byte order declared by the two-byte marker at the start of the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    /// `II` (0x49 0x49)
    LittleEndian,
    /// `MM` (0x4D 0x4D)
    BigEndian,
}

impl ByteOrder {
    pub fn marker(&self) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => *b"II",
            ByteOrder::BigEndian => *b"MM",
        }
    }

    pub fn read_u16(&self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(bytes),
            ByteOrder::BigEndian => u16::from_be_bytes(bytes),
        }
    }

    pub fn read_u32(&self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
        }
    }

    pub fn read_u64(&self, bytes: [u8; 8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(bytes),
            ByteOrder::BigEndian => u64::from_be_bytes(bytes),
        }
    }
}

/// Substrings that identify an error page served in place of the raster.
const MARKUP_MARKERS: &[&str] = &[
    "<!doctype",
    "<html",
    "<head",
    "<body",
    "<title",
    "<?xml",
    "serviceexceptionreport",
    "exceptionreport",
];

/// Classifies byte buffers as raster containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatValidator {
    min_container_bytes: usize,
    markup_sniff_bytes: usize,
}

impl Default for FormatValidator {
    fn default() -> Self {
        Self::from_config(&IngestConfig::default())
    }
}

impl FormatValidator {
    pub fn new(min_container_bytes: usize, markup_sniff_bytes: usize) -> Self {
        Self {
            min_container_bytes,
            markup_sniff_bytes,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.min_container_bytes, config.markup_sniff_bytes)
    }

    pub fn min_container_bytes(&self) -> usize {
        self.min_container_bytes
    }

    /// Check size, then markup, then the byte-order marker.
    pub fn validate(&self, bytes: &[u8]) -> Result<ByteOrder, FormatError> {
        if bytes.len() < self.min_container_bytes.max(2) {
            return Err(FormatError::TooSmall {
                len: bytes.len(),
                min: self.min_container_bytes.max(2),
            });
        }

        if let Some(marker) = self.find_markup(bytes) {
            return Err(FormatError::LooksLikeMarkupError {
                marker: marker.to_string(),
            });
        }

        match [bytes[0], bytes[1]] {
            [0x49, 0x49] => Ok(ByteOrder::LittleEndian),
            [0x4D, 0x4D] => Ok(ByteOrder::BigEndian),
            [first, second] => Err(FormatError::InvalidMagicBytes { first, second }),
        }
    }

    /// Returns the first error-page marker found in a text-like prefix.
    ///
    /// The prefix only counts as text when its first non-blank character is
    /// `<`, so binary containers that embed XML metadata near the header are
    /// never misclassified.
    fn find_markup(&self, bytes: &[u8]) -> Option<&'static str> {
        let end = bytes.len().min(self.markup_sniff_bytes);
        let prefix = String::from_utf8_lossy(&bytes[..end]);
        let text = prefix.trim_start_matches('\u{feff}').trim_start();
        if !text.starts_with('<') {
            return None;
        }

        let lower = text.to_lowercase();
        MARKUP_MARKERS
            .iter()
            .copied()
            .find(|marker| lower.contains(marker))
    }
}

/// Validate with the default thresholds.
pub fn validate(bytes: &[u8]) -> Result<ByteOrder, FormatError> {
    FormatValidator::default().validate(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(prefix: &[u8], len: usize) -> Vec<u8> {
        let mut buf = prefix.to_vec();
        buf.resize(len, 0);
        buf
    }

    #[test]
    fn test_accepts_both_byte_orders() {
        assert_eq!(validate(&padded(b"II*\0", 512)), Ok(ByteOrder::LittleEndian));
        assert_eq!(validate(&padded(b"MM\0*", 512)), Ok(ByteOrder::BigEndian));
    }

    #[test]
    fn test_too_small_wins_over_other_checks() {
        for len in [0usize, 1, 2, 100, 255] {
            let buf = padded(b"<html>", len);
            assert_eq!(
                validate(&buf),
                Err(FormatError::TooSmall { len, min: 256 }),
                "len={}",
                len
            );
        }
    }

    #[test]
    fn test_html_error_page() {
        let page = format!(
            "<!DOCTYPE html><html><head><title>502 Bad Gateway</title></head><body>{}</body></html>",
            "x".repeat(400)
        );
        assert_eq!(
            validate(page.as_bytes()),
            Err(FormatError::LooksLikeMarkupError {
                marker: "<!doctype".to_string()
            })
        );
    }

    #[test]
    fn test_ogc_exception_report() {
        let body = format!(
            "  <?xml version=\"1.0\"?><ows:ExceptionReport>{}</ows:ExceptionReport>",
            " ".repeat(300)
        );
        assert!(matches!(
            validate(body.as_bytes()),
            Err(FormatError::LooksLikeMarkupError { .. })
        ));
    }

    #[test]
    fn test_invalid_magic_carries_observed_bytes() {
        let png = padded(&[0x89, 0x50, 0x4E, 0x47], 300);
        assert_eq!(
            validate(&png),
            Err(FormatError::InvalidMagicBytes {
                first: 0x89,
                second: 0x50
            })
        );

        // Mixed pair is not a valid marker
        let mixed = padded(b"IM", 300);
        assert_eq!(
            validate(&mixed),
            Err(FormatError::InvalidMagicBytes {
                first: b'I',
                second: b'M'
            })
        );
    }

    #[test]
    fn test_embedded_xml_in_binary_is_not_markup() {
        let mut buf = padded(b"II*\0", 100);
        buf.extend_from_slice(b"<GDALMetadata><Item name=\"x\">1</Item></GDALMetadata><?xml");
        buf.resize(400, 0);
        assert_eq!(validate(&buf), Ok(ByteOrder::LittleEndian));
    }

    #[test]
    fn test_custom_threshold() {
        let validator = FormatValidator::new(8, 64);
        assert_eq!(validator.validate(&padded(b"MM", 8)), Ok(ByteOrder::BigEndian));
        assert!(matches!(
            validator.validate(b"MM"),
            Err(FormatError::TooSmall { len: 2, min: 8 })
        ));
    }

    #[test]
    fn test_byte_order_reads() {
        assert_eq!(ByteOrder::LittleEndian.read_u16([42, 0]), 42);
        assert_eq!(ByteOrder::BigEndian.read_u16([0, 42]), 42);
        assert_eq!(ByteOrder::BigEndian.read_u32([0, 0, 1, 0]), 256);
    }
}
