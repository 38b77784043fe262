//! Tests for GeoTIFF decoding through the validator and decoder.

use heatmap_common::{CrsDescriptor, DecodeError, FormatError, LoadError};
use raster_ingest::{open_raster, FormatValidator, GeoTiffDecoder, RasterDataset};
use test_utils::{create_test_grid, fixtures, GeoTiffBuilder, SampleType};

fn open(bytes: &[u8]) -> Result<RasterDataset, LoadError> {
    open_raster(bytes, &FormatValidator::default(), &GeoTiffDecoder::default())
}

/// Little-endian TIFF with a single IFD of inline LONG entries, zero-padded
/// to `len` bytes.
fn hand_built_tiff(entries: &[(u16, u32)], len: usize) -> Vec<u8> {
    let mut bytes = b"II".to_vec();
    bytes.extend_from_slice(&42u16.to_le_bytes());
    bytes.extend_from_slice(&8u32.to_le_bytes());
    bytes.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for &(tag, value) in entries {
        bytes.extend_from_slice(&tag.to_le_bytes());
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.resize(len, 0);
    bytes
}

/// Single-strip f32 image header.
fn f32_strip_header(width: u32, height: u32, offset: u32, byte_count: u32) -> Vec<(u16, u32)> {
    vec![
        (256, width),
        (257, height),
        (258, 32),
        (273, offset),
        (279, byte_count),
        (339, 3),
    ]
}

fn assert_malformed(err: LoadError) {
    assert!(
        matches!(err, LoadError::Decode(DecodeError::Malformed(_))),
        "expected a malformed-file error, got {:?}",
        err
    );
    assert!(err.is_bad_file());
    assert_eq!(err.category(), "decode_failed");
}

// ============================================================================
// Layouts
// ============================================================================

#[test]
fn test_single_strip_f32() {
    let values = create_test_grid(5, 4);
    let bytes = GeoTiffBuilder::new(5, 4, values.clone()).build();
    let ds = open(&bytes).unwrap();

    assert_eq!((ds.width(), ds.height()), (5, 4));
    assert_eq!(ds.values(), values.as_slice());
    assert_eq!(ds.no_data(), None);
    assert_eq!(ds.crs(), &CrsDescriptor::Unknown);
}

#[test]
fn test_multiple_strips_with_short_last_strip() {
    let values = create_test_grid(3, 5);
    let bytes = GeoTiffBuilder::new(3, 5, values.clone())
        .rows_per_strip(2)
        .build();
    let ds = open(&bytes).unwrap();
    assert_eq!(ds.values(), values.as_slice());
}

#[test]
fn test_tiles_with_edge_padding() {
    let values = create_test_grid(5, 3);
    let bytes = GeoTiffBuilder::new(5, 3, values.clone()).tiled(2, 2).build();
    let ds = open(&bytes).unwrap();
    assert_eq!(ds.values(), values.as_slice());
}

#[test]
fn test_big_endian_matches_little_endian() {
    let values = create_test_grid(4, 4);
    let le = open(&GeoTiffBuilder::new(4, 4, values.clone()).build()).unwrap();
    let be = open(&GeoTiffBuilder::new(4, 4, values.clone()).big_endian().build()).unwrap();
    assert_eq!(le.values(), be.values());
}

#[test]
fn test_deflate_strips_and_tiles() {
    let values = create_test_grid(6, 5);
    let strips = GeoTiffBuilder::new(6, 5, values.clone())
        .rows_per_strip(2)
        .deflate()
        .build();
    assert_eq!(open(&strips).unwrap().values(), values.as_slice());

    let tiles = GeoTiffBuilder::new(6, 5, values.clone())
        .tiled(4, 4)
        .deflate()
        .big_endian()
        .build();
    assert_eq!(open(&tiles).unwrap().values(), values.as_slice());
}

// ============================================================================
// Sample types
// ============================================================================

#[test]
fn test_integer_sample_types() {
    let values = vec![-3.0, 0.0, 7.0, 120.0];
    for sample_type in [SampleType::I16, SampleType::I32] {
        let bytes = GeoTiffBuilder::new(2, 2, values.clone())
            .sample_type(sample_type)
            .build();
        assert_eq!(open(&bytes).unwrap().values(), values.as_slice(), "{:?}", sample_type);
    }

    let unsigned = vec![0.0, 1.0, 200.0, 255.0];
    for sample_type in [SampleType::U8, SampleType::U16] {
        let bytes = GeoTiffBuilder::new(2, 2, unsigned.clone())
            .sample_type(sample_type)
            .big_endian()
            .build();
        assert_eq!(open(&bytes).unwrap().values(), unsigned.as_slice(), "{:?}", sample_type);
    }
}

#[test]
fn test_f64_samples_are_exact() {
    let values = fixtures::lst::VALUES.to_vec();
    let bytes = GeoTiffBuilder::new(2, 2, values.clone())
        .sample_type(SampleType::F64)
        .build();
    assert_eq!(open(&bytes).unwrap().values(), values.as_slice());
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn test_nodata_is_rounded_to_f32() {
    // -9999.9 is not representable in f32; the stored samples and the
    // sentinel must still compare equal
    let bytes = GeoTiffBuilder::new(2, 1, vec![-9999.9, 12.5])
        .no_data("-9999.9")
        .build();
    let ds = open(&bytes).unwrap();

    assert_eq!(ds.no_data(), Some(-9999.9f32 as f64));
    assert_eq!(ds.valid_values().collect::<Vec<_>>(), vec![12.5]);
}

#[test]
fn test_crs_geotransform_and_declared_range() {
    let bytes = GeoTiffBuilder::new(3, 2, vec![1.0; 6])
        .epsg(fixtures::crs::EPSG_32643)
        .geo_transform(500_000.0, 2_000_000.0, 30.0, 30.0)
        .statistics(-0.97, 48.89)
        .build();
    let ds = open(&bytes).unwrap();

    assert_eq!(ds.crs(), &CrsDescriptor::Epsg(32643));
    assert_eq!(ds.declared_range(), Some((-0.97, 48.89)));
    let gt = ds.geo_transform().unwrap();
    assert_eq!((gt.origin_x, gt.origin_y), (500_000.0, 2_000_000.0));
    assert_eq!((gt.pixel_width, gt.pixel_height), (30.0, 30.0));

    let bounds = ds.bounds().unwrap();
    assert_eq!(bounds.max_x, 500_090.0);
    assert_eq!(bounds.min_y, 1_999_940.0);
}

#[test]
fn test_geographic_epsg() {
    let bytes = GeoTiffBuilder::new(1, 1, vec![0.0])
        .epsg(fixtures::crs::EPSG_4326)
        .build();
    let ds = open(&bytes).unwrap();
    assert!(ds.crs().is_geographic());
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn test_error_page_never_reaches_the_decoder() {
    let err = open(&fixtures::responses::html_error_page()).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Format(FormatError::LooksLikeMarkupError { .. })
    ));
    assert!(err.is_bad_file());
}

#[test]
fn test_png_is_invalid_magic() {
    let err = open(&fixtures::responses::png_bytes()).unwrap_err();
    assert_eq!(
        err,
        LoadError::Format(FormatError::InvalidMagicBytes {
            first: 0x89,
            second: b'P'
        })
    );
}

#[test]
fn test_truncated_file_is_malformed() {
    let bytes = GeoTiffBuilder::new(8, 8, create_test_grid(8, 8)).build();
    // Keep the header and the IFD offset but lose everything after
    let mut truncated = bytes[..300].to_vec();
    truncated.resize(300, 0);
    let err = open(&truncated).unwrap_err();
    assert!(matches!(err, LoadError::Decode(DecodeError::Malformed(_))));
}

#[test]
fn test_bigtiff_is_unsupported() {
    let mut bytes = b"II+\0".to_vec();
    bytes.resize(512, 0);
    let err = open(&bytes).unwrap_err();
    assert!(matches!(err, LoadError::Decode(DecodeError::Unsupported(_))));
}

#[test]
fn test_impossible_dimensions_are_malformed() {
    let bytes = hand_built_tiff(&f32_strip_header(u32::MAX, u32::MAX, 200, 4), 300);
    assert_malformed(open(&bytes).unwrap_err());

    let bytes = hand_built_tiff(&f32_strip_header(200_000, 200_000, 200, 4), 300);
    assert_malformed(open(&bytes).unwrap_err());
}

#[test]
fn test_pixel_limit_is_configurable() {
    let bytes = GeoTiffBuilder::new(4, 4, create_test_grid(4, 4)).build();
    let validator = FormatValidator::default();

    assert!(open_raster(&bytes, &validator, &GeoTiffDecoder::new(16)).is_ok());
    let err = open_raster(&bytes, &validator, &GeoTiffDecoder::new(15)).unwrap_err();
    assert_malformed(err);
}

#[test]
fn test_byte_count_smaller_than_the_image_is_malformed() {
    // 4x4 f32 needs 64 bytes; the strip claims 16
    let bytes = hand_built_tiff(&f32_strip_header(4, 4, 200, 16), 300);
    assert_malformed(open(&bytes).unwrap_err());
}

#[test]
fn test_strip_past_end_of_buffer_is_malformed() {
    let offset_past_end = hand_built_tiff(&f32_strip_header(2, 2, 1_000, 16), 300);
    assert_malformed(open(&offset_past_end).unwrap_err());

    let count_past_end = hand_built_tiff(&f32_strip_header(2, 2, 290, 16), 300);
    assert_malformed(open(&count_past_end).unwrap_err());

    let wrapping = hand_built_tiff(&f32_strip_header(2, 2, u32::MAX, u32::MAX), 300);
    assert_malformed(open(&wrapping).unwrap_err());
}

#[test]
fn test_hand_built_header_decodes_when_consistent() {
    let mut bytes = hand_built_tiff(&f32_strip_header(2, 2, 200, 16), 300);
    for (i, value) in [1.5f32, -2.0, 0.25, 8.0].iter().enumerate() {
        bytes[200 + i * 4..204 + i * 4].copy_from_slice(&value.to_le_bytes());
    }
    let ds = open(&bytes).unwrap();
    assert_eq!(ds.values(), &[1.5, -2.0, 0.25, 8.0]);
}
