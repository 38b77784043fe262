//! Minimal GeoTIFF decoder.
//!
//! Reads the first image (IFD 0) of a classic TIFF in either byte order and
//! extracts the first band. Supported:
//!
//! - strips or tiles, chunky or planar layout
//! - no compression or Deflate (zlib), with optional horizontal predictor
//!   for integer samples
//! - u8/i8/u16/i16/u32/i32/f32/f64 samples
//! - `GDAL_NODATA`, `GDAL_METADATA` statistics, GeoKey EPSG code and the
//!   tiepoint/pixel-scale geotransform
//!
//! BigTIFF, JPEG/LZW/packbits and the floating-point predictor are reported
//! as [`DecodeError::Unsupported`]. Headers whose dimensions exceed the pixel
//! limit, or whose chunks cannot hold the declared image, are
//! [`DecodeError::Malformed`] and are rejected before the band is allocated.

use flate2::read::ZlibDecoder;
use heatmap_common::{CrsDescriptor, DecodeError};
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

use crate::config::{IngestConfig, DEFAULT_MAX_PIXELS};
use crate::dataset::GeoTransform;
use crate::decoder::{DecodedRaster, RasterDecoder};
use crate::format::ByteOrder;

pub const TAG_IMAGE_WIDTH: u16 = 256;
pub const TAG_IMAGE_LENGTH: u16 = 257;
pub const TAG_BITS_PER_SAMPLE: u16 = 258;
pub const TAG_COMPRESSION: u16 = 259;
pub const TAG_STRIP_OFFSETS: u16 = 273;
pub const TAG_SAMPLES_PER_PIXEL: u16 = 277;
pub const TAG_ROWS_PER_STRIP: u16 = 278;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 279;
pub const TAG_PLANAR_CONFIGURATION: u16 = 284;
pub const TAG_PREDICTOR: u16 = 317;
pub const TAG_TILE_WIDTH: u16 = 322;
pub const TAG_TILE_LENGTH: u16 = 323;
pub const TAG_TILE_OFFSETS: u16 = 324;
pub const TAG_TILE_BYTE_COUNTS: u16 = 325;
pub const TAG_SAMPLE_FORMAT: u16 = 339;
pub const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
pub const TAG_MODEL_TIEPOINT: u16 = 33922;
pub const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
pub const TAG_GDAL_METADATA: u16 = 42112;
pub const TAG_GDAL_NODATA: u16 = 42113;

const GEOKEY_GEOGRAPHIC_TYPE: u16 = 2048;
const GEOKEY_PROJECTED_CS_TYPE: u16 = 3072;
const GEOKEY_USER_DEFINED: u16 = 32767;

/// Decodes classic GeoTIFF containers.
#[derive(Debug, Clone, Copy)]
pub struct GeoTiffDecoder {
    max_pixels: usize,
}

impl Default for GeoTiffDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PIXELS)
    }
}

impl GeoTiffDecoder {
    pub fn new(max_pixels: usize) -> Self {
        Self { max_pixels }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.max_pixels)
    }

    pub fn max_pixels(&self) -> usize {
        self.max_pixels
    }
}

impl RasterDecoder for GeoTiffDecoder {
    fn decode(&self, bytes: &[u8], byte_order: ByteOrder) -> Result<DecodedRaster, DecodeError> {
        let reader = TiffReader {
            bytes,
            order: byte_order,
        };

        match reader.u16_at(2)? {
            42 => {}
            43 => return Err(DecodeError::unsupported("BigTIFF")),
            version => {
                return Err(DecodeError::malformed(format!(
                    "unexpected TIFF version {}",
                    version
                )))
            }
        }

        let ifd_offset = reader.u32_at(4)? as usize;
        let tags = reader.read_ifd(ifd_offset)?;
        let layout = ImageLayout::from_tags(&reader, &tags, self.max_pixels)?;
        debug!(
            width = layout.width,
            height = layout.height,
            bits = layout.bits_per_sample,
            chunks = layout.offsets.len(),
            compression = ?layout.compression,
            "Decoding TIFF image"
        );

        let band = layout.read_first_band(&reader)?;

        let no_data = match tags.get(&TAG_GDAL_NODATA) {
            Some(entry) => parse_nodata(&reader.ascii(entry)?, layout.sample_format, layout.bits_per_sample),
            None => None,
        };

        let declared_range = match tags.get(&TAG_GDAL_METADATA) {
            Some(entry) => parse_declared_range(&reader.ascii(entry)?),
            None => None,
        };

        let crs = match tags.get(&TAG_GEO_KEY_DIRECTORY) {
            Some(entry) => parse_geokeys(&reader.unsigned_values(entry)?),
            None => CrsDescriptor::Unknown,
        };

        let geo_transform = match (tags.get(&TAG_MODEL_PIXEL_SCALE), tags.get(&TAG_MODEL_TIEPOINT)) {
            (Some(scale), Some(tiepoint)) => {
                parse_geo_transform(&reader.float_values(scale)?, &reader.float_values(tiepoint)?)
            }
            _ => None,
        };

        Ok(DecodedRaster {
            width: layout.width,
            height: layout.height,
            bands: vec![band],
            no_data,
            crs,
            declared_range,
            geo_transform,
        })
    }
}

/// Location of an IFD entry's values.
#[derive(Debug, Clone, Copy)]
struct IfdEntry {
    field_type: u16,
    count: usize,
    data_offset: usize,
}

fn field_type_size(field_type: u16) -> Option<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

struct TiffReader<'a> {
    bytes: &'a [u8],
    order: ByteOrder,
}

impl<'a> TiffReader<'a> {
    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| {
                DecodeError::malformed(format!(
                    "read of {} bytes at offset {} runs past the {} byte buffer",
                    len,
                    offset,
                    self.bytes.len()
                ))
            })
    }

    fn u16_at(&self, offset: usize) -> Result<u16, DecodeError> {
        let s = self.slice(offset, 2)?;
        Ok(self.order.read_u16([s[0], s[1]]))
    }

    fn u32_at(&self, offset: usize) -> Result<u32, DecodeError> {
        let s = self.slice(offset, 4)?;
        Ok(self.order.read_u32([s[0], s[1], s[2], s[3]]))
    }

    fn u64_at(&self, offset: usize) -> Result<u64, DecodeError> {
        let s = self.slice(offset, 8)?;
        Ok(self
            .order
            .read_u64([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]]))
    }

    fn read_ifd(&self, offset: usize) -> Result<HashMap<u16, IfdEntry>, DecodeError> {
        let entry_count = self.u16_at(offset)? as usize;
        let mut entries = HashMap::with_capacity(entry_count);

        for i in 0..entry_count {
            let base = offset + 2 + i * 12;
            let tag = self.u16_at(base)?;
            let field_type = self.u16_at(base + 2)?;
            let count = self.u32_at(base + 4)? as usize;

            // Unknown field types cannot be sized; skip them
            let Some(size) = field_type_size(field_type) else {
                continue;
            };
            let total = count
                .checked_mul(size)
                .ok_or_else(|| DecodeError::malformed(format!("tag {} count overflows", tag)))?;
            let data_offset = if total <= 4 {
                base + 8
            } else {
                self.u32_at(base + 8)? as usize
            };

            entries.insert(
                tag,
                IfdEntry {
                    field_type,
                    count,
                    data_offset,
                },
            );
        }

        Ok(entries)
    }

    fn unsigned_values(&self, entry: &IfdEntry) -> Result<Vec<u64>, DecodeError> {
        let size = field_type_size(entry.field_type).unwrap_or(1);
        (0..entry.count)
            .map(|i| {
                let at = entry.data_offset + i * size;
                match entry.field_type {
                    1 | 7 => Ok(self.slice(at, 1)?[0] as u64),
                    3 => Ok(self.u16_at(at)? as u64),
                    4 => Ok(self.u32_at(at)? as u64),
                    other => Err(DecodeError::malformed(format!(
                        "expected an unsigned integer field, found type {}",
                        other
                    ))),
                }
            })
            .collect()
    }

    fn float_values(&self, entry: &IfdEntry) -> Result<Vec<f64>, DecodeError> {
        let size = field_type_size(entry.field_type).unwrap_or(1);
        (0..entry.count)
            .map(|i| {
                let at = entry.data_offset + i * size;
                match entry.field_type {
                    1 | 7 => Ok(self.slice(at, 1)?[0] as f64),
                    3 => Ok(self.u16_at(at)? as f64),
                    4 => Ok(self.u32_at(at)? as f64),
                    6 => Ok(self.slice(at, 1)?[0] as i8 as f64),
                    8 => Ok(self.u16_at(at)? as i16 as f64),
                    9 => Ok(self.u32_at(at)? as i32 as f64),
                    11 => Ok(f32::from_bits(self.u32_at(at)?) as f64),
                    12 => Ok(f64::from_bits(self.u64_at(at)?)),
                    other => Err(DecodeError::malformed(format!(
                        "expected a numeric field, found type {}",
                        other
                    ))),
                }
            })
            .collect()
    }

    fn ascii(&self, entry: &IfdEntry) -> Result<String, DecodeError> {
        let raw = self.slice(entry.data_offset, entry.count)?;
        let text = String::from_utf8_lossy(raw);
        Ok(text.trim_end_matches('\0').to_string())
    }

    fn first_unsigned(
        &self,
        tags: &HashMap<u16, IfdEntry>,
        tag: u16,
        default: Option<u64>,
    ) -> Result<u64, DecodeError> {
        match tags.get(&tag) {
            Some(entry) => self
                .unsigned_values(entry)?
                .first()
                .copied()
                .ok_or_else(|| DecodeError::malformed(format!("tag {} has no values", tag))),
            None => default
                .ok_or_else(|| DecodeError::malformed(format!("missing required tag {}", tag))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleFormat {
    Unsigned,
    Signed,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Deflate,
}

struct ImageLayout {
    width: usize,
    height: usize,
    bits_per_sample: u16,
    sample_format: SampleFormat,
    samples_per_pixel: usize,
    planar: bool,
    compression: Compression,
    horizontal_predictor: bool,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    chunks_down: usize,
    /// Bytes in one row of a decoded chunk.
    chunk_row_bytes: usize,
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
}

impl ImageLayout {
    fn from_tags(
        reader: &TiffReader<'_>,
        tags: &HashMap<u16, IfdEntry>,
        max_pixels: usize,
    ) -> Result<Self, DecodeError> {
        let width = reader.first_unsigned(tags, TAG_IMAGE_WIDTH, None)? as usize;
        let height = reader.first_unsigned(tags, TAG_IMAGE_LENGTH, None)? as usize;
        if width == 0 || height == 0 {
            return Err(DecodeError::malformed("image has zero width or height"));
        }
        if width.checked_mul(height).map_or(true, |pixels| pixels > max_pixels) {
            return Err(DecodeError::malformed(format!(
                "{}x{} image exceeds the {} pixel limit",
                width, height, max_pixels
            )));
        }

        let bits_per_sample = reader.first_unsigned(tags, TAG_BITS_PER_SAMPLE, Some(1))? as u16;
        let sample_format = match reader.first_unsigned(tags, TAG_SAMPLE_FORMAT, Some(1))? {
            1 => SampleFormat::Unsigned,
            2 => SampleFormat::Signed,
            3 => SampleFormat::Float,
            other => {
                return Err(DecodeError::unsupported(format!("sample format {}", other)));
            }
        };
        match (sample_format, bits_per_sample) {
            (SampleFormat::Unsigned | SampleFormat::Signed, 8 | 16 | 32) => {}
            (SampleFormat::Float, 32 | 64) => {}
            (format, bits) => {
                return Err(DecodeError::unsupported(format!(
                    "{} bit {:?} samples",
                    bits, format
                )));
            }
        }

        let samples_per_pixel = reader.first_unsigned(tags, TAG_SAMPLES_PER_PIXEL, Some(1))?.max(1) as usize;
        let planar = reader.first_unsigned(tags, TAG_PLANAR_CONFIGURATION, Some(1))? == 2;

        let compression = match reader.first_unsigned(tags, TAG_COMPRESSION, Some(1))? {
            1 => Compression::None,
            8 | 32946 => Compression::Deflate,
            other => return Err(DecodeError::unsupported(format!("compression {}", other))),
        };

        let horizontal_predictor = match reader.first_unsigned(tags, TAG_PREDICTOR, Some(1))? {
            1 => false,
            2 if sample_format != SampleFormat::Float => true,
            other => return Err(DecodeError::unsupported(format!("predictor {}", other))),
        };

        let tiled = tags.contains_key(&TAG_TILE_WIDTH);
        let (chunk_width, chunk_height, offsets_tag, counts_tag) = if tiled {
            (
                reader.first_unsigned(tags, TAG_TILE_WIDTH, None)? as usize,
                reader.first_unsigned(tags, TAG_TILE_LENGTH, None)? as usize,
                TAG_TILE_OFFSETS,
                TAG_TILE_BYTE_COUNTS,
            )
        } else {
            let rows = reader.first_unsigned(tags, TAG_ROWS_PER_STRIP, Some(height as u64))? as usize;
            (width, rows.min(height), TAG_STRIP_OFFSETS, TAG_STRIP_BYTE_COUNTS)
        };
        if chunk_width == 0 || chunk_height == 0 {
            return Err(DecodeError::malformed("zero-sized strip or tile"));
        }

        let stride = if planar { 1 } else { samples_per_pixel };
        let bytes_per_sample = bits_per_sample as usize / 8;
        let chunk_samples = chunk_width
            .checked_mul(chunk_height)
            .and_then(|n| n.checked_mul(stride));
        if chunk_samples.map_or(true, |n| n > max_pixels) {
            return Err(DecodeError::malformed(format!(
                "{}x{} chunk of {} samples per pixel exceeds the {} pixel limit",
                chunk_width, chunk_height, stride, max_pixels
            )));
        }
        // Bounded by the check above
        let chunk_row_bytes = chunk_width * stride * bytes_per_sample;

        let offsets = match tags.get(&offsets_tag) {
            Some(entry) => reader.unsigned_values(entry)?,
            None => return Err(DecodeError::malformed("missing strip/tile offsets")),
        };
        let byte_counts = match tags.get(&counts_tag) {
            Some(entry) => reader.unsigned_values(entry)?,
            None => return Err(DecodeError::malformed("missing strip/tile byte counts")),
        };

        let chunks_across = width.div_ceil(chunk_width);
        let chunks_down = height.div_ceil(chunk_height);
        let planes = if planar { samples_per_pixel } else { 1 };
        let expected_chunks = chunks_across
            .checked_mul(chunks_down)
            .and_then(|per_plane| per_plane.checked_mul(planes))
            .ok_or_else(|| DecodeError::malformed("strip/tile count overflows"))?;
        if offsets.len() < expected_chunks || byte_counts.len() < offsets.len() {
            return Err(DecodeError::malformed(format!(
                "expected {} chunks, found {} offsets and {} byte counts",
                expected_chunks,
                offsets.len(),
                byte_counts.len()
            )));
        }

        let layout = Self {
            width,
            height,
            bits_per_sample,
            sample_format,
            samples_per_pixel,
            planar,
            compression,
            horizontal_predictor,
            chunk_width,
            chunk_height,
            chunks_across,
            chunks_down,
            chunk_row_bytes,
            offsets,
            byte_counts,
        };
        layout.check_chunks(reader)?;
        Ok(layout)
    }

    /// Every band 0 chunk must lie inside the buffer, and an uncompressed
    /// chunk must hold all the rows it covers.
    fn check_chunks(&self, reader: &TiffReader<'_>) -> Result<(), DecodeError> {
        for chunk_row in 0..self.chunks_down {
            let rows = self.rows_in_chunk(chunk_row);
            for chunk_col in 0..self.chunks_across {
                let index = chunk_row * self.chunks_across + chunk_col;
                let (offset, count) = self.chunk_extent(index);
                reader.slice(offset, count)?;

                let needed = rows * self.chunk_row_bytes;
                if self.compression == Compression::None && count < needed {
                    return Err(DecodeError::malformed(format!(
                        "chunk {} holds {} bytes but its {} rows need {}",
                        index, count, rows, needed
                    )));
                }
            }
        }
        Ok(())
    }

    fn chunk_extent(&self, index: usize) -> (usize, usize) {
        (self.offsets[index] as usize, self.byte_counts[index] as usize)
    }

    fn rows_in_chunk(&self, chunk_row: usize) -> usize {
        self.chunk_height.min(self.height - chunk_row * self.chunk_height)
    }

    fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Samples per pixel stored inside one chunk.
    fn chunk_stride(&self) -> usize {
        if self.planar {
            1
        } else {
            self.samples_per_pixel
        }
    }

    fn read_first_band(&self, reader: &TiffReader<'_>) -> Result<Vec<f64>, DecodeError> {
        let mut band = vec![0.0f64; self.width * self.height];
        let stride = self.chunk_stride();
        let bps = self.bytes_per_sample();
        let row_samples = self.chunk_width * stride;
        let row_len = self.chunk_row_bytes;
        let mut row_bits = vec![0u64; row_samples];

        // Band 0 occupies the first plane in planar layout, so chunk indices
        // are the same in both layouts
        for chunk_row in 0..self.chunks_down {
            for chunk_col in 0..self.chunks_across {
                let index = chunk_row * self.chunks_across + chunk_col;
                let (offset, count) = self.chunk_extent(index);
                let row0 = chunk_row * self.chunk_height;
                let col0 = chunk_col * self.chunk_width;
                let rows_here = self.rows_in_chunk(chunk_row);
                let cols_here = self.chunk_width.min(self.width - col0);

                let raw = reader.slice(offset, count)?;
                let data = self.decompress(raw, rows_here * row_len)?;

                for r in 0..rows_here {
                    let row_start = r * row_len;
                    let row_bytes = data.get(row_start..row_start + row_len).ok_or_else(|| {
                        DecodeError::malformed(format!("chunk {} is shorter than its declared size", index))
                    })?;

                    for (i, slot) in row_bits.iter_mut().enumerate() {
                        *slot = self.raw_sample(&row_bytes[i * bps..(i + 1) * bps], reader.order);
                    }
                    if self.horizontal_predictor {
                        self.undo_predictor(&mut row_bits, stride);
                    }

                    let out_start = (row0 + r) * self.width + col0;
                    for c in 0..cols_here {
                        band[out_start + c] = self.to_value(row_bits[c * stride]);
                    }
                }
            }
        }

        Ok(band)
    }

    /// Inflates at most `limit` bytes; anything past the rows read is ignored.
    fn decompress<'b>(&self, raw: &'b [u8], limit: usize) -> Result<std::borrow::Cow<'b, [u8]>, DecodeError> {
        match self.compression {
            Compression::None => Ok(std::borrow::Cow::Borrowed(raw)),
            Compression::Deflate => {
                let mut out = Vec::new();
                ZlibDecoder::new(raw)
                    .take(limit as u64)
                    .read_to_end(&mut out)
                    .map_err(|e| DecodeError::malformed(format!("deflate stream: {}", e)))?;
                Ok(std::borrow::Cow::Owned(out))
            }
        }
    }

    /// Sample bits widened to u64, byte order resolved.
    fn raw_sample(&self, bytes: &[u8], order: ByteOrder) -> u64 {
        match bytes.len() {
            1 => bytes[0] as u64,
            2 => order.read_u16([bytes[0], bytes[1]]) as u64,
            4 => order.read_u32([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
            _ => order.read_u64([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
        }
    }

    /// Horizontal differencing is a running wrapping sum per component.
    fn undo_predictor(&self, row: &mut [u64], stride: usize) {
        let mask = if self.bits_per_sample >= 64 {
            u64::MAX
        } else {
            (1u64 << self.bits_per_sample) - 1
        };
        for i in stride..row.len() {
            row[i] = row[i].wrapping_add(row[i - stride]) & mask;
        }
    }

    fn to_value(&self, bits: u64) -> f64 {
        match (self.sample_format, self.bits_per_sample) {
            (SampleFormat::Unsigned, _) => bits as f64,
            (SampleFormat::Signed, 8) => bits as u8 as i8 as f64,
            (SampleFormat::Signed, 16) => bits as u16 as i16 as f64,
            (SampleFormat::Signed, _) => bits as u32 as i32 as f64,
            (SampleFormat::Float, 32) => f32::from_bits(bits as u32) as f64,
            (SampleFormat::Float, _) => f64::from_bits(bits),
        }
    }
}

/// Parse `GDAL_NODATA`, rounded to the sample type so equality against
/// decoded samples holds.
fn parse_nodata(text: &str, format: SampleFormat, bits: u16) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    Some(match (format, bits) {
        (SampleFormat::Float, 32) => value as f32 as f64,
        _ => value,
    })
}

/// `STATISTICS_MINIMUM` / `STATISTICS_MAXIMUM` items of the GDAL metadata XML.
fn parse_declared_range(xml: &str) -> Option<(f64, f64)> {
    let item = |name: &str| -> Option<f64> {
        let key = format!("name=\"{}\"", name);
        let start = xml.find(&key)? + key.len();
        let rest = &xml[start..];
        let open = rest.find('>')? + 1;
        let close = rest[open..].find('<')?;
        rest[open..open + close].trim().parse().ok()
    };
    Some((item("STATISTICS_MINIMUM")?, item("STATISTICS_MAXIMUM")?))
}

fn parse_geokeys(directory: &[u64]) -> CrsDescriptor {
    if directory.len() < 4 {
        return CrsDescriptor::Unknown;
    }
    let key_count = directory[3] as usize;
    let mut keys = HashMap::new();
    for entry in directory[4..].chunks_exact(4).take(key_count) {
        // Only inline SHORT values (location 0) carry CRS codes
        if entry[1] == 0 {
            keys.insert(entry[0] as u16, entry[3] as u16);
        }
    }

    for key in [GEOKEY_PROJECTED_CS_TYPE, GEOKEY_GEOGRAPHIC_TYPE] {
        match keys.get(&key) {
            Some(&GEOKEY_USER_DEFINED) => return CrsDescriptor::Custom("user-defined".to_string()),
            Some(&code) if code != 0 => return CrsDescriptor::Epsg(code as u32),
            _ => {}
        }
    }
    CrsDescriptor::Unknown
}

fn parse_geo_transform(scale: &[f64], tiepoint: &[f64]) -> Option<GeoTransform> {
    if scale.len() < 2 || tiepoint.len() < 6 || scale[0] <= 0.0 || scale[1] <= 0.0 {
        return None;
    }
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    Some(GeoTransform::new(
        x - i * scale[0],
        y + j * scale[1],
        scale[0],
        scale[1],
    ))
}
