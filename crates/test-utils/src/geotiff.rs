//! In-memory GeoTIFF writer for tests.
//!
//! Produces small single-band classic TIFFs with the tags GDAL writes for
//! single-band rasters, so decoder and loader tests do not need binary
//! fixtures checked into the repository.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Sample encoding of the written band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    I16,
    U16,
    I32,
    F32,
    F64,
}

impl SampleType {
    fn bits(self) -> u16 {
        match self {
            SampleType::U8 => 8,
            SampleType::I16 | SampleType::U16 => 16,
            SampleType::I32 | SampleType::F32 => 32,
            SampleType::F64 => 64,
        }
    }

    fn format(self) -> u16 {
        match self {
            SampleType::U8 | SampleType::U16 => 1,
            SampleType::I16 | SampleType::I32 => 2,
            SampleType::F32 | SampleType::F64 => 3,
        }
    }
}

/// Builder for single-band GeoTIFF byte buffers.
///
/// ```
/// use test_utils::{GeoTiffBuilder, SampleType};
///
/// let bytes = GeoTiffBuilder::new(2, 2, vec![1.0, 2.0, 3.0, 4.0])
///     .sample_type(SampleType::F32)
///     .no_data("-9999")
///     .epsg(4326)
///     .build();
/// assert_eq!(&bytes[..2], b"II");
/// ```
#[derive(Debug, Clone)]
pub struct GeoTiffBuilder {
    width: usize,
    height: usize,
    values: Vec<f64>,
    sample_type: SampleType,
    big_endian: bool,
    rows_per_strip: Option<usize>,
    tile_size: Option<(usize, usize)>,
    deflate: bool,
    no_data: Option<String>,
    epsg: Option<u16>,
    transform: Option<(f64, f64, f64, f64)>,
    statistics: Option<(f64, f64)>,
    min_len: usize,
}

const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_ASCII: u16 = 2;
const TYPE_DOUBLE: u16 = 12;

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    payload: Vec<u8>,
}

impl GeoTiffBuilder {
    /// Row-major `values`, `width * height` of them.
    pub fn new(width: usize, height: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), width * height, "grid size mismatch");
        Self {
            width,
            height,
            values,
            sample_type: SampleType::F32,
            big_endian: false,
            rows_per_strip: None,
            tile_size: None,
            deflate: false,
            no_data: None,
            epsg: None,
            transform: None,
            statistics: None,
            // Real files are never this small; keep fixtures above the
            // validator's default floor
            min_len: 256,
        }
    }

    pub fn sample_type(mut self, sample_type: SampleType) -> Self {
        self.sample_type = sample_type;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn rows_per_strip(mut self, rows: usize) -> Self {
        self.rows_per_strip = Some(rows);
        self
    }

    pub fn tiled(mut self, tile_width: usize, tile_height: usize) -> Self {
        self.tile_size = Some((tile_width, tile_height));
        self
    }

    pub fn deflate(mut self) -> Self {
        self.deflate = true;
        self
    }

    /// `GDAL_NODATA` text, written verbatim.
    pub fn no_data(mut self, text: &str) -> Self {
        self.no_data = Some(text.to_string());
        self
    }

    pub fn epsg(mut self, code: u16) -> Self {
        self.epsg = Some(code);
        self
    }

    /// Top-left corner and pixel size, written as tiepoint + pixel scale.
    pub fn geo_transform(mut self, origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        self.transform = Some((origin_x, origin_y, pixel_width, pixel_height));
        self
    }

    /// `STATISTICS_MINIMUM` / `STATISTICS_MAXIMUM` in `GDAL_METADATA`.
    pub fn statistics(mut self, min: f64, max: f64) -> Self {
        self.statistics = Some((min, max));
        self
    }

    /// Disable trailing zero padding.
    pub fn unpadded(mut self) -> Self {
        self.min_len = 0;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        self.push_u16(&mut buf, 42);
        self.push_u32(&mut buf, 0);

        let (chunk_width, chunk_height, chunks) = self.chunks();
        let mut offsets = Vec::with_capacity(chunks.len());
        let mut counts = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let bytes = self.encode_chunk(&chunk);
            offsets.push(buf.len() as u32);
            counts.push(bytes.len() as u32);
            buf.extend_from_slice(&bytes);
        }

        let mut entries = vec![
            self.longs(256, &[self.width as u32]),
            self.longs(257, &[self.height as u32]),
            self.shorts(258, &[self.sample_type.bits()]),
            self.shorts(259, &[if self.deflate { 8 } else { 1 }]),
            self.shorts(262, &[1]),
            self.shorts(277, &[1]),
            self.shorts(284, &[1]),
            self.shorts(339, &[self.sample_type.format()]),
        ];
        if self.tile_size.is_some() {
            entries.push(self.longs(322, &[chunk_width as u32]));
            entries.push(self.longs(323, &[chunk_height as u32]));
            entries.push(self.longs(324, &offsets));
            entries.push(self.longs(325, &counts));
        } else {
            entries.push(self.longs(273, &offsets));
            entries.push(self.longs(278, &[chunk_height as u32]));
            entries.push(self.longs(279, &counts));
        }
        if let Some((ox, oy, pw, ph)) = self.transform {
            entries.push(self.doubles(33550, &[pw, ph, 0.0]));
            entries.push(self.doubles(33922, &[0.0, 0.0, 0.0, ox, oy, 0.0]));
        }
        if let Some(code) = self.epsg {
            let geographic = (4000..5000).contains(&code);
            let (model, key) = if geographic { (2, 2048) } else { (1, 3072) };
            entries.push(self.shorts(34735, &[1, 1, 0, 2, 1024, 0, 1, model, key, 0, 1, code]));
        }
        if let Some((min, max)) = self.statistics {
            let xml = format!(
                "<GDALMetadata>\n  <Item name=\"STATISTICS_MAXIMUM\" sample=\"0\">{}</Item>\n  <Item name=\"STATISTICS_MINIMUM\" sample=\"0\">{}</Item>\n</GDALMetadata>",
                max, min
            );
            entries.push(ascii(42112, &xml));
        }
        if let Some(text) = &self.no_data {
            entries.push(ascii(42113, text));
        }
        entries.sort_by_key(|e| e.tag);

        // Out-of-line payloads first, then the IFD itself
        let mut value_fields = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.payload.len() <= 4 {
                let mut inline = entry.payload.clone();
                inline.resize(4, 0);
                value_fields.push(inline);
            } else {
                if buf.len() % 2 == 1 {
                    buf.push(0);
                }
                let mut offset = Vec::new();
                self.push_u32(&mut offset, buf.len() as u32);
                value_fields.push(offset);
                buf.extend_from_slice(&entry.payload);
            }
        }
        if buf.len() % 2 == 1 {
            buf.push(0);
        }

        let ifd_offset = buf.len() as u32;
        self.push_u16(&mut buf, entries.len() as u16);
        for (entry, value) in entries.iter().zip(&value_fields) {
            self.push_u16(&mut buf, entry.tag);
            self.push_u16(&mut buf, entry.field_type);
            self.push_u32(&mut buf, entry.count);
            buf.extend_from_slice(value);
        }
        self.push_u32(&mut buf, 0);

        let mut header_offset = Vec::new();
        self.push_u32(&mut header_offset, ifd_offset);
        buf[4..8].copy_from_slice(&header_offset);

        if buf.len() < self.min_len {
            buf.resize(self.min_len, 0);
        }
        buf
    }

    /// Chunk dimensions and the samples of each chunk, row-major within the
    /// chunk. Tiles are padded with zeros past the image edge.
    fn chunks(&self) -> (usize, usize, Vec<Vec<f64>>) {
        if let Some((tw, th)) = self.tile_size {
            let mut chunks = Vec::new();
            for tile_row in 0..self.height.div_ceil(th) {
                for tile_col in 0..self.width.div_ceil(tw) {
                    let mut samples = Vec::with_capacity(tw * th);
                    for r in 0..th {
                        for c in 0..tw {
                            let (row, col) = (tile_row * th + r, tile_col * tw + c);
                            let value = if row < self.height && col < self.width {
                                self.values[row * self.width + col]
                            } else {
                                0.0
                            };
                            samples.push(value);
                        }
                    }
                    chunks.push(samples);
                }
            }
            (tw, th, chunks)
        } else {
            let rows = self.rows_per_strip.unwrap_or(self.height).clamp(1, self.height.max(1));
            let chunks = self
                .values
                .chunks(rows * self.width)
                .map(|strip| strip.to_vec())
                .collect();
            (self.width, rows, chunks)
        }
    }

    fn encode_chunk(&self, samples: &[f64]) -> Vec<u8> {
        let mut raw = Vec::with_capacity(samples.len() * 8);
        for &v in samples {
            match self.sample_type {
                SampleType::U8 => raw.push(v as u8),
                SampleType::I16 => self.push_u16(&mut raw, v as i16 as u16),
                SampleType::U16 => self.push_u16(&mut raw, v as u16),
                SampleType::I32 => self.push_u32(&mut raw, v as i32 as u32),
                SampleType::F32 => self.push_u32(&mut raw, (v as f32).to_bits()),
                SampleType::F64 => {
                    let bits = v.to_bits();
                    if self.big_endian {
                        raw.extend_from_slice(&bits.to_be_bytes());
                    } else {
                        raw.extend_from_slice(&bits.to_le_bytes());
                    }
                }
            }
        }

        if !self.deflate {
            return raw;
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).expect("in-memory deflate");
        encoder.finish().expect("in-memory deflate")
    }

    fn push_u16(&self, buf: &mut Vec<u8>, v: u16) {
        if self.big_endian {
            buf.extend_from_slice(&v.to_be_bytes());
        } else {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn push_u32(&self, buf: &mut Vec<u8>, v: u32) {
        if self.big_endian {
            buf.extend_from_slice(&v.to_be_bytes());
        } else {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }

    fn shorts(&self, tag: u16, values: &[u16]) -> Entry {
        let mut payload = Vec::new();
        for &v in values {
            self.push_u16(&mut payload, v);
        }
        Entry {
            tag,
            field_type: TYPE_SHORT,
            count: values.len() as u32,
            payload,
        }
    }

    fn longs(&self, tag: u16, values: &[u32]) -> Entry {
        let mut payload = Vec::new();
        for &v in values {
            self.push_u32(&mut payload, v);
        }
        Entry {
            tag,
            field_type: TYPE_LONG,
            count: values.len() as u32,
            payload,
        }
    }

    fn doubles(&self, tag: u16, values: &[f64]) -> Entry {
        let mut payload = Vec::new();
        for &v in values {
            let bits = v.to_bits();
            if self.big_endian {
                payload.extend_from_slice(&bits.to_be_bytes());
            } else {
                payload.extend_from_slice(&bits.to_le_bytes());
            }
        }
        Entry {
            tag,
            field_type: TYPE_DOUBLE,
            count: values.len() as u32,
            payload,
        }
    }
}

fn ascii(tag: u16, text: &str) -> Entry {
    let mut payload = text.as_bytes().to_vec();
    payload.push(0);
    Entry {
        tag,
        field_type: TYPE_ASCII,
        count: payload.len() as u32,
        payload,
    }
}

/// Write bytes to a named temp file that lives as long as the handle.
pub fn write_temp_raster(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".tif")
        .tempfile()
        .expect("create temp raster");
    file.write_all(bytes).expect("write temp raster");
    file.flush().expect("flush temp raster");
    file
}
