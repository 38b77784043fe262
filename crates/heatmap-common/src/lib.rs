//! Common types shared across the heatmap raster pipeline crates.

pub mod bbox;
pub mod color;
pub mod crs;
pub mod error;
pub mod layer;

pub use bbox::BoundingBox;
pub use color::{PixelColor, Rgba};
pub use crs::CrsDescriptor;
pub use error::{DecodeError, FormatError, LoadError, LoadResult, SourceError};
pub use layer::{LayerKey, SourceLocator};
