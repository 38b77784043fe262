//! Color scales calibrated to observed raster data.
//!
//! A [`MappingPolicy`] describes how values become colors; [`factory::build`]
//! turns a policy plus an observed `[min, max]` into a [`ColorScale`], a pure
//! per-pixel function. Each call builds an independent scale: nothing is
//! cached or shared between scales.
//!
//! Four policies are supported:
//! - Thresholded two-segment heat ramp
//! - Discrete classes with fixed bounds
//! - Bucketed gradient (four bands)
//! - Two-color linear blend

pub mod factory;
pub mod policy;
pub mod presets;
pub mod scale;

pub use factory::{build, build_empty, build_for_range};
pub use policy::{ColorClass, MappingPolicy, PolicyError, HEAT_HIGH, HEAT_LOW, HEAT_MID};
pub use presets::{LayerPreset, PresetConfig, PresetError};
pub use scale::ColorScale;
