//! Shared test utilities for the heatmap pipeline workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic raster generators
//! - An in-memory GeoTIFF writer for decoder and loader tests
//! - Common test fixtures (sample values, error pages)
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{GeoTiffBuilder, fixtures};
//! ```

pub mod fixtures;
pub mod generators;
pub mod geotiff;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use geotiff::{write_temp_raster, GeoTiffBuilder, SampleType};

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of `[r, g, b, a]` byte quadruples, allowing
/// each channel to differ by `tolerance`.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_rgba_near;
///
/// assert_rgba_near!([255, 140, 0, 255], [254, 141, 0, 255], 1);
/// ```
#[macro_export]
macro_rules! assert_rgba_near {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left: [u8; 4] = $left;
        let right: [u8; 4] = $right;
        let tolerance: u8 = $tolerance;
        for i in 0..4 {
            if left[i].abs_diff(right[i]) > tolerance {
                panic!(
                    "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n channel {} differs by more than {}",
                    left, right, i, tolerance
                );
            }
        }
    }};
}
