//! Test data generators for creating synthetic raster data.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f64);
        }
    }
    data
}

/// Creates a land-surface-temperature-like grid in degrees Celsius.
///
/// Values rise linearly from `min` at the top-left corner to `max` at the
/// bottom-right corner, so both extremes are present exactly.
pub fn create_lst_grid(width: usize, height: usize, min: f64, max: f64) -> Vec<f64> {
    let steps = (width + height).saturating_sub(2).max(1) as f64;
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let t = (col + row) as f64 / steps;
            data.push(min * (1.0 - t) + max * t);
        }
    }
    data
}

/// Creates a grid filled with one value.
pub fn create_constant_grid(width: usize, height: usize, value: f64) -> Vec<f64> {
    vec![value; width * height]
}

/// Replaces every `nth` cell (starting with the first) with `no_data`.
///
/// Returns the number of cells replaced.
pub fn punch_no_data(values: &mut [f64], nth: usize, no_data: f64) -> usize {
    if nth == 0 {
        return 0;
    }
    let mut replaced = 0;
    for value in values.iter_mut().step_by(nth) {
        *value = no_data;
        replaced += 1;
    }
    replaced
}

/// Creates a grid with NaN values at specified (col, row) positions and
/// zeros elsewhere.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f64> {
    let mut data = vec![0.0f64; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f64::NAN;
        }
    }
    data
}

/// Deterministic pseudo-random values in `[min, max)`.
///
/// Uses a small linear congruential generator so the same seed always
/// produces the same grid.
pub fn create_noise_grid(width: usize, height: usize, min: f64, max: f64, seed: u32) -> Vec<f64> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..width * height)
        .map(|_| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let unit = (state >> 8) as f64 / (1u32 << 24) as f64;
            min + (max - min) * unit
        })
        .collect()
}
