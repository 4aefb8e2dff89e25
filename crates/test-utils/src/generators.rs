//! Synthetic raster generators.
//!
//! All grids are row-major, row 0 at the top (north).

/// Nodata marker used by the upstream rasters.
pub const NODATA: f32 = -9999.0;

/// Grid where each cell holds `col * 1000 + row`, so a clipped window can be
/// traced back to its source cells.
///
/// ```
/// use test_utils::create_index_grid;
///
/// let grid = create_index_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);
/// assert_eq!(grid[10], 1.0);
/// ```
pub fn create_index_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Rainfall-intensity-like field (mm/h): a single storm cell peaking at
/// `peak` in the middle, fading to zero, with the four corner cells set to
/// [`NODATA`] to mimic the radar mask.
pub fn create_rainfall_grid(width: usize, height: usize, peak: f32) -> Vec<f32> {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let sigma = (width.min(height) as f32 / 4.0).max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let r2 = (dx * dx + dy * dy) / (2.0 * sigma * sigma);
            data.push(peak * (-r2).exp());
        }
    }

    if width > 0 && height > 0 {
        for idx in [0, width - 1, (height - 1) * width, height * width - 1] {
            data[idx] = NODATA;
        }
    }
    data
}

/// Classified field: square patches of `patch` cells cycling through
/// `classes` integer values (as f32).
pub fn create_categorical_grid(width: usize, height: usize, patch: usize, classes: u32) -> Vec<f32> {
    let patch = patch.max(1);
    let classes = classes.max(1) as usize;
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let class = (row / patch + col / patch) % classes;
            data.push(class as f32);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rainfall_grid_peak_and_mask() {
        let grid = create_rainfall_grid(9, 9, 50.0);
        assert_eq!(grid[4 * 9 + 4], 50.0);
        assert_eq!(grid[0], NODATA);
        assert_eq!(grid[80], NODATA);
        assert!(grid[4 * 9 + 1] < 50.0 && grid[4 * 9 + 1] > 0.0);
    }

    #[test]
    fn test_categorical_grid_values_are_classes() {
        let grid = create_categorical_grid(8, 8, 2, 3);
        assert!(grid.iter().all(|v| *v == 0.0 || *v == 1.0 || *v == 2.0));
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[2], 1.0);
    }
}
