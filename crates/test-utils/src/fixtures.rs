//! Fixture extents and raster layouts.

/// Bounding boxes as (min_x, min_y, max_x, max_y).
pub mod bbox {
    /// Mainland Italy and islands, lon/lat degrees
    pub const ITALY: (f64, f64, f64, f64) = (6.0, 36.0, 19.0, 47.5);

    /// Venice lagoon, lon/lat degrees
    pub const VENICE: (f64, f64, f64, f64) = (12.0, 45.15, 12.7, 45.6);

    /// Around Rome, lon/lat degrees
    pub const ROME: (f64, f64, f64, f64) = (12.2, 41.7, 12.8, 42.1);

    /// Mid-Atlantic, disjoint from every Italian product
    pub const ATLANTIC: (f64, f64, f64, f64) = (-40.0, 30.0, -20.0, 40.0);

    /// Around Rome in UTM zone 33N meters
    pub const ROME_UTM33: (f64, f64, f64, f64) = (265000.0, 4620000.0, 320000.0, 4665000.0);
}

/// North-up raster layout: origin at the top-left corner, square pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterSpec {
    pub width: usize,
    pub height: usize,
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
}

impl RasterSpec {
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (
            self.origin_x,
            self.origin_y - self.height as f64 * self.pixel_size,
            self.origin_x + self.width as f64 * self.pixel_size,
            self.origin_y,
        )
    }
}

/// Small lon/lat grid covering Italy at 0.5 degrees.
pub const ITALY_COARSE: RasterSpec = RasterSpec {
    width: 26,
    height: 23,
    origin_x: 6.0,
    origin_y: 47.5,
    pixel_size: 0.5,
};

/// Tiny 4x4 grid at 1 degree, for hand-checked clipping.
pub const UNIT_GRID: RasterSpec = RasterSpec {
    width: 4,
    height: 4,
    origin_x: 10.0,
    origin_y: 46.0,
    pixel_size: 1.0,
};
