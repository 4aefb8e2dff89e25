//! Spherical Web Mercator (EPSG:3857).

use std::f64::consts::PI;

use crate::error::{ProjectionError, Result};

/// Semi-major axis used as the sphere radius by Web Mercator.
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude limit where the projection becomes a square world.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl WebMercator {
    /// Project lon/lat degrees to meters. Latitudes beyond the square-world limit are clamped.
    pub fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 {
            return Err(ProjectionError::OutOfDomain {
                x: lon,
                y: lat,
                crs: "EPSG:3857".to_string(),
            });
        }
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let x = EARTH_RADIUS * lon.to_radians();
        let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
        Ok((x, y))
    }

    /// Meters back to lon/lat degrees.
    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::OutOfDomain {
                x,
                y,
                crs: "EPSG:3857".to_string(),
            });
        }
        let lon = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        Ok((lon, lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin() {
        let (x, y) = WebMercator.forward(0.0, 0.0).unwrap();
        assert!(x.abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn test_world_extent() {
        let (x, y) = WebMercator.forward(180.0, MAX_LATITUDE).unwrap();
        assert!((x - 20037508.342789244).abs() < 1e-3);
        assert!((y - 20037508.342789244).abs() < 1e-3);
    }

    #[test]
    fn test_roundtrip_rome() {
        let (x, y) = WebMercator.forward(12.4964, 41.9028).unwrap();
        let (lon, lat) = WebMercator.inverse(x, y).unwrap();
        assert!((lon - 12.4964).abs() < 1e-9);
        assert!((lat - 41.9028).abs() < 1e-9);
    }
}
