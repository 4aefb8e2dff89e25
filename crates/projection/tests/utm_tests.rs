//! Accuracy checks for the projections over Italy.

use projection::{CrsTransform, TransverseMercator, WebMercator};
use radar_common::{BoundingBox, CrsCode};
use test_utils::{assert_approx_eq, assert_coords_approx_eq, fixtures};

// ============================================================================
// Transverse Mercator
// ============================================================================

#[test]
fn test_central_meridian_has_false_easting() {
    let utm33 = TransverseMercator::utm_north(33);
    let (x, _) = utm33.forward(15.0, 40.0).unwrap();
    assert_approx_eq!(x, 500000.0, 1e-6);
}

#[test]
fn test_equator_has_zero_northing() {
    let utm32 = TransverseMercator::utm_north(32);
    let (_, y) = utm32.forward(9.0, 0.0).unwrap();
    assert_approx_eq!(y, 0.0, 1e-6);
}

#[test]
fn test_off_meridian_known_point() {
    // 12.5E 45N is 3.5 degrees east of the zone 32 meridian
    let utm32 = TransverseMercator::utm_north(32);
    let (x, y) = utm32.forward(12.5, 45.0).unwrap();
    assert_coords_approx_eq!((x, y), (775853.73, 4988911.84), 0.05);
}

// ============================================================================
// CRS transforms
// ============================================================================

#[test]
fn test_utm_bbox_back_to_lonlat() {
    let (min_x, min_y, max_x, max_y) = fixtures::bbox::ROME_UTM33;
    let bbox = BoundingBox::new(min_x, min_y, max_x, max_y);
    let t = CrsTransform::new(CrsCode::Epsg32633, CrsCode::Epsg4326);
    let geo = t.transform_bbox(&bbox, 21).unwrap();

    assert!(geo.min_x > 12.0 && geo.max_x < 13.0, "{}", geo);
    assert!(geo.min_y > 41.5 && geo.max_y < 42.2, "{}", geo);
}

#[test]
fn test_mercator_roundtrip_through_transform() {
    let forward = CrsTransform::new(CrsCode::Epsg4258, CrsCode::Epsg3857);
    let back = forward.inverse();
    let (x, y) = forward.transform(18.0, 40.3).unwrap();
    let (lon, lat) = WebMercator.inverse(x, y).unwrap();
    assert_coords_approx_eq!((lon, lat), (18.0, 40.3), 1e-9);
    let (lon_back, lat_back) = back.transform(x, y).unwrap();
    assert_coords_approx_eq!((lon_back, lat_back), (18.0, 40.3), 1e-9);
}
