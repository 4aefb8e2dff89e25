//! Point and bounding-box transformations between supported CRS codes.

use radar_common::{BoundingBox, CrsCode};

use crate::error::{ProjectionError, Result};
use crate::mercator::WebMercator;
use crate::transverse_mercator::TransverseMercator;

/// Edge segments used when transforming a bounding box.
pub const DEFAULT_DENSIFY: usize = 21;

#[derive(Debug, Clone)]
enum Projector {
    Geographic,
    WebMercator(WebMercator),
    TransverseMercator(TransverseMercator),
}

impl Projector {
    fn for_crs(crs: CrsCode) -> Self {
        match crs.utm_zone() {
            Some(zone) => Projector::TransverseMercator(TransverseMercator::utm_north(zone)),
            None if crs == CrsCode::Epsg3857 => Projector::WebMercator(WebMercator),
            None => Projector::Geographic,
        }
    }

    fn to_lonlat(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match self {
            Projector::Geographic => Ok((x, y)),
            Projector::WebMercator(p) => p.inverse(x, y),
            Projector::TransverseMercator(p) => p.inverse(x, y),
        }
    }

    fn from_lonlat(&self, lon: f64, lat: f64) -> Result<(f64, f64)> {
        match self {
            Projector::Geographic => Ok((lon, lat)),
            Projector::WebMercator(p) => p.forward(lon, lat),
            Projector::TransverseMercator(p) => p.forward(lon, lat),
        }
    }
}

/// A transformation from one CRS to another, going through geographic lon/lat.
///
/// Geographic CRS codes are interchangeable: EPSG:4326 and EPSG:4258 map to
/// each other with no datum shift.
#[derive(Debug, Clone)]
pub struct CrsTransform {
    from: CrsCode,
    to: CrsCode,
    source: Projector,
    target: Projector,
}

impl CrsTransform {
    pub fn new(from: CrsCode, to: CrsCode) -> Self {
        Self {
            from,
            to,
            source: Projector::for_crs(from),
            target: Projector::for_crs(to),
        }
    }

    pub fn from_crs(&self) -> CrsCode {
        self.from
    }

    pub fn to_crs(&self) -> CrsCode {
        self.to
    }

    /// True when coordinates pass through unchanged.
    pub fn is_identity(&self) -> bool {
        self.from == self.to || (self.from.is_geographic() && self.to.is_geographic())
    }

    pub fn inverse(&self) -> Self {
        Self::new(self.to, self.from)
    }

    /// Transform a single point.
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if self.is_identity() {
            return Ok((x, y));
        }
        let (lon, lat) = self.source.to_lonlat(x, y)?;
        self.target.from_lonlat(lon, lat)
    }

    /// Transform a bounding box by densifying its edges and taking the extent of
    /// the transformed points. Points outside the target domain are skipped.
    pub fn transform_bbox(&self, bbox: &BoundingBox, segments: usize) -> Result<BoundingBox> {
        if self.is_identity() {
            return Ok(*bbox);
        }

        let transformed = bbox
            .densify(segments)
            .into_iter()
            .filter_map(|(x, y)| self.transform(x, y).ok());

        BoundingBox::from_points(transformed).ok_or_else(|| ProjectionError::EmptyTransform {
            from: self.from.to_string(),
            to: self.to.to_string(),
        })
    }
}
