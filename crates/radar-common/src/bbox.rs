//! Bounding box types and operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A geographic or projected bounding box.
///
/// For geographic CRS (EPSG:4326, EPSG:4258), coordinates are in degrees.
/// For projected CRS (EPSG:3857, UTM zones), coordinates are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a bounding box without validating corner order.
    ///
    /// Use [`BoundingBox::try_new`] for anything that comes from a caller.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create a bounding box, requiring finite corners with min_x < max_x and min_y < max_y.
    pub fn try_new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, BboxParseError> {
        let bbox = Self::new(min_x, min_y, max_x, max_y);
        if ![min_x, min_y, max_x, max_y].iter().all(|v| v.is_finite()) {
            return Err(BboxParseError::NonFinite(bbox.to_string()));
        }
        if min_x >= max_x || min_y >= max_y {
            return Err(BboxParseError::Inverted(bbox.to_string()));
        }
        Ok(bbox)
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if this bbox intersects another. Boxes sharing only an edge count as intersecting.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Check if a point is contained within this bbox (edges included).
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Smallest box covering all the given points, or None for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter().filter(|(x, y)| x.is_finite() && y.is_finite());
        let (x0, y0) = iter.next()?;
        let mut bbox = BoundingBox::new(x0, y0, x0, y0);
        for (x, y) in iter {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        Some(bbox)
    }

    /// Points along the four edges, `segments` per edge, for transforming a box between CRSs.
    pub fn densify(&self, segments: usize) -> Vec<(f64, f64)> {
        let n = segments.max(1);
        let mut points = Vec::with_capacity(n * 4);
        for i in 0..n {
            let t = i as f64 / n as f64;
            let x = self.min_x + t * self.width();
            let y = self.min_y + t * self.height();
            points.push((x, self.min_y));
            points.push((self.max_x, y));
            points.push((self.max_x - t * self.width(), self.max_y));
            points.push((self.min_x, self.max_y - t * self.height()));
        }
        points
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

/// Parses "minx,miny,maxx,maxy" and validates the corner order.
impl FromStr for BoundingBox {
    type Err = BboxParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        BoundingBox::try_new(values[0], values[1], values[2], values[3])
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),

    #[error("BBOX corners out of order: {0}. Expected minx<maxx and miny<maxy")]
    Inverted(String),

    #[error("BBOX has non-finite coordinates: {0}")]
    NonFinite(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox: BoundingBox = "12,45.15,12.7,45.6".parse().unwrap();
        assert_eq!(bbox.min_x, 12.0);
        assert_eq!(bbox.min_y, 45.15);
        assert_eq!(bbox.max_x, 12.7);
        assert_eq!(bbox.max_y, 45.6);
    }

    #[test]
    fn test_inverted_bbox_rejected() {
        assert!(matches!(
            "12.7,45.15,12,45.6".parse::<BoundingBox>(),
            Err(BboxParseError::Inverted(_))
        ));
        assert!(matches!(
            BoundingBox::try_new(0.0, 1.0, 1.0, 1.0),
            Err(BboxParseError::Inverted(_))
        ));
    }

    #[test]
    fn test_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let intersection = a.intersection(&b).unwrap();
        assert_eq!(intersection, BoundingBox::new(5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_densify_covers_corners() {
        let bbox = BoundingBox::new(0.0, 0.0, 4.0, 2.0);
        let points = bbox.densify(4);
        assert_eq!(points.len(), 16);
        assert_eq!(BoundingBox::from_points(points), Some(bbox));
    }
}
