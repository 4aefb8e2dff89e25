//! Core types for payload transformation.

use bytes::Bytes;
use radar_common::{BoundingBox, CrsCode, DataFormat};
use serde_json::{Map, Value};

/// A payload as downloaded from upstream.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub bytes: Bytes,
    pub format: DataFormat,
    /// Filename announced by upstream
    pub filename: String,
}

/// A payload ready for delivery.
#[derive(Debug, Clone)]
pub struct TransformedPayload {
    pub bytes: Bytes,
    pub format: DataFormat,
    /// `{CODE}_{YYYYmmddHHMM}.{ext}`
    pub filename: String,
    /// True when the bytes are exactly those downloaded
    pub passthrough: bool,
}

/// Optional clip / reproject / re-encode settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformOptions {
    pub bbox: Option<BoundingBox>,
    /// CRS the bbox is expressed in
    pub bbox_crs: CrsCode,
    pub target_crs: Option<CrsCode>,
    pub target_format: Option<DataFormat>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            bbox: None,
            bbox_crs: CrsCode::Epsg4326,
            target_crs: None,
            target_format: None,
        }
    }
}

impl TransformOptions {
    /// True when a payload in `native` format would come out unchanged.
    pub fn is_passthrough(&self, native: DataFormat) -> bool {
        self.bbox.is_none()
            && self.target_crs.is_none()
            && self.target_format.map_or(true, |f| f == native)
    }
}

/// Affine mapping of a north-up raster: pixel (col, row) has its top-left
/// corner at (origin_x + col * pixel_width, origin_y - row * pixel_height).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// World coordinates of a pixel center.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y - (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional pixel coordinates of a world point, where integer values
    /// are pixel centers.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width - 0.5,
            (self.origin_y - y) / self.pixel_height - 0.5,
        )
    }
}

/// Single-band float raster. Nodata cells hold NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
    pub transform: GeoTransform,
    pub crs: CrsCode,
}

impl Raster {
    pub fn bounds(&self) -> BoundingBox {
        let t = &self.transform;
        BoundingBox::new(
            t.origin_x,
            t.origin_y - self.height as f64 * t.pixel_height,
            t.origin_x + self.width as f64 * t.pixel_width,
            t.origin_y,
        )
    }

    pub fn value(&self, col: usize, row: usize) -> Option<f32> {
        if col < self.width && row < self.height {
            Some(self.data[row * self.width + col])
        } else {
            None
        }
    }

    /// Number of cells with data.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }
}

/// A coordinate pair (x, y).
pub type Coord = [f64; 2];

/// Geometries as stored in shapefiles.
///
/// Polygon rings follow the shapefile convention: outer rings clockwise,
/// holes counter-clockwise.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Null,
    Point(Coord),
    MultiPoint(Vec<Coord>),
    /// One or more parts
    LineString(Vec<Vec<Coord>>),
    /// Rings of one or more polygons
    Polygon(Vec<Vec<Coord>>),
}

impl Geometry {
    pub fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            Geometry::Null => Box::new(std::iter::empty()),
            Geometry::Point(c) => Box::new(std::iter::once(c)),
            Geometry::MultiPoint(points) => Box::new(points.iter()),
            Geometry::LineString(parts) | Geometry::Polygon(parts) => {
                Box::new(parts.iter().flatten())
            }
        }
    }

    pub fn envelope(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.coords().map(|c| (c[0], c[1])))
    }

    /// Apply a fallible function to every coordinate.
    pub fn try_map_coords<E, F>(&self, f: &F) -> Result<Geometry, E>
    where
        F: Fn(f64, f64) -> Result<(f64, f64), E>,
    {
        let map_one = |c: &Coord| f(c[0], c[1]).map(|(x, y)| [x, y]);
        let map_parts = |parts: &Vec<Vec<Coord>>| {
            parts
                .iter()
                .map(|part| part.iter().map(&map_one).collect::<Result<Vec<_>, E>>())
                .collect::<Result<Vec<_>, E>>()
        };
        Ok(match self {
            Geometry::Null => Geometry::Null,
            Geometry::Point(c) => Geometry::Point(map_one(c)?),
            Geometry::MultiPoint(points) => {
                Geometry::MultiPoint(points.iter().map(&map_one).collect::<Result<_, E>>()?)
            }
            Geometry::LineString(parts) => Geometry::LineString(map_parts(parts)?),
            Geometry::Polygon(rings) => Geometry::Polygon(map_parts(rings)?),
        })
    }
}

/// Attribute column types of a dBASE table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Character,
    Numeric,
    Float,
    Logical,
    Date,
}

impl FieldKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'C' => Some(FieldKind::Character),
            b'N' => Some(FieldKind::Numeric),
            b'F' => Some(FieldKind::Float),
            b'L' => Some(FieldKind::Logical),
            b'D' => Some(FieldKind::Date),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            FieldKind::Character => b'C',
            FieldKind::Numeric => b'N',
            FieldKind::Float => b'F',
            FieldKind::Logical => b'L',
            FieldKind::Date => b'D',
        }
    }
}

/// A dBASE column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub length: u8,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Map<String, Value>,
}

/// A feature collection in a single CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayer {
    pub features: Vec<Feature>,
    pub crs: CrsCode,
    /// Column schema when read from a shapefile; inferred on write otherwise
    pub fields: Vec<FieldDef>,
}

impl VectorLayer {
    pub fn extent(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(
            self.features
                .iter()
                .flat_map(|f| f.geometry.coords())
                .map(|c| (c[0], c[1])),
        )
    }
}
