//! GeoJSON FeatureCollection reading and writing.
//!
//! Non-WGS84 layers carry the legacy `crs` member
//! (`urn:ogc:def:crs:EPSG::<code>`). Polygon rings are written with the
//! RFC 7946 orientation (outer counter-clockwise) and normalised back to the
//! shapefile convention on read.

use radar_common::CrsCode;
use serde_json::{json, Map, Value};

use crate::error::{Result, TransformError};
use crate::types::{Coord, Feature, Geometry, VectorLayer};

fn decode_err(e: impl ToString) -> TransformError {
    TransformError::decode("geojson", e)
}

/// Twice the signed area of a ring; positive when counter-clockwise.
fn signed_area(ring: &[Coord]) -> f64 {
    ring.windows(2)
        .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
        .sum()
}

fn oriented(ring: &[Coord], counter_clockwise: bool) -> Vec<Coord> {
    let mut ring = ring.to_vec();
    if (signed_area(&ring) > 0.0) != counter_clockwise {
        ring.reverse();
    }
    ring
}

// ============================================================================
// Reading
// ============================================================================

pub fn read_geojson(bytes: &[u8]) -> Result<VectorLayer> {
    let root: Value = serde_json::from_slice(bytes).map_err(decode_err)?;
    let crs = match root.pointer("/crs/properties/name").and_then(Value::as_str) {
        Some(name) => crs_from_urn(name)
            .ok_or_else(|| TransformError::unsupported(format!("GeoJSON CRS {}", name)))?,
        None => CrsCode::Epsg4326,
    };

    let features = match root.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => root
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| decode_err("FeatureCollection without features array"))?
            .iter()
            .map(read_feature)
            .collect::<Result<Vec<_>>>()?,
        Some("Feature") => vec![read_feature(&root)?],
        Some(_) => vec![Feature {
            geometry: read_geometry(&root)?,
            properties: Map::new(),
        }],
        None => return Err(decode_err("missing type member")),
    };

    Ok(VectorLayer {
        features,
        crs,
        fields: Vec::new(),
    })
}

/// Parses `urn:ogc:def:crs:EPSG::32633`, `EPSG:32633` and the OGC CRS84 urn.
fn crs_from_urn(name: &str) -> Option<CrsCode> {
    if name.to_uppercase().ends_with("CRS84") {
        return Some(CrsCode::Epsg4326);
    }
    let code = name.rsplit(':').next()?;
    code.trim().parse().ok().and_then(CrsCode::from_epsg)
}

fn read_feature(value: &Value) -> Result<Feature> {
    let geometry = match value.get("geometry") {
        None | Some(Value::Null) => Geometry::Null,
        Some(g) => read_geometry(g)?,
    };
    let properties = match value.get("properties") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    Ok(Feature {
        geometry,
        properties,
    })
}

fn coord(value: &Value) -> Result<Coord> {
    let arr = value
        .as_array()
        .filter(|a| a.len() >= 2)
        .ok_or_else(|| decode_err("position must have at least two numbers"))?;
    match (arr[0].as_f64(), arr[1].as_f64()) {
        (Some(x), Some(y)) => Ok([x, y]),
        _ => Err(decode_err("position must contain numbers")),
    }
}

fn coord_list(value: &Value) -> Result<Vec<Coord>> {
    value
        .as_array()
        .ok_or_else(|| decode_err("expected an array of positions"))?
        .iter()
        .map(coord)
        .collect()
}

fn nested<T>(value: &Value, f: impl Fn(&Value) -> Result<T>) -> Result<Vec<T>> {
    value
        .as_array()
        .ok_or_else(|| decode_err("expected a nested coordinate array"))?
        .iter()
        .map(f)
        .collect()
}

/// Shapefile ring order for one polygon: outer clockwise, holes counter-clockwise.
fn polygon_rings(value: &Value) -> Result<Vec<Vec<Coord>>> {
    let rings = nested(value, coord_list)?;
    Ok(rings
        .iter()
        .enumerate()
        .map(|(i, ring)| oriented(ring, i > 0))
        .collect())
}

fn read_geometry(value: &Value) -> Result<Geometry> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| decode_err("geometry without type"))?;
    let coords = || {
        value
            .get("coordinates")
            .ok_or_else(|| decode_err(format!("{} without coordinates", kind)))
    };

    match kind {
        "Point" => Ok(Geometry::Point(coord(coords()?)?)),
        "MultiPoint" => Ok(Geometry::MultiPoint(coord_list(coords()?)?)),
        "LineString" => Ok(Geometry::LineString(vec![coord_list(coords()?)?])),
        "MultiLineString" => Ok(Geometry::LineString(nested(coords()?, coord_list)?)),
        "Polygon" => Ok(Geometry::Polygon(polygon_rings(coords()?)?)),
        "MultiPolygon" => Ok(Geometry::Polygon(
            nested(coords()?, polygon_rings)?.into_iter().flatten().collect(),
        )),
        other => Err(TransformError::unsupported(format!("GeoJSON geometry {}", other))),
    }
}

// ============================================================================
// Writing
// ============================================================================

pub fn write_geojson(layer: &VectorLayer) -> Result<Vec<u8>> {
    let features: Vec<Value> = layer
        .features
        .iter()
        .map(|f| {
            json!({
                "type": "Feature",
                "geometry": geometry_json(&f.geometry),
                "properties": f.properties,
            })
        })
        .collect();

    let mut root = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    if layer.crs != CrsCode::Epsg4326 {
        root["crs"] = json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", layer.crs.epsg()) },
        });
    }

    serde_json::to_vec(&root).map_err(|e| TransformError::encode("geojson", e))
}

fn geometry_json(geometry: &Geometry) -> Value {
    match geometry {
        Geometry::Null => Value::Null,
        Geometry::Point(c) => json!({ "type": "Point", "coordinates": c }),
        Geometry::MultiPoint(points) => json!({ "type": "MultiPoint", "coordinates": points }),
        Geometry::LineString(parts) if parts.len() == 1 => {
            json!({ "type": "LineString", "coordinates": parts[0] })
        }
        Geometry::LineString(parts) => json!({ "type": "MultiLineString", "coordinates": parts }),
        Geometry::Polygon(rings) => {
            let polygons = group_rings(rings);
            if polygons.len() == 1 {
                json!({ "type": "Polygon", "coordinates": polygons[0] })
            } else {
                json!({ "type": "MultiPolygon", "coordinates": polygons })
            }
        }
    }
}

/// Split shapefile rings into polygons: each clockwise ring opens a new
/// polygon, counter-clockwise rings are holes of the current one.
fn group_rings(rings: &[Vec<Coord>]) -> Vec<Vec<Vec<Coord>>> {
    let mut polygons: Vec<Vec<Vec<Coord>>> = Vec::new();
    for ring in rings {
        let is_hole = signed_area(ring) > 0.0;
        match polygons.last_mut() {
            Some(polygon) if is_hole => polygon.push(oriented(ring, false)),
            _ => polygons.push(vec![oriented(ring, true)]),
        }
    }
    polygons
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE_CCW: [Coord; 5] = [[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]];

    #[test]
    fn test_polygon_orientation_normalised() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [SQUARE_CCW] },
                "properties": { "name": "area" }
            }]
        });
        let layer = read_geojson(doc.to_string().as_bytes()).unwrap();
        let Geometry::Polygon(rings) = &layer.features[0].geometry else {
            panic!("expected polygon");
        };
        // stored clockwise
        assert!(signed_area(&rings[0]) < 0.0);

        let written: Value = serde_json::from_slice(&write_geojson(&layer).unwrap()).unwrap();
        assert_eq!(written["features"][0]["geometry"]["type"], "Polygon");
        assert_eq!(written["features"][0]["geometry"]["coordinates"][0], json!(SQUARE_CCW));
        assert!(written.get("crs").is_none());
    }

    #[test]
    fn test_multipolygon_roundtrip() {
        let far: Vec<Coord> = SQUARE_CCW.iter().map(|c| [c[0] + 10.0, c[1]]).collect();
        let doc = json!({
            "type": "Feature",
            "geometry": { "type": "MultiPolygon", "coordinates": [[SQUARE_CCW], [far]] },
            "properties": {}
        });
        let layer = read_geojson(doc.to_string().as_bytes()).unwrap();
        let written: Value = serde_json::from_slice(&write_geojson(&layer).unwrap()).unwrap();
        assert_eq!(written["features"][0]["geometry"]["type"], "MultiPolygon");
        assert_eq!(
            written["features"][0]["geometry"]["coordinates"]
                .as_array()
                .map(Vec::len),
            Some(2)
        );
    }

    #[test]
    fn test_legacy_crs_member() {
        let layer = VectorLayer {
            features: vec![Feature {
                geometry: Geometry::Point([291000.0, 4640000.0]),
                properties: Map::new(),
            }],
            crs: CrsCode::Epsg32633,
            fields: Vec::new(),
        };
        let bytes = write_geojson(&layer).unwrap();
        let decoded = read_geojson(&bytes).unwrap();
        assert_eq!(decoded.crs, CrsCode::Epsg32633);
        assert_eq!(decoded.features, layer.features);
    }

    #[test]
    fn test_crs_urns() {
        assert_eq!(crs_from_urn("urn:ogc:def:crs:OGC:1.3:CRS84"), Some(CrsCode::Epsg4326));
        assert_eq!(crs_from_urn("EPSG:3857"), Some(CrsCode::Epsg3857));
        assert_eq!(crs_from_urn("urn:ogc:def:crs:EPSG::2154"), None);
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        assert!(matches!(read_geojson(b"{"), Err(TransformError::Decode { .. })));
    }
}
