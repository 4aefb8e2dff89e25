//! Zipped ESRI Shapefile reading and writing.
//!
//! The radar platform ships vector products as a zip holding `.shp`, `.shx`,
//! `.dbf` and `.prj` files. Supported shape types are Null, Point, PolyLine,
//! Polygon and MultiPoint; Z and M variants are read as 2D.

use std::io::{Cursor, Read, Write};

use radar_common::CrsCode;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Result, TransformError};
use crate::types::{Coord, Feature, FieldDef, FieldKind, Geometry, VectorLayer};

const FILE_CODE: i32 = 9994;
const VERSION: i32 = 1000;
const HEADER_LEN: usize = 100;

const SHAPE_NULL: i32 = 0;
const SHAPE_POINT: i32 = 1;
const SHAPE_POLYLINE: i32 = 3;
const SHAPE_POLYGON: i32 = 5;
const SHAPE_MULTIPOINT: i32 = 8;

fn decode_err(e: impl ToString) -> TransformError {
    TransformError::decode("shapefile", e)
}

fn encode_err(e: impl ToString) -> TransformError {
    TransformError::encode("shapefile", e)
}

// ============================================================================
// Reading
// ============================================================================

/// Read the first layer of a zipped shapefile.
///
/// A missing `.prj` is taken as EPSG:4326.
pub fn read_zipped_shapefile(bytes: &[u8]) -> Result<VectorLayer> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(decode_err)?;

    let shp_name = archive
        .file_names()
        .find(|name| name.to_lowercase().ends_with(".shp"))
        .map(str::to_string)
        .ok_or_else(|| decode_err("archive contains no .shp file"))?;
    let stem = &shp_name[..shp_name.len() - 4];

    let shp = read_entry(&mut archive, &shp_name)?
        .ok_or_else(|| decode_err("cannot read .shp entry"))?;
    let dbf = read_sidecar(&mut archive, stem, "dbf")?;
    let prj = read_sidecar(&mut archive, stem, "prj")?;

    let geometries = read_shp(&shp)?;
    let (fields, records) = match dbf {
        Some(dbf) => read_dbf(&dbf)?,
        None => (Vec::new(), Vec::new()),
    };

    if !records.is_empty() && records.len() != geometries.len() {
        warn!(
            shapes = geometries.len(),
            records = records.len(),
            "Shapefile record count mismatch"
        );
    }

    let crs = match prj {
        Some(prj) => {
            let wkt = String::from_utf8_lossy(&prj);
            CrsCode::from_wkt(&wkt).ok_or_else(|| {
                TransformError::unsupported(format!("shapefile projection {}", wkt.trim()))
            })?
        }
        None => CrsCode::Epsg4326,
    };

    let mut records = records.into_iter();
    let features = geometries
        .into_iter()
        .map(|geometry| Feature {
            geometry,
            properties: records.next().unwrap_or_default(),
        })
        .collect::<Vec<_>>();

    debug!(entry = %shp_name, features = features.len(), crs = %crs, "Decoded shapefile");

    Ok(VectorLayer {
        features,
        crs,
        fields,
    })
}

fn read_entry<R: Read + std::io::Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(decode_err(e)),
    };
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buf).map_err(decode_err)?;
    Ok(Some(buf))
}

/// Sidecar lookup by stem, tolerant of extension case.
fn read_sidecar<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    stem: &str,
    ext: &str,
) -> Result<Option<Vec<u8>>> {
    let wanted = format!("{}.{}", stem, ext).to_lowercase();
    let name = archive
        .file_names()
        .find(|name| name.to_lowercase() == wanted)
        .map(str::to_string);
    match name {
        Some(name) => read_entry(archive, &name),
        None => Ok(None),
    }
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| decode_err(format!("unexpected end of data at byte {}", self.pos)))?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn i32_be(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    fn i32_le(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    fn f64_le(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    fn coord(&mut self) -> Result<Coord> {
        Ok([self.f64_le()?, self.f64_le()?])
    }

    fn count(&mut self) -> Result<usize> {
        let n = self.i32_le()?;
        usize::try_from(n).map_err(|_| decode_err(format!("negative count {}", n)))
    }
}

fn read_shp(bytes: &[u8]) -> Result<Vec<Geometry>> {
    if bytes.len() < HEADER_LEN {
        return Err(decode_err("truncated .shp header"));
    }
    let mut header = ByteReader::new(bytes, 0);
    if header.i32_be()? != FILE_CODE {
        return Err(decode_err("bad .shp file code"));
    }
    let mut header = ByteReader::new(bytes, 24);
    let file_len = header.i32_be()?.max(0) as usize * 2;
    let end = file_len.min(bytes.len());

    let mut geometries = Vec::new();
    let mut pos = HEADER_LEN;
    while pos + 8 <= end {
        let mut rec = ByteReader::new(bytes, pos);
        let _number = rec.i32_be()?;
        let content_len = rec.i32_be()?.max(0) as usize * 2;
        let content_end = rec.pos + content_len;
        if content_end > bytes.len() {
            return Err(decode_err("record extends past end of file"));
        }
        geometries.push(read_shape(&bytes[rec.pos..content_end])?);
        pos = content_end;
    }
    Ok(geometries)
}

fn read_shape(content: &[u8]) -> Result<Geometry> {
    let mut r = ByteReader::new(content, 0);
    let shape_type = r.i32_le()?;
    // Z (10+) and M (20+) variants share the XY layout of their base type
    let base = match shape_type {
        0 => SHAPE_NULL,
        1 | 11 | 21 => SHAPE_POINT,
        3 | 13 | 23 => SHAPE_POLYLINE,
        5 | 15 | 25 => SHAPE_POLYGON,
        8 | 18 | 28 => SHAPE_MULTIPOINT,
        other => return Err(TransformError::unsupported(format!("shape type {}", other))),
    };

    match base {
        SHAPE_NULL => Ok(Geometry::Null),
        SHAPE_POINT => Ok(Geometry::Point(r.coord()?)),
        SHAPE_MULTIPOINT => {
            for _ in 0..4 {
                r.f64_le()?;
            }
            let n = r.count()?;
            let points = (0..n).map(|_| r.coord()).collect::<Result<Vec<_>>>()?;
            Ok(Geometry::MultiPoint(points))
        }
        _ => {
            for _ in 0..4 {
                r.f64_le()?;
            }
            let num_parts = r.count()?;
            let num_points = r.count()?;
            let mut starts = (0..num_parts).map(|_| r.count()).collect::<Result<Vec<_>>>()?;
            let points = (0..num_points).map(|_| r.coord()).collect::<Result<Vec<_>>>()?;
            starts.push(num_points);

            let mut parts = Vec::with_capacity(num_parts);
            for window in starts.windows(2) {
                let (start, stop) = (window[0], window[1]);
                if start > stop || stop > points.len() {
                    return Err(decode_err("invalid part index"));
                }
                parts.push(points[start..stop].to_vec());
            }
            if base == SHAPE_POLYGON {
                Ok(Geometry::Polygon(parts))
            } else {
                Ok(Geometry::LineString(parts))
            }
        }
    }
}

fn read_dbf(bytes: &[u8]) -> Result<(Vec<FieldDef>, Vec<Map<String, Value>>)> {
    if bytes.len() < 32 {
        return Err(decode_err("truncated .dbf header"));
    }
    let num_records = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
    let record_len = u16::from_le_bytes([bytes[10], bytes[11]]) as usize;

    let mut fields = Vec::new();
    let mut pos = 32;
    while pos + 32 <= header_len.min(bytes.len()) && bytes[pos] != 0x0D {
        let desc = &bytes[pos..pos + 32];
        let name_end = desc[..11].iter().position(|b| *b == 0).unwrap_or(11);
        let name = String::from_utf8_lossy(&desc[..name_end]).trim().to_string();
        let kind = FieldKind::from_code(desc[11]).unwrap_or(FieldKind::Character);
        fields.push(FieldDef {
            name,
            kind,
            length: desc[16],
            decimals: desc[17],
        });
        pos += 32;
    }

    let mut records = Vec::with_capacity(num_records);
    for i in 0..num_records {
        let start = header_len + i * record_len;
        let Some(record) = bytes.get(start..start + record_len) else {
            break;
        };
        // deleted record
        if record[0] == b'*' {
            continue;
        }
        let mut offset = 1;
        let mut properties = Map::new();
        for field in &fields {
            let len = field.length as usize;
            let raw = record.get(offset..offset + len).unwrap_or_default();
            offset += len;
            properties.insert(field.name.clone(), parse_dbf_value(field, raw));
        }
        records.push(properties);
    }
    Ok((fields, records))
}

fn parse_dbf_value(field: &FieldDef, raw: &[u8]) -> Value {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_matches(|c: char| c == ' ' || c == '\0');
    match field.kind {
        FieldKind::Character | FieldKind::Date => Value::String(text.to_string()),
        FieldKind::Logical => match text.chars().next() {
            Some('T' | 't' | 'Y' | 'y') => Value::Bool(true),
            Some('F' | 'f' | 'N' | 'n') => Value::Bool(false),
            _ => Value::Null,
        },
        FieldKind::Numeric | FieldKind::Float => {
            if text.is_empty() || text.starts_with('*') {
                Value::Null
            } else if field.decimals == 0 {
                text.parse::<i64>()
                    .map(Value::from)
                    .or_else(|_| text.parse::<f64>().map(float_value))
                    .unwrap_or(Value::Null)
            } else {
                text.parse::<f64>().map(float_value).unwrap_or(Value::Null)
            }
        }
    }
}

fn float_value(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

// ============================================================================
// Writing
// ============================================================================

/// Encode a layer as a zip of `{stem}.shp/.shx/.dbf/.prj/.cpg`.
pub fn write_zipped_shapefile(layer: &VectorLayer, stem: &str) -> Result<Vec<u8>> {
    let shape_type = layer_shape_type(layer)?;
    let fields = if layer.fields.is_empty() {
        infer_fields(layer)
    } else {
        layer.fields.clone()
    };

    let (shp, shx) = write_shp(layer, shape_type);
    let dbf = write_dbf(layer, &fields);

    let prj = layer.crs.wkt();

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let entries: [(&str, &[u8]); 5] = [
        ("shp", &shp),
        ("shx", &shx),
        ("dbf", &dbf),
        ("prj", prj.as_bytes()),
        ("cpg", b"UTF-8"),
    ];
    for (ext, data) in entries {
        zip.start_file(format!("{}.{}", stem, ext), options)
            .map_err(encode_err)?;
        zip.write_all(data).map_err(encode_err)?;
    }
    let cursor = zip.finish().map_err(encode_err)?;
    Ok(cursor.into_inner())
}

fn layer_shape_type(layer: &VectorLayer) -> Result<i32> {
    let mut shape_type = SHAPE_NULL;
    for feature in &layer.features {
        let t = match feature.geometry {
            Geometry::Null => continue,
            Geometry::Point(_) => SHAPE_POINT,
            Geometry::MultiPoint(_) => SHAPE_MULTIPOINT,
            Geometry::LineString(_) => SHAPE_POLYLINE,
            Geometry::Polygon(_) => SHAPE_POLYGON,
        };
        if shape_type == SHAPE_NULL {
            shape_type = t;
        } else if shape_type != t {
            return Err(encode_err("mixed geometry types cannot share a shapefile"));
        }
    }
    Ok(shape_type)
}

fn bbox_of<'a>(coords: impl Iterator<Item = &'a Coord>) -> [f64; 4] {
    let mut b = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
    for c in coords {
        b[0] = b[0].min(c[0]);
        b[1] = b[1].min(c[1]);
        b[2] = b[2].max(c[0]);
        b[3] = b[3].max(c[1]);
    }
    if b[0].is_finite() {
        b
    } else {
        [0.0; 4]
    }
}

fn shape_content(geometry: &Geometry) -> Vec<u8> {
    let mut out = Vec::new();
    let push_f64 = |out: &mut Vec<u8>, v: f64| out.extend_from_slice(&v.to_le_bytes());
    let push_i32 = |out: &mut Vec<u8>, v: i32| out.extend_from_slice(&v.to_le_bytes());

    match geometry {
        Geometry::Null => push_i32(&mut out, SHAPE_NULL),
        Geometry::Point(c) => {
            push_i32(&mut out, SHAPE_POINT);
            push_f64(&mut out, c[0]);
            push_f64(&mut out, c[1]);
        }
        Geometry::MultiPoint(points) => {
            push_i32(&mut out, SHAPE_MULTIPOINT);
            for v in bbox_of(points.iter()) {
                push_f64(&mut out, v);
            }
            push_i32(&mut out, points.len() as i32);
            for c in points {
                push_f64(&mut out, c[0]);
                push_f64(&mut out, c[1]);
            }
        }
        Geometry::LineString(parts) | Geometry::Polygon(parts) => {
            let shape_type = if matches!(geometry, Geometry::Polygon(_)) {
                SHAPE_POLYGON
            } else {
                SHAPE_POLYLINE
            };
            push_i32(&mut out, shape_type);
            for v in bbox_of(parts.iter().flatten()) {
                push_f64(&mut out, v);
            }
            push_i32(&mut out, parts.len() as i32);
            push_i32(&mut out, parts.iter().map(Vec::len).sum::<usize>() as i32);
            let mut start = 0;
            for part in parts {
                push_i32(&mut out, start as i32);
                start += part.len();
            }
            for c in parts.iter().flatten() {
                push_f64(&mut out, c[0]);
                push_f64(&mut out, c[1]);
            }
        }
    }
    out
}

fn write_header(out: &mut Vec<u8>, file_len_bytes: usize, shape_type: i32, bbox: [f64; 4]) {
    out.extend_from_slice(&FILE_CODE.to_be_bytes());
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&((file_len_bytes / 2) as i32).to_be_bytes());
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&shape_type.to_le_bytes());
    for v in bbox {
        out.extend_from_slice(&v.to_le_bytes());
    }
    // Z and M ranges
    out.extend_from_slice(&[0u8; 32]);
}

fn write_shp(layer: &VectorLayer, shape_type: i32) -> (Vec<u8>, Vec<u8>) {
    let contents: Vec<Vec<u8>> = layer
        .features
        .iter()
        .map(|f| shape_content(&f.geometry))
        .collect();
    let bbox = bbox_of(layer.features.iter().flat_map(|f| f.geometry.coords()));

    let shp_len = HEADER_LEN + contents.iter().map(|c| 8 + c.len()).sum::<usize>();
    let shx_len = HEADER_LEN + contents.len() * 8;

    let mut shp = Vec::with_capacity(shp_len);
    let mut shx = Vec::with_capacity(shx_len);
    write_header(&mut shp, shp_len, shape_type, bbox);
    write_header(&mut shx, shx_len, shape_type, bbox);

    for (i, content) in contents.iter().enumerate() {
        let offset_words = (shp.len() / 2) as i32;
        let len_words = (content.len() / 2) as i32;
        shx.extend_from_slice(&offset_words.to_be_bytes());
        shx.extend_from_slice(&len_words.to_be_bytes());

        shp.extend_from_slice(&(i as i32 + 1).to_be_bytes());
        shp.extend_from_slice(&len_words.to_be_bytes());
        shp.extend_from_slice(content);
    }
    (shp, shx)
}

/// Derive a dBASE schema from feature properties.
fn infer_fields(layer: &VectorLayer) -> Vec<FieldDef> {
    let mut fields: Vec<FieldDef> = Vec::new();
    for feature in &layer.features {
        for (name, value) in &feature.properties {
            let (kind, length, decimals) = match value {
                Value::Null => continue,
                Value::Bool(_) => (FieldKind::Logical, 1, 0),
                Value::Number(n) if n.is_i64() || n.is_u64() => (FieldKind::Numeric, 18, 0),
                Value::Number(_) => (FieldKind::Numeric, 19, 8),
                other => {
                    let len = value_text(other).len().clamp(1, 254);
                    (FieldKind::Character, len as u8, 0)
                }
            };
            match fields.iter_mut().find(|f| f.name == dbf_name(name)) {
                Some(existing) => widen(existing, kind, length, decimals),
                None => fields.push(FieldDef {
                    name: dbf_name(name),
                    kind,
                    length,
                    decimals,
                }),
            }
        }
    }
    fields
}

fn widen(field: &mut FieldDef, kind: FieldKind, length: u8, decimals: u8) {
    if field.kind != kind {
        if field.kind == FieldKind::Numeric && kind == FieldKind::Numeric {
            field.decimals = field.decimals.max(decimals);
        } else {
            field.kind = FieldKind::Character;
            field.decimals = 0;
            field.length = field.length.max(24);
        }
    }
    field.length = field.length.max(length);
    field.decimals = field.decimals.max(decimals);
}

/// dBASE column names are at most 10 bytes.
fn dbf_name(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if out.len() + c.len_utf8() > 10 {
            break;
        }
        out.push(c);
    }
    out
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_dbf_value(field: &FieldDef, value: Option<&Value>) -> Vec<u8> {
    let len = field.length as usize;
    let text = match (field.kind, value) {
        (_, None | Some(Value::Null)) => String::new(),
        (FieldKind::Logical, Some(Value::Bool(b))) => (if *b { "T" } else { "F" }).to_string(),
        (FieldKind::Numeric | FieldKind::Float, Some(Value::Number(n))) => {
            let formatted = if field.decimals == 0 {
                n.as_i64()
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| format!("{:.0}", n.as_f64().unwrap_or_default()))
            } else {
                format!("{:.*}", field.decimals as usize, n.as_f64().unwrap_or_default())
            };
            format!("{:>width$}", formatted, width = len)
        }
        (_, Some(other)) => value_text(other),
    };

    let mut bytes = Vec::with_capacity(len);
    for c in text.chars() {
        if bytes.len() + c.len_utf8() > len {
            break;
        }
        let mut tmp = [0u8; 4];
        bytes.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
    }
    bytes.resize(len, b' ');
    bytes
}

fn write_dbf(layer: &VectorLayer, fields: &[FieldDef]) -> Vec<u8> {
    let header_len = 32 + fields.len() * 32 + 1;
    let record_len = 1 + fields.iter().map(|f| f.length as usize).sum::<usize>();

    let mut out = Vec::with_capacity(header_len + record_len * layer.features.len() + 1);
    out.push(0x03);
    // last update YY MM DD
    out.extend_from_slice(&[125, 1, 1]);
    out.extend_from_slice(&(layer.features.len() as u32).to_le_bytes());
    out.extend_from_slice(&(header_len as u16).to_le_bytes());
    out.extend_from_slice(&(record_len as u16).to_le_bytes());
    out.extend_from_slice(&[0u8; 20]);

    for field in fields {
        let mut desc = [0u8; 32];
        let name = field.name.as_bytes();
        let n = name.len().min(10);
        desc[..n].copy_from_slice(&name[..n]);
        desc[11] = field.kind.code();
        desc[16] = field.length;
        desc[17] = field.decimals;
        out.extend_from_slice(&desc);
    }
    out.push(0x0D);

    for feature in &layer.features {
        out.push(b' ');
        for field in fields {
            let value = feature
                .properties
                .iter()
                .find(|(k, _)| dbf_name(k) == field.name)
                .map(|(_, v)| v);
            out.extend_from_slice(&format_dbf_value(field, value));
        }
    }
    out.push(0x1A);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn lightning_layer() -> VectorLayer {
        VectorLayer {
            features: vec![
                Feature {
                    geometry: Geometry::Point([12.3, 45.4]),
                    properties: props(json!({"intensity": 12, "polarity": "neg", "cloud": true})),
                },
                Feature {
                    geometry: Geometry::Point([9.1, 39.2]),
                    properties: props(json!({"intensity": -4.25, "polarity": "pos"})),
                },
            ],
            crs: CrsCode::Epsg4326,
            fields: Vec::new(),
        }
    }

    #[test]
    fn test_point_layer_survives_zip() {
        let layer = lightning_layer();
        let bytes = write_zipped_shapefile(&layer, "LTG_202507011200").unwrap();
        let decoded = read_zipped_shapefile(&bytes).unwrap();

        assert_eq!(decoded.crs, CrsCode::Epsg4326);
        assert_eq!(decoded.features.len(), 2);
        assert_eq!(decoded.features[0].geometry, Geometry::Point([12.3, 45.4]));
        assert_eq!(decoded.features[0].properties["polarity"], json!("neg"));
        assert_eq!(decoded.features[0].properties["cloud"], json!(true));
        assert_eq!(decoded.features[1].properties["intensity"], json!(-4.25));
        // absent logical value reads back as null
        assert_eq!(decoded.features[1].properties["cloud"], Value::Null);
    }

    #[test]
    fn test_polygon_parts_and_projection() {
        let ring_outer = vec![[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0], [0.0, 0.0]];
        let ring_hole = vec![[2.0, 2.0], [4.0, 2.0], [4.0, 4.0], [2.0, 4.0], [2.0, 2.0]];
        let layer = VectorLayer {
            features: vec![Feature {
                geometry: Geometry::Polygon(vec![ring_outer.clone(), ring_hole.clone()]),
                properties: props(json!({"status": "ok"})),
            }],
            crs: CrsCode::Epsg32633,
            fields: Vec::new(),
        };
        let decoded = read_zipped_shapefile(&write_zipped_shapefile(&layer, "RADAR").unwrap()).unwrap();
        assert_eq!(decoded.crs, CrsCode::Epsg32633);
        assert_eq!(
            decoded.features[0].geometry,
            Geometry::Polygon(vec![ring_outer, ring_hole])
        );
    }

    #[test]
    fn test_mixed_geometries_rejected() {
        let mut layer = lightning_layer();
        layer.features.push(Feature {
            geometry: Geometry::LineString(vec![vec![[0.0, 0.0], [1.0, 1.0]]]),
            properties: Map::new(),
        });
        assert!(matches!(
            write_zipped_shapefile(&layer, "mixed"),
            Err(TransformError::Encode { .. })
        ));
    }

    #[test]
    fn test_missing_shp_is_decode_error() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("readme.txt", FileOptions::default()).unwrap();
        zip.write_all(b"hello").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(
            read_zipped_shapefile(&bytes),
            Err(TransformError::Decode { .. })
        ));
    }

    #[test]
    fn test_long_field_names_truncated() {
        assert_eq!(dbf_name("precipitation_rate"), "precipitat");
        assert_eq!(dbf_name("id"), "id");
    }
}
