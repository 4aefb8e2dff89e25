//! Single-band GeoTIFF reading and writing.
//!
//! Only north-up rasters georeferenced with ModelPixelScale + ModelTiepoint
//! (or an axis-aligned ModelTransformation) are supported, which is what the
//! radar platform publishes. The CRS comes from the GeoKey directory.

use std::io::Cursor;

use radar_common::CrsCode;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tracing::debug;

use crate::error::{Result, TransformError};
use crate::types::{GeoTransform, Raster};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u32 = 1024;
const GT_RASTER_TYPE_KEY: u32 = 1025;
const GEOGRAPHIC_TYPE_KEY: u32 = 2048;
const PROJECTED_CS_TYPE_KEY: u32 = 3072;

/// Values at or below this are treated as nodata regardless of the GDAL tag.
pub const NODATA_THRESHOLD: f32 = -9999.0;

/// Value written for nodata cells.
pub const NODATA_VALUE: f32 = -9999.0;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn decode_err(e: impl ToString) -> TransformError {
    TransformError::decode("geotiff", e)
}

fn encode_err(e: impl ToString) -> TransformError {
    TransformError::encode("geotiff", e)
}

/// Decode the first band of a GeoTIFF into a [`Raster`].
pub fn read_geotiff(bytes: &[u8]) -> Result<Raster> {
    let mut decoder = Decoder::new(Cursor::new(bytes)).map_err(decode_err)?;
    let (width, height) = decoder.dimensions().map_err(decode_err)?;
    let (width, height) = (width as usize, height as usize);

    let transform = read_geotransform(&mut decoder)?;
    let crs = read_crs(&mut decoder)?;
    let nodata = decoder
        .find_tag(tag(GDAL_NODATA))
        .map_err(decode_err)?
        .and_then(|v| v.into_string().ok())
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

    let samples = to_f32(decoder.read_image().map_err(decode_err)?)?;
    let pixels = width * height;
    if pixels == 0 || samples.len() < pixels || samples.len() % pixels != 0 {
        return Err(decode_err(format!(
            "{} samples for a {}x{} image",
            samples.len(),
            width,
            height
        )));
    }
    let bands = samples.len() / pixels;

    let data: Vec<f32> = samples
        .into_iter()
        .step_by(bands)
        .map(|v| {
            let is_nodata = nodata.is_some_and(|nd| (v as f64 - nd).abs() < 1e-6)
                || v <= NODATA_THRESHOLD;
            if is_nodata {
                f32::NAN
            } else {
                v
            }
        })
        .collect();

    debug!(width, height, bands, crs = %crs, "Decoded GeoTIFF");

    Ok(Raster {
        width,
        height,
        data,
        transform,
        crs,
    })
}

fn read_geotransform<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    let scale = decoder
        .find_tag(tag(MODEL_PIXEL_SCALE))
        .map_err(decode_err)?
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(decode_err)?;
    let tiepoint = decoder
        .find_tag(tag(MODEL_TIEPOINT))
        .map_err(decode_err)?
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(decode_err)?;

    if let (Some(scale), Some(tie)) = (scale, tiepoint) {
        if scale.len() < 2 || tie.len() < 6 {
            return Err(decode_err("truncated georeferencing tags"));
        }
        // Tiepoint (i, j, k, x, y, z): raster point (i, j) maps to world (x, y)
        let (pixel_width, pixel_height) = (scale[0], scale[1]);
        return Ok(GeoTransform {
            origin_x: tie[3] - tie[0] * pixel_width,
            origin_y: tie[4] + tie[1] * pixel_height,
            pixel_width,
            pixel_height,
        });
    }

    let matrix = decoder
        .find_tag(tag(MODEL_TRANSFORMATION))
        .map_err(decode_err)?
        .map(|v| v.into_f64_vec())
        .transpose()
        .map_err(decode_err)?
        .ok_or_else(|| decode_err("missing georeferencing tags"))?;

    if matrix.len() < 8 {
        return Err(decode_err("truncated ModelTransformation"));
    }
    if matrix[1].abs() > 1e-12 || matrix[4].abs() > 1e-12 || matrix[5] >= 0.0 {
        return Err(decode_err("rotated or south-up rasters are not supported"));
    }
    Ok(GeoTransform {
        origin_x: matrix[3],
        origin_y: matrix[7],
        pixel_width: matrix[0],
        pixel_height: -matrix[5],
    })
}

fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<CrsCode> {
    let keys = match decoder.find_tag(tag(GEO_KEY_DIRECTORY)).map_err(decode_err)? {
        Some(value) => value.into_u32_vec().map_err(decode_err)?,
        None => return Ok(CrsCode::Epsg4326),
    };

    // Header (version, revision, minor, count) then (id, location, count, value) entries
    let mut projected = None;
    let mut geographic = None;
    for entry in keys.get(4..).unwrap_or_default().chunks_exact(4) {
        // location 0 means the value is stored inline
        if entry[1] != 0 {
            continue;
        }
        match entry[0] {
            PROJECTED_CS_TYPE_KEY => projected = Some(entry[3]),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(entry[3]),
            _ => {}
        }
    }

    match projected.or(geographic) {
        Some(code) => CrsCode::from_epsg(code)
            .ok_or_else(|| TransformError::unsupported(format!("raster CRS EPSG:{}", code))),
        None => Ok(CrsCode::Epsg4326),
    }
}

fn to_f32(result: DecodingResult) -> Result<Vec<f32>> {
    #[allow(unreachable_patterns)]
    let values = match result {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => return Err(decode_err("unsupported sample format")),
    };
    Ok(values)
}

/// Encode a raster as a single-band Float32 GeoTIFF with nodata -9999.
pub fn write_geotiff(raster: &Raster) -> Result<Vec<u8>> {
    let t = &raster.transform;
    let scale = [t.pixel_width, t.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
    let geokeys = geokey_directory(raster.crs);
    let data: Vec<f32> = raster
        .data
        .iter()
        .map(|v| if v.is_nan() { NODATA_VALUE } else { *v })
        .collect();

    let mut buf = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buf).map_err(encode_err)?;
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(raster.width as u32, raster.height as u32)
            .map_err(encode_err)?;
        image
            .encoder()
            .write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])
            .map_err(encode_err)?;
        image
            .encoder()
            .write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])
            .map_err(encode_err)?;
        image
            .encoder()
            .write_tag(tag(GEO_KEY_DIRECTORY), &geokeys[..])
            .map_err(encode_err)?;
        image
            .encoder()
            .write_tag(tag(GDAL_NODATA), "-9999")
            .map_err(encode_err)?;
        image.write_data(&data).map_err(encode_err)?;
    }
    Ok(buf.into_inner())
}

fn geokey_directory(crs: CrsCode) -> Vec<u16> {
    let (model_type, crs_key) = if crs.is_geographic() {
        (2u16, GEOGRAPHIC_TYPE_KEY as u16)
    } else {
        (1u16, PROJECTED_CS_TYPE_KEY as u16)
    };
    vec![
        1, 1, 0, 3,
        GT_MODEL_TYPE_KEY as u16, 0, 1, model_type,
        GT_RASTER_TYPE_KEY as u16, 0, 1, 1,
        crs_key, 0, 1, crs.epsg() as u16,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{create_rainfall_grid, ITALY_COARSE};

    fn italy_raster(crs: CrsCode) -> Raster {
        let spec = ITALY_COARSE;
        let mut data = create_rainfall_grid(spec.width, spec.height, 40.0);
        for v in data.iter_mut() {
            if *v <= NODATA_THRESHOLD {
                *v = f32::NAN;
            }
        }
        Raster {
            width: spec.width,
            height: spec.height,
            data,
            transform: GeoTransform {
                origin_x: spec.origin_x,
                origin_y: spec.origin_y,
                pixel_width: spec.pixel_size,
                pixel_height: spec.pixel_size,
            },
            crs,
        }
    }

    #[test]
    fn test_write_then_read_keeps_georeferencing() {
        let raster = italy_raster(CrsCode::Epsg4326);
        let bytes = write_geotiff(&raster).unwrap();
        assert_eq!(&bytes[..2], b"II");

        let decoded = read_geotiff(&bytes).unwrap();
        assert_eq!(decoded.width, raster.width);
        assert_eq!(decoded.height, raster.height);
        assert_eq!(decoded.transform, raster.transform);
        assert_eq!(decoded.crs, CrsCode::Epsg4326);
        assert_eq!(decoded.bounds(), raster.bounds());
    }

    #[test]
    fn test_nodata_becomes_nan() {
        let raster = italy_raster(CrsCode::Epsg4326);
        let decoded = read_geotiff(&write_geotiff(&raster).unwrap()).unwrap();
        assert!(decoded.data[0].is_nan());
        assert_eq!(decoded.valid_count(), raster.valid_count());
    }

    #[test]
    fn test_projected_crs_from_geokeys() {
        let mut raster = italy_raster(CrsCode::Epsg32633);
        raster.transform.origin_x = 250000.0;
        raster.transform.origin_y = 4700000.0;
        raster.transform.pixel_width = 1000.0;
        raster.transform.pixel_height = 1000.0;
        let decoded = read_geotiff(&write_geotiff(&raster).unwrap()).unwrap();
        assert_eq!(decoded.crs, CrsCode::Epsg32633);
        assert_eq!(decoded.transform.origin_x, 250000.0);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            read_geotiff(b"not a tiff"),
            Err(TransformError::Decode { .. })
        ));
    }
}
