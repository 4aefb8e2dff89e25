//! NetCDF rasters through libnetcdf.
//!
//! libnetcdf only works on file paths, so payload bytes pass through a
//! scratch file. On Linux that file lives in `/dev/shm` when it is writable.
//!
//! Written files follow CF conventions: dimensions `time(1)`, `y`, `x`,
//! coordinate variables for each, a scalar `crs` grid-mapping variable and
//! the product variable `code(time, y, x)` as float with `_FillValue` -9999.

use std::io::Write;
use std::path::Path;
use std::sync::Once;

use chrono::{DateTime, Utc};
use netcdf::AttributeValue;
use radar_common::CrsCode;
use tempfile::{Builder, NamedTempFile, TempDir};
use tracing::debug;

use crate::error::{Result, TransformError};
use crate::geotiff::{NODATA_THRESHOLD, NODATA_VALUE};
use crate::types::{GeoTransform, Raster};

const FORMAT: &str = "NetCDF";

const X_NAMES: [&str; 4] = ["x", "lon", "longitude", "projection_x_coordinate"];
const Y_NAMES: [&str; 4] = ["y", "lat", "latitude", "projection_y_coordinate"];

/// Turn off HDF5's automatic error stack printing.
///
/// Probing optional attributes makes HDF5 dump diagnostics to stderr even
/// though the missing attribute is handled. Safe to call repeatedly.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: null handlers are the documented way to disable auto-printing.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

fn scratch_builder() -> Builder<'static, 'static> {
    let mut builder = Builder::new();
    builder.prefix("radar_nc_").suffix(".nc");
    builder
}

fn scratch_file() -> std::io::Result<NamedTempFile> {
    let builder = scratch_builder();
    #[cfg(target_os = "linux")]
    if let Ok(file) = builder.tempfile_in("/dev/shm") {
        return Ok(file);
    }
    builder.tempfile()
}

fn scratch_dir() -> std::io::Result<TempDir> {
    let builder = scratch_builder();
    #[cfg(target_os = "linux")]
    if let Ok(dir) = builder.tempdir_in("/dev/shm") {
        return Ok(dir);
    }
    builder.tempdir()
}

/// Decode the first gridded variable of a NetCDF payload.
///
/// The variable's last two dimensions must be a y/x (or lat/lon) pair with
/// 1-D coordinate variables on a regular grid. Leading dimensions such as
/// `time` contribute only their first slice. South-up grids are flipped.
pub fn read_netcdf(bytes: &[u8]) -> Result<Raster> {
    silence_hdf5_errors();

    let mut scratch = scratch_file().map_err(|e| TransformError::decode(FORMAT, e))?;
    scratch
        .write_all(bytes)
        .and_then(|()| scratch.flush())
        .map_err(|e| TransformError::decode(FORMAT, e))?;

    let file = netcdf::open(scratch.path()).map_err(|e| TransformError::decode(FORMAT, e))?;

    let var = file
        .variables()
        .find(is_gridded)
        .ok_or_else(|| TransformError::decode(FORMAT, "no variable on a y/x grid"))?;

    let dims = var.dimensions();
    let y_dim = &dims[dims.len() - 2];
    let x_dim = &dims[dims.len() - 1];
    let (width, height) = (x_dim.len(), y_dim.len());
    if width == 0 || height == 0 {
        return Err(TransformError::decode(FORMAT, "empty grid"));
    }

    let xs = coordinates(&file, &x_dim.name(), width)?;
    let ys = coordinates(&file, &y_dim.name(), height)?;

    let values: Vec<f32> = var
        .get_values::<f32, _>(..)
        .map_err(|e| TransformError::decode(FORMAT, e))?;
    if values.len() < width * height {
        return Err(TransformError::decode(
            FORMAT,
            format!("{} holds {} values for a {}x{} grid", var.name(), values.len(), width, height),
        ));
    }

    let fill = f32_attr(&var, "_FillValue");
    let scale = f32_attr(&var, "scale_factor").unwrap_or(1.0);
    let offset = f32_attr(&var, "add_offset").unwrap_or(0.0);
    let mut data: Vec<f32> = values[..width * height]
        .iter()
        .map(|&v| {
            if v.is_nan() || Some(v) == fill || v <= NODATA_THRESHOLD {
                f32::NAN
            } else {
                v * scale + offset
            }
        })
        .collect();

    if xs.len() > 1 && xs[0] > xs[width - 1] {
        return Err(TransformError::decode(FORMAT, "x coordinates decrease"));
    }
    let dx = spacing(&xs).or_else(|| spacing(&ys));
    let dy = spacing(&ys).or(dx);
    let (Some(dx), Some(dy)) = (dx, dy) else {
        return Err(TransformError::decode(FORMAT, "cannot infer cell size of a 1x1 grid"));
    };

    let south_up = height > 1 && ys[0] < ys[height - 1];
    if south_up {
        data = data
            .chunks_exact(width)
            .rev()
            .flatten()
            .copied()
            .collect();
    }
    let top = if south_up { ys[height - 1] } else { ys[0] };

    let crs = detect_crs(&file, &var, &x_dim.name());
    debug!(variable = %var.name(), width, height, crs = %crs, south_up, "Decoded NetCDF grid");

    Ok(Raster {
        width,
        height,
        data,
        transform: GeoTransform {
            origin_x: xs[0] - dx / 2.0,
            origin_y: top + dy / 2.0,
            pixel_width: dx,
            pixel_height: dy,
        },
        crs,
    })
}

fn is_gridded(var: &netcdf::Variable) -> bool {
    let dims = var.dimensions();
    if dims.len() < 2 {
        return false;
    }
    let y = dims[dims.len() - 2].name().to_lowercase();
    let x = dims[dims.len() - 1].name().to_lowercase();
    Y_NAMES.contains(&y.as_str()) && X_NAMES.contains(&x.as_str())
}

fn coordinates(file: &netcdf::File, name: &str, len: usize) -> Result<Vec<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| TransformError::decode(FORMAT, format!("no coordinate variable {}", name)))?;
    let values: Vec<f64> = var
        .get_values::<f64, _>(..)
        .map_err(|e| TransformError::decode(FORMAT, e))?;
    if values.len() != len {
        return Err(TransformError::decode(
            FORMAT,
            format!("coordinate {} has {} values, dimension has {}", name, values.len(), len),
        ));
    }
    Ok(values)
}

/// Absolute cell size of a regular axis.
fn spacing(coords: &[f64]) -> Option<f64> {
    let n = coords.len();
    (n > 1).then(|| ((coords[n - 1] - coords[0]) / (n - 1) as f64).abs())
}

fn detect_crs(file: &netcdf::File, var: &netcdf::Variable, x_name: &str) -> CrsCode {
    let mapping = string_attr(var, "grid_mapping").and_then(|name| file.variable(&name));
    if let Some(mapping) = mapping {
        let from_epsg = f64_attr(&mapping, "epsg_code").and_then(|c| CrsCode::from_epsg(c as u32));
        let from_wkt = || {
            ["crs_wkt", "spatial_ref"]
                .iter()
                .find_map(|name| string_attr(&mapping, name).and_then(|wkt| CrsCode::from_wkt(&wkt)))
        };
        if let Some(crs) = from_epsg.or_else(from_wkt) {
            return crs;
        }
    }

    let global = file
        .attribute("crs")
        .and_then(|attr| attr.value().ok())
        .and_then(|value| match value {
            AttributeValue::Str(s) => s.parse::<CrsCode>().ok(),
            _ => None,
        });
    if let Some(crs) = global {
        return crs;
    }

    debug!(x = x_name, "No CRS metadata, assuming geographic coordinates");
    CrsCode::Epsg4326
}

fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn f32_attr(var: &netcdf::Variable, name: &str) -> Option<f32> {
    if !has_attr(var, name) {
        return None;
    }
    f32::try_from(var.attribute_value(name)?.ok()?).ok()
}

fn f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    f64::try_from(var.attribute_value(name)?.ok()?).ok()
}

fn string_attr(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Encode a raster as a NetCDF file holding one time step.
pub fn write_netcdf(
    raster: &Raster,
    variable: &str,
    long_name: &str,
    instant: DateTime<Utc>,
) -> Result<Vec<u8>> {
    silence_hdf5_errors();

    let dir = scratch_dir().map_err(|e| TransformError::encode(FORMAT, e))?;
    let path = dir.path().join(format!("{}.nc", variable));
    write_file(&path, raster, variable, long_name, instant)
        .map_err(|e| TransformError::encode(FORMAT, e))?;

    std::fs::read(&path).map_err(|e| TransformError::encode(FORMAT, e))
}

fn write_file(
    path: &Path,
    raster: &Raster,
    variable: &str,
    long_name: &str,
    instant: DateTime<Utc>,
) -> std::result::Result<(), netcdf::Error> {
    let (x_name, y_name, x_units, y_units) = if raster.crs.is_geographic() {
        ("longitude", "latitude", "degrees_east", "degrees_north")
    } else {
        ("projection_x_coordinate", "projection_y_coordinate", "m", "m")
    };

    let xs: Vec<f64> = (0..raster.width)
        .map(|c| raster.transform.pixel_center(c, 0).0)
        .collect();
    let ys: Vec<f64> = (0..raster.height)
        .map(|r| raster.transform.pixel_center(0, r).1)
        .collect();
    let values: Vec<f32> = raster
        .data
        .iter()
        .map(|v| if v.is_nan() { NODATA_VALUE } else { *v })
        .collect();

    let mut file = netcdf::create(path)?;
    file.add_dimension("time", 1)?;
    file.add_dimension("y", raster.height)?;
    file.add_dimension("x", raster.width)?;

    file.add_attribute("Conventions", "CF-1.8")?;
    file.add_attribute("title", long_name)?;
    file.add_attribute("crs", raster.crs.to_string())?;

    {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("standard_name", "time")?;
        time.put_attribute("units", "seconds since 1970-01-01 00:00:00")?;
        time.put_attribute("calendar", "standard")?;
        time.put_values(&[instant.timestamp() as f64], ..)?;
    }
    {
        let mut y = file.add_variable::<f64>("y", &["y"])?;
        y.put_attribute("standard_name", y_name)?;
        y.put_attribute("units", y_units)?;
        y.put_values(&ys, ..)?;
    }
    {
        let mut x = file.add_variable::<f64>("x", &["x"])?;
        x.put_attribute("standard_name", x_name)?;
        x.put_attribute("units", x_units)?;
        x.put_values(&xs, ..)?;
    }
    {
        let mut crs = file.add_variable::<i32>("crs", &[])?;
        crs.put_attribute("spatial_ref", raster.crs.wkt())?;
        crs.put_attribute("crs_wkt", raster.crs.wkt())?;
        crs.put_attribute("epsg_code", raster.crs.epsg() as i32)?;
        match raster.crs.utm_zone() {
            Some(zone) => {
                crs.put_attribute("grid_mapping_name", "transverse_mercator")?;
                crs.put_attribute("longitude_of_central_meridian", zone as f64 * 6.0 - 183.0)?;
                crs.put_attribute("scale_factor_at_central_meridian", 0.9996f64)?;
                crs.put_attribute("false_easting", 500000.0f64)?;
            }
            None if raster.crs.is_geographic() => {
                crs.put_attribute("grid_mapping_name", "latitude_longitude")?;
            }
            None => {
                crs.put_attribute("grid_mapping_name", "mercator")?;
            }
        }
    }
    {
        let mut data = file.add_variable::<f32>(variable, &["time", "y", "x"])?;
        data.set_fill_value(NODATA_VALUE)?;
        data.put_attribute("long_name", long_name)?;
        data.put_attribute("grid_mapping", "crs")?;
        data.put_values(&values, ..)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_common::time::parse_iso8601;

    fn small_raster() -> Raster {
        Raster {
            width: 3,
            height: 2,
            data: vec![1.0, 2.0, f32::NAN, 4.0, 5.0, 6.0],
            transform: GeoTransform {
                origin_x: 10.0,
                origin_y: 46.0,
                pixel_width: 1.0,
                pixel_height: 1.0,
            },
            crs: CrsCode::Epsg4326,
        }
    }

    #[test]
    fn test_written_file_reads_back() {
        let t = parse_iso8601("2025-07-01T12:05:00Z").unwrap();
        let bytes = write_netcdf(&small_raster(), "sri", "Surface Rainfall Intensity", t).unwrap();
        assert_eq!(&bytes[1..4], b"HDF");

        let raster = read_netcdf(&bytes).unwrap();
        assert_eq!((raster.width, raster.height), (3, 2));
        assert_eq!(raster.crs, CrsCode::Epsg4326);
        assert_eq!(raster.transform, small_raster().transform);
        assert_eq!(raster.value(0, 0), Some(1.0));
        assert!(raster.value(2, 0).unwrap().is_nan());
        assert_eq!(raster.value(2, 1), Some(6.0));
    }

    #[test]
    fn test_projected_crs_is_recovered() {
        let t = parse_iso8601("2025-07-01T12:05:00Z").unwrap();
        let mut raster = small_raster();
        raster.crs = CrsCode::Epsg32633;
        raster.transform = GeoTransform {
            origin_x: 300_000.0,
            origin_y: 5_000_000.0,
            pixel_width: 1000.0,
            pixel_height: 1000.0,
        };
        let bytes = write_netcdf(&raster, "sri", "SRI", t).unwrap();
        let decoded = read_netcdf(&bytes).unwrap();
        assert_eq!(decoded.crs, CrsCode::Epsg32633);
        assert_eq!(decoded.transform.origin_x, 300_000.0);
    }

    #[test]
    fn test_south_up_lat_lon_grid_is_flipped() {
        let dir = scratch_dir().unwrap();
        let path = dir.path().join("south_up.nc");
        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("lat", 2).unwrap();
            file.add_dimension("lon", 2).unwrap();
            file.add_variable::<f64>("lat", &["lat"])
                .unwrap()
                .put_values(&[40.5, 41.5], ..)
                .unwrap();
            file.add_variable::<f64>("lon", &["lon"])
                .unwrap()
                .put_values(&[12.5, 13.5], ..)
                .unwrap();
            let mut var = file.add_variable::<f32>("vmi", &["lat", "lon"]).unwrap();
            var.set_fill_value(-1.0f32).unwrap();
            var.put_values(&[1.0f32, 2.0, 3.0, -1.0], ..).unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();

        let raster = read_netcdf(&bytes).unwrap();
        assert_eq!(raster.crs, CrsCode::Epsg4326);
        assert_eq!(raster.transform.origin_x, 12.0);
        assert_eq!(raster.transform.origin_y, 42.0);
        // northern row first
        assert_eq!(raster.value(0, 0), Some(3.0));
        assert!(raster.value(1, 0).unwrap().is_nan());
        assert_eq!(raster.value(0, 1), Some(1.0));
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let result = read_netcdf(b"definitely not netcdf");
        assert!(matches!(result, Err(TransformError::Decode { .. })));
    }
}
