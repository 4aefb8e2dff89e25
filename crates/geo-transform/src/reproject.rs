//! Raster and vector reprojection.

use projection::transform::DEFAULT_DENSIFY;
use projection::CrsTransform;
use radar_common::CrsCode;
use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::interpolation::{sample, ResamplingMethod};
use crate::types::{Feature, GeoTransform, Raster, VectorLayer};

/// Warp a raster into `target`, keeping its pixel count.
///
/// Each output pixel center is mapped back into the source grid and sampled
/// with `method`. Output cells that fall outside the source are NaN.
pub fn reproject_raster(raster: &Raster, target: CrsCode, method: ResamplingMethod) -> Result<Raster> {
    let forward = CrsTransform::new(raster.crs, target);
    if forward.is_identity() {
        return Ok(Raster {
            crs: target,
            ..raster.clone()
        });
    }

    let bounds = forward.transform_bbox(&raster.bounds(), DEFAULT_DENSIFY)?;
    let transform = GeoTransform {
        origin_x: bounds.min_x,
        origin_y: bounds.max_y,
        pixel_width: bounds.width() / raster.width as f64,
        pixel_height: bounds.height() / raster.height as f64,
    };
    let inverse = forward.inverse();

    let width = raster.width;
    let mut data = vec![f32::NAN; width * raster.height];
    data.par_chunks_mut(width)
        .enumerate()
        .for_each(|(row, out_row)| {
            for (col, out) in out_row.iter_mut().enumerate() {
                let (x, y) = transform.pixel_center(col, row);
                let Ok((sx, sy)) = inverse.transform(x, y) else {
                    continue;
                };
                let (px, py) = raster.transform.world_to_pixel(sx, sy);
                *out = sample(&raster.data, raster.width, raster.height, px, py, method);
            }
        });

    debug!(
        from = %raster.crs,
        to = %target,
        method = ?method,
        width,
        height = raster.height,
        "Reprojected raster"
    );

    Ok(Raster {
        width,
        height: raster.height,
        data,
        transform,
        crs: target,
    })
}

/// Transform every coordinate of a layer into `target`.
pub fn reproject_layer(layer: &VectorLayer, target: CrsCode) -> Result<VectorLayer> {
    let transform = CrsTransform::new(layer.crs, target);
    let features = layer
        .features
        .iter()
        .map(|f| {
            Ok(Feature {
                geometry: f.geometry.try_map_coords(&|x, y| transform.transform(x, y))?,
                properties: f.properties.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(VectorLayer {
        features,
        crs: target,
        fields: layer.fields.clone(),
    })
}
