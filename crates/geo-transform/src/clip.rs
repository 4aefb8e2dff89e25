//! Spatial clipping of rasters and vector layers.
//!
//! The box must already be expressed in the payload CRS.

use radar_common::BoundingBox;
use tracing::debug;

use crate::error::{Result, TransformError};
use crate::types::{GeoTransform, Raster, VectorLayer};

/// Tolerance for boxes that sit exactly on a cell border.
const EDGE_EPSILON: f64 = 1e-9;

/// Inclusive cell range covered by `[lo, hi]` along one axis, clamped to `0..len`.
fn cell_range(lo: f64, hi: f64, len: usize) -> (usize, usize) {
    let last = len as i64 - 1;
    let start = ((lo + EDGE_EPSILON).floor() as i64).clamp(0, last);
    let end = (((hi - EDGE_EPSILON).ceil() as i64) - 1).clamp(0, last);
    // A box touching only an edge still keeps that boundary cell
    (start as usize, end.max(start) as usize)
}

/// Clip a raster to the cells overlapping `bbox`, boundary cells included.
pub fn clip_raster(raster: &Raster, bbox: &BoundingBox) -> Result<Raster> {
    let extent = raster.bounds();
    if !bbox.intersects(&extent) {
        return Err(TransformError::out_of_bounds(bbox, extent));
    }

    let t = &raster.transform;
    let (col_start, col_end) = cell_range(
        (bbox.min_x - t.origin_x) / t.pixel_width,
        (bbox.max_x - t.origin_x) / t.pixel_width,
        raster.width,
    );
    let (row_start, row_end) = cell_range(
        (t.origin_y - bbox.max_y) / t.pixel_height,
        (t.origin_y - bbox.min_y) / t.pixel_height,
        raster.height,
    );

    let width = col_end - col_start + 1;
    let height = row_end - row_start + 1;
    let mut data = Vec::with_capacity(width * height);
    for row in row_start..=row_end {
        let offset = row * raster.width;
        data.extend_from_slice(&raster.data[offset + col_start..=offset + col_end]);
    }

    debug!(
        cols = %format!("{}..={}", col_start, col_end),
        rows = %format!("{}..={}", row_start, row_end),
        "Clipped raster"
    );

    Ok(Raster {
        width,
        height,
        data,
        transform: GeoTransform {
            origin_x: t.origin_x + col_start as f64 * t.pixel_width,
            origin_y: t.origin_y - row_start as f64 * t.pixel_height,
            pixel_width: t.pixel_width,
            pixel_height: t.pixel_height,
        },
        crs: raster.crs,
    })
}

/// Keep the features whose envelope intersects `bbox`.
///
/// An empty layer has no extent and comes back empty. A non-empty layer whose
/// extent misses the box entirely is an error; a box that falls between
/// features yields an empty layer.
pub fn clip_layer(layer: &VectorLayer, bbox: &BoundingBox) -> Result<VectorLayer> {
    let Some(extent) = layer.extent() else {
        return Ok(layer.clone());
    };
    if !bbox.intersects(&extent) {
        return Err(TransformError::out_of_bounds(bbox, extent));
    }

    let features: Vec<_> = layer
        .features
        .iter()
        .filter(|f| f.geometry.envelope().is_some_and(|env| env.intersects(bbox)))
        .cloned()
        .collect();

    debug!(kept = features.len(), total = layer.features.len(), "Clipped layer");

    Ok(VectorLayer {
        features,
        crs: layer.crs,
        fields: layer.fields.clone(),
    })
}
