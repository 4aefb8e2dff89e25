//! The payload transformer: decode, clip, reproject, encode.

use chrono::{DateTime, Utc};
use projection::transform::DEFAULT_DENSIFY;
use projection::{CrsTransform, ProjectionError};
use radar_common::{BoundingBox, CrsCode, DataFormat, Product};
use tracing::{debug, info, instrument};

use crate::clip::{clip_layer, clip_raster};
use crate::error::{Result, TransformError};
use crate::geojson::{read_geojson, write_geojson};
use crate::geotiff::{read_geotiff, write_geotiff};
use crate::interpolation::ResamplingPolicy;
use crate::netcdf::{read_netcdf, write_netcdf};
use crate::reproject::{reproject_layer, reproject_raster};
use crate::shapefile::{read_zipped_shapefile, write_zipped_shapefile};
use crate::types::{Raster, RawPayload, TransformOptions, TransformedPayload, VectorLayer};

/// Applies [`TransformOptions`] to downloaded payloads.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    policy: ResamplingPolicy,
}

impl Transformer {
    pub fn new(policy: ResamplingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ResamplingPolicy {
        &self.policy
    }

    /// Transform a payload of `product` at `instant`.
    ///
    /// Without options the bytes pass through untouched and only the output
    /// filename is assigned. Conversions between raster and vector formats
    /// are rejected before any decoding happens.
    #[instrument(skip(self, raw, product, options), fields(product = %product.code, native = %raw.format))]
    pub fn transform(
        &self,
        raw: RawPayload,
        product: &Product,
        instant: DateTime<Utc>,
        options: &TransformOptions,
    ) -> Result<TransformedPayload> {
        let native = raw.format;
        let target_format = options.target_format.unwrap_or(native);
        let filename = product.output_filename(instant, target_format);

        if options.is_passthrough(native) {
            debug!(filename = %filename, "No transformation requested, passing payload through");
            return Ok(TransformedPayload {
                bytes: raw.bytes,
                format: native,
                filename,
                passthrough: true,
            });
        }

        if native.is_raster() != target_format.is_raster() {
            return Err(TransformError::unsupported(format!(
                "cannot convert {} to {}",
                native, target_format
            )));
        }

        let bytes = if native.is_raster() {
            let decoded = match native {
                DataFormat::NetCdf => read_netcdf(&raw.bytes)?,
                _ => read_geotiff(&raw.bytes)?,
            };
            let raster = self.transform_raster(decoded, product, options)?;
            match target_format {
                DataFormat::NetCdf => write_netcdf(
                    &raster,
                    &product.code.to_lowercase(),
                    &product.name,
                    instant,
                )?,
                _ => write_geotiff(&raster)?,
            }
        } else {
            let layer = match native {
                DataFormat::GeoJson => read_geojson(&raw.bytes)?,
                _ => read_zipped_shapefile(&raw.bytes)?,
            };
            let layer = self.transform_layer(layer, options)?;
            match target_format {
                DataFormat::GeoJson => write_geojson(&layer)?,
                _ => {
                    let stem = filename
                        .rsplit_once('.')
                        .map_or(filename.as_str(), |(stem, _)| stem);
                    write_zipped_shapefile(&layer, stem)?
                }
            }
        };

        info!(
            filename = %filename,
            format = %target_format,
            size = bytes.len(),
            "Transformed payload"
        );

        Ok(TransformedPayload {
            bytes: bytes.into(),
            format: target_format,
            filename,
            passthrough: false,
        })
    }

    fn transform_raster(
        &self,
        raster: Raster,
        product: &Product,
        options: &TransformOptions,
    ) -> Result<Raster> {
        let raster = match &options.bbox {
            Some(bbox) => {
                let local = bbox_in(bbox, options.bbox_crs, raster.crs, &raster.bounds())?;
                clip_raster(&raster, &local)?
            }
            None => raster,
        };
        match options.target_crs {
            Some(target) if target != raster.crs => {
                reproject_raster(&raster, target, self.policy.method_for(product))
            }
            _ => Ok(raster),
        }
    }

    fn transform_layer(&self, layer: VectorLayer, options: &TransformOptions) -> Result<VectorLayer> {
        let layer = match (&options.bbox, layer.extent()) {
            (Some(bbox), Some(extent)) => {
                let local = bbox_in(bbox, options.bbox_crs, layer.crs, &extent)?;
                clip_layer(&layer, &local)?
            }
            _ => layer,
        };
        match options.target_crs {
            Some(target) if target != layer.crs => reproject_layer(&layer, target),
            _ => Ok(layer),
        }
    }
}

/// Express `bbox` (in `from`) in the payload CRS `to`. A box that has no
/// image at all in the payload CRS cannot overlap the payload.
fn bbox_in(bbox: &BoundingBox, from: CrsCode, to: CrsCode, extent: &BoundingBox) -> Result<BoundingBox> {
    match CrsTransform::new(from, to).transform_bbox(bbox, DEFAULT_DENSIFY) {
        Ok(local) => Ok(local),
        Err(ProjectionError::EmptyTransform { .. }) => {
            Err(TransformError::out_of_bounds(bbox, extent))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;
    use radar_common::ProductRegistry;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 5, 0).unwrap()
    }

    #[test]
    fn test_passthrough_keeps_bytes() {
        let registry = ProductRegistry::builtin();
        let raw = RawPayload {
            bytes: Bytes::from_static(b"opaque payload"),
            format: DataFormat::GeoTiff,
            filename: "upstream.tif".to_string(),
        };
        let out = Transformer::default()
            .transform(raw, registry.lookup("SRI").unwrap(), instant(), &TransformOptions::default())
            .unwrap();
        assert!(out.passthrough);
        assert_eq!(out.bytes.as_ref(), b"opaque payload");
        assert_eq!(out.filename, "SRI_202507011205.tif");
    }

    #[test]
    fn test_raster_to_vector_rejected_before_decoding() {
        let registry = ProductRegistry::builtin();
        let raw = RawPayload {
            bytes: Bytes::from_static(b"not even a tiff"),
            format: DataFormat::GeoTiff,
            filename: "upstream.tif".to_string(),
        };
        let options = TransformOptions {
            target_format: Some(DataFormat::GeoJson),
            ..Default::default()
        };
        let result = Transformer::default().transform(raw, registry.lookup("VMI").unwrap(), instant(), &options);
        assert!(matches!(result, Err(TransformError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_netcdf_input_is_clipped_and_converted() {
        let registry = ProductRegistry::builtin();
        let raster = Raster {
            width: 4,
            height: 4,
            data: (0..16).map(|v| v as f32).collect(),
            transform: crate::types::GeoTransform {
                origin_x: 10.0,
                origin_y: 46.0,
                pixel_width: 1.0,
                pixel_height: 1.0,
            },
            crs: CrsCode::Epsg4326,
        };
        let raw = RawPayload {
            bytes: write_netcdf(&raster, "vmi", "Vertical Maximum Intensity", instant())
                .unwrap()
                .into(),
            format: DataFormat::NetCdf,
            filename: "upstream.nc".to_string(),
        };
        let options = TransformOptions {
            bbox: Some(BoundingBox::new(11.2, 43.2, 12.8, 44.8)),
            target_format: Some(DataFormat::GeoTiff),
            ..Default::default()
        };

        let out = Transformer::default()
            .transform(raw, registry.lookup("VMI").unwrap(), instant(), &options)
            .unwrap();
        assert_eq!(out.format, DataFormat::GeoTiff);
        assert_eq!(out.filename, "VMI_202507011205.tif");

        let clipped = read_geotiff(&out.bytes).unwrap();
        assert_eq!((clipped.width, clipped.height), (2, 2));
        assert_eq!(clipped.data, vec![5.0, 6.0, 9.0, 10.0]);
    }
}
