//! Geospatial transformation of downloaded radar products.
//!
//! Payloads arrive as GeoTIFF or NetCDF rasters, or as zipped ESRI shapefiles
//! (GeoJSON is accepted too). The [`Transformer`] clips them to a bounding box, reprojects
//! them and re-encodes them, or passes the bytes through untouched when no
//! option is requested.

pub mod clip;
pub mod error;
pub mod geojson;
pub mod geotiff;
pub mod interpolation;
pub mod netcdf;
pub mod reproject;
pub mod shapefile;
pub mod transform;
pub mod types;

pub use error::{Result, TransformError};
pub use interpolation::{ResamplingMethod, ResamplingPolicy};
pub use transform::Transformer;
pub use types::{
    FieldDef, FieldKind, Feature, GeoTransform, Geometry, Raster, RawPayload, TransformOptions,
    TransformedPayload, VectorLayer,
};
