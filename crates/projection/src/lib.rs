//! Coordinate reference system transformations.
//!
//! Implements the handful of map projections the retriever needs from scratch:
//! geographic lon/lat, spherical Web Mercator and ellipsoidal transverse
//! Mercator (UTM). Datum shifts are not modelled; ETRS89 is treated as WGS84.

pub mod error;
pub mod mercator;
pub mod transform;
pub mod transverse_mercator;

pub use error::ProjectionError;
pub use mercator::WebMercator;
pub use transform::CrsTransform;
pub use transverse_mercator::TransverseMercator;
