//! Data formats produced by the upstream service and accepted as output targets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CommonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Single-band GeoTIFF raster
    GeoTiff,
    /// NetCDF classic raster
    NetCdf,
    /// ESRI Shapefile, shipped as a zip of its sidecar files
    Shapefile,
    /// GeoJSON FeatureCollection
    GeoJson,
}

impl DataFormat {
    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::GeoTiff => "tif",
            DataFormat::NetCdf => "nc",
            DataFormat::Shapefile => "zip",
            DataFormat::GeoJson => "geojson",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DataFormat::GeoTiff => "image/tiff",
            DataFormat::NetCdf => "application/x-netcdf",
            DataFormat::Shapefile => "application/zip",
            DataFormat::GeoJson => "application/geo+json",
        }
    }

    pub fn is_raster(&self) -> bool {
        matches!(self, DataFormat::GeoTiff | DataFormat::NetCdf)
    }

    pub fn is_vector(&self) -> bool {
        !self.is_raster()
    }

    /// Detect the format of a file from its extension.
    pub fn from_filename(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        ext.parse().ok()
    }
}

/// Accepts names and extensions, with or without a leading dot:
/// "tif", ".geotiff", "nc", "netcdf", "shp", "zip", "geojson", "json".
impl FromStr for DataFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_lowercase();
        match normalized.as_str() {
            "tif" | "tiff" | "geotiff" | "gtiff" => Ok(DataFormat::GeoTiff),
            "nc" | "netcdf" | "nc4" => Ok(DataFormat::NetCdf),
            "shp" | "zip" | "shapefile" => Ok(DataFormat::Shapefile),
            "geojson" | "json" => Ok(DataFormat::GeoJson),
            _ => Err(CommonError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataFormat::GeoTiff => "geotiff",
            DataFormat::NetCdf => "netcdf",
            DataFormat::Shapefile => "shapefile",
            DataFormat::GeoJson => "geojson",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(".tif".parse::<DataFormat>().unwrap(), DataFormat::GeoTiff);
        assert_eq!(".geotiff".parse::<DataFormat>().unwrap(), DataFormat::GeoTiff);
        assert_eq!("netcdf".parse::<DataFormat>().unwrap(), DataFormat::NetCdf);
        assert_eq!(".shp".parse::<DataFormat>().unwrap(), DataFormat::Shapefile);
        assert_eq!("JSON".parse::<DataFormat>().unwrap(), DataFormat::GeoJson);
        assert!(".png".parse::<DataFormat>().is_err());
    }

    #[test]
    fn test_from_filename() {
        assert_eq!(
            DataFormat::from_filename("SRI_01-07-2025-12-05.tif"),
            Some(DataFormat::GeoTiff)
        );
        assert_eq!(
            DataFormat::from_filename("LTG_01-07-2025-12-00.zip"),
            Some(DataFormat::Shapefile)
        );
        assert_eq!(DataFormat::from_filename("noext"), None);
    }
}
