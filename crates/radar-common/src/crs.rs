//! Coordinate Reference System types and utilities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Well-known CRS codes the retriever can clip and reproject between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// ETRS89 Geographic, treated as WGS84 (no datum shift)
    Epsg4258,
    /// Web Mercator (meters)
    Epsg3857,
    /// WGS84 / UTM zone 32N
    Epsg32632,
    /// WGS84 / UTM zone 33N
    Epsg32633,
    /// WGS84 / UTM zone 34N
    Epsg32634,
}

const WGS84_GEOGCS: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
const ETRS89_GEOGCS: &str = r#"GEOGCS["GCS_ETRS_1989",DATUM["D_ETRS_1989",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

impl CrsCode {
    pub const ALL: [CrsCode; 6] = [
        CrsCode::Epsg4326,
        CrsCode::Epsg4258,
        CrsCode::Epsg3857,
        CrsCode::Epsg32632,
        CrsCode::Epsg32633,
        CrsCode::Epsg32634,
    ];

    /// Look up a CRS by its numeric EPSG code.
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 => Some(CrsCode::Epsg4326),
            4258 => Some(CrsCode::Epsg4258),
            3857 | 900913 | 3785 => Some(CrsCode::Epsg3857),
            32632 => Some(CrsCode::Epsg32632),
            32633 => Some(CrsCode::Epsg32633),
            32634 => Some(CrsCode::Epsg32634),
            _ => None,
        }
    }

    /// Numeric EPSG code.
    pub fn epsg(&self) -> u32 {
        match self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Epsg4258 => 4258,
            CrsCode::Epsg3857 => 3857,
            CrsCode::Epsg32632 => 32632,
            CrsCode::Epsg32633 => 32633,
            CrsCode::Epsg32634 => 32634,
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4258)
    }

    /// UTM zone number for the UTM codes.
    pub fn utm_zone(&self) -> Option<u8> {
        match self {
            CrsCode::Epsg32632 => Some(32),
            CrsCode::Epsg32633 => Some(33),
            CrsCode::Epsg32634 => Some(34),
            _ => None,
        }
    }

    /// ESRI-flavoured WKT, as written to shapefile `.prj` sidecars.
    pub fn wkt(&self) -> String {
        match self {
            CrsCode::Epsg4326 => WGS84_GEOGCS.to_string(),
            CrsCode::Epsg4258 => ETRS89_GEOGCS.to_string(),
            CrsCode::Epsg3857 => format!(
                r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",{},PROJECTION["Mercator_Auxiliary_Sphere"],PARAMETER["False_Easting",0.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",0.0],PARAMETER["Standard_Parallel_1",0.0],PARAMETER["Auxiliary_Sphere_Type",0.0],UNIT["Meter",1.0]]"#,
                WGS84_GEOGCS
            ),
            _ => {
                let zone = self.utm_zone().unwrap_or(32);
                let central_meridian = zone as f64 * 6.0 - 183.0;
                format!(
                    r#"PROJCS["WGS_1984_UTM_Zone_{}N",{},PROJECTION["Transverse_Mercator"],PARAMETER["False_Easting",500000.0],PARAMETER["False_Northing",0.0],PARAMETER["Central_Meridian",{:.1}],PARAMETER["Scale_Factor",0.9996],PARAMETER["Latitude_Of_Origin",0.0],UNIT["Meter",1.0]]"#,
                    zone, WGS84_GEOGCS, central_meridian
                )
            }
        }
    }

    /// Best-effort CRS detection from a WKT string (`.prj` contents).
    ///
    /// An outermost `AUTHORITY["EPSG",...]` wins; otherwise the projection and
    /// datum names are matched.
    pub fn from_wkt(wkt: &str) -> Option<Self> {
        if let Some(pos) = wkt.rfind(r#"AUTHORITY["EPSG","#) {
            let rest = &wkt[pos + r#"AUTHORITY["EPSG","#.len()..];
            let digits: String = rest
                .trim_start_matches('"')
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if let Some(code) = digits.parse().ok().and_then(Self::from_epsg) {
                if !wkt.trim_start().starts_with("PROJCS") || !code.is_geographic() {
                    return Some(code);
                }
            }
        }

        let normalized = wkt.to_uppercase().replace(' ', "_");
        if normalized.starts_with("PROJCS") {
            if normalized.contains("MERCATOR_AUXILIARY_SPHERE") || normalized.contains("PSEUDO-MERCATOR") {
                return Some(CrsCode::Epsg3857);
            }
            for zone in 32u32..=34 {
                if normalized.contains(&format!("UTM_ZONE_{}N", zone)) {
                    return Self::from_epsg(32600 + zone);
                }
            }
            return None;
        }

        if normalized.contains("ETRS_1989") || normalized.contains("ETRS89") {
            Some(CrsCode::Epsg4258)
        } else if normalized.contains("WGS_1984") || normalized.contains("WGS_84") {
            Some(CrsCode::Epsg4326)
        } else {
            None
        }
    }
}

/// Parses "EPSG:4326", "epsg:4326", "4326" and "CRS:84".
impl FromStr for CrsCode {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase();
        if normalized == "CRS:84" {
            return Ok(CrsCode::Epsg4326);
        }

        let digits = normalized.strip_prefix("EPSG:").unwrap_or(&normalized);
        digits
            .parse::<u32>()
            .ok()
            .and_then(Self::from_epsg)
            .ok_or_else(|| CrsParseError::UnsupportedCrs(s.to_string()))
    }
}

impl TryFrom<String> for CrsCode {
    type Error = CrsParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CrsCode> for String {
    fn from(code: CrsCode) -> Self {
        code.to_string()
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!("EPSG:4326".parse::<CrsCode>().unwrap(), CrsCode::Epsg4326);
        assert_eq!("epsg:3857".parse::<CrsCode>().unwrap(), CrsCode::Epsg3857);
        assert_eq!("CRS:84".parse::<CrsCode>().unwrap(), CrsCode::Epsg4326);
        assert_eq!("32633".parse::<CrsCode>().unwrap(), CrsCode::Epsg32633);
        assert!("EPSG:99999".parse::<CrsCode>().is_err());
    }

    #[test]
    fn test_wkt_detection_roundtrips_builtin_wkt() {
        for code in CrsCode::ALL {
            assert_eq!(CrsCode::from_wkt(&code.wkt()), Some(code), "{}", code);
        }
    }

    #[test]
    fn test_wkt_detection_prefers_outer_authority() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 33N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32633"]]"#;
        assert_eq!(CrsCode::from_wkt(wkt), Some(CrsCode::Epsg32633));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&CrsCode::Epsg32632).unwrap();
        assert_eq!(json, "\"EPSG:32632\"");
        let back: CrsCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CrsCode::Epsg32632);
    }
}
