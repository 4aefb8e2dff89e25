//! Product registry: static metadata for every retrievable radar product.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::time::{epoch_millis, filename_stamp};
use crate::{CommonError, CommonResult, DataFormat};

/// Whether values form a continuous field or discrete classes.
///
/// Drives the default resampling method when a product is reprojected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Continuous,
    Categorical,
}

/// A product published by the upstream radar service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Upstream product type code, e.g. "SRI"
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_native_format")]
    pub native_format: DataFormat,
    /// Resource path template; `{code}`, `{epoch_ms}`, `{date}` and `{time}` are substituted
    #[serde(default = "default_path_template")]
    pub path_template: String,
    /// Publication cadence; `None` for snapshot products
    #[serde(default)]
    pub cadence_minutes: Option<u32>,
    /// How far back the upstream keeps data
    #[serde(default = "default_coverage_hours")]
    pub coverage_hours: u32,
    /// Typical lag between an instant and its publication
    #[serde(default)]
    pub publish_delay_minutes: u32,
    #[serde(default = "default_kind")]
    pub kind: ValueKind,
}

fn default_native_format() -> DataFormat {
    DataFormat::GeoTiff
}

fn default_path_template() -> String {
    "type={code}&time={epoch_ms}".to_string()
}

fn default_coverage_hours() -> u32 {
    7 * 24
}

fn default_kind() -> ValueKind {
    ValueKind::Continuous
}

impl Product {
    fn builtin(
        code: &str,
        name: &str,
        description: &str,
        native_format: DataFormat,
        cadence_minutes: Option<u32>,
        kind: ValueKind,
    ) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            native_format,
            path_template: default_path_template(),
            cadence_minutes,
            coverage_hours: default_coverage_hours(),
            publish_delay_minutes: 0,
            kind,
        }
    }

    pub fn cadence(&self) -> Option<Duration> {
        self.cadence_minutes
            .filter(|m| *m > 0)
            .map(|m| Duration::minutes(m as i64))
    }

    pub fn coverage(&self) -> Duration {
        Duration::hours(self.coverage_hours as i64)
    }

    pub fn publish_delay(&self) -> Duration {
        Duration::minutes(self.publish_delay_minutes as i64)
    }

    /// Fill the path template for an instant.
    pub fn render_path(&self, instant: DateTime<Utc>) -> String {
        self.path_template
            .replace("{code}", &self.code)
            .replace("{epoch_ms}", &epoch_millis(instant).to_string())
            .replace("{date}", &instant.format("%Y%m%d").to_string())
            .replace("{time}", &instant.format("%H%M").to_string())
    }

    /// Output filename for this product at an instant: `SRI_202507011205.tif`.
    pub fn output_filename(&self, instant: DateTime<Utc>, format: DataFormat) -> String {
        format!("{}_{}.{}", self.code, filename_stamp(instant), format.extension())
    }
}

/// Lookup over the products known to this process.
#[derive(Debug, Clone)]
pub struct ProductRegistry {
    products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
struct ProductsFile {
    #[serde(default)]
    products: Vec<Product>,
}

impl Default for ProductRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProductRegistry {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// The products published by the Civil Protection radar platform.
    pub fn builtin() -> Self {
        use DataFormat::{GeoTiff, Shapefile};
        use ValueKind::{Categorical, Continuous};

        let mut products = vec![
            Product::builtin("VMI", "Vertical Maximum Intensity", "Maximum reflectivity [dBZ] on the vertical of each point", GeoTiff, Some(5), Continuous),
            Product::builtin("SRI", "Surface Rainfall Intensity", "Estimated surface rainfall intensity [mm/h] from radar and rain gauges", GeoTiff, Some(5), Continuous),
            Product::builtin("SRT1", "Cumulata di precipitazione in 1 ora", "Rainfall accumulated over the last hour [mm]", GeoTiff, Some(5), Continuous),
            Product::builtin("SRT3", "Cumulata di precipitazione in 3 ore", "Rain gauge accumulation over 3 hours [mm]", GeoTiff, Some(60), Continuous),
            Product::builtin("SRT6", "Cumulata di precipitazione in 6 ore", "Rain gauge accumulation over 6 hours [mm]", GeoTiff, Some(60), Continuous),
            Product::builtin("SRT12", "Cumulata di precipitazione in 12 ore", "Rain gauge accumulation over 12 hours [mm]", GeoTiff, Some(60), Continuous),
            Product::builtin("SRT24", "Cumulata di precipitazione in 24 ore", "Rain gauge accumulation over 24 hours [mm]", GeoTiff, Some(60), Continuous),
            Product::builtin("IR108", "Copertura nuvolosa", "Cloud cover from the MSG IR 10.8 channel", GeoTiff, Some(5), Continuous),
            Product::builtin("TEMP", "Mappa delle Temperature", "Interpolated air temperature from ground stations [°C]", GeoTiff, Some(60), Continuous),
            Product::builtin("LTG", "Mappa dei fulmini", "Lightning strike frequency from the LAMPINET network", Shapefile, Some(10), Categorical),
            Product::builtin("AMV", "Direzione e intensità del vento in Quota", "Atmospheric Motion Vectors sampled on a 50x50 km grid", Shapefile, Some(20), Continuous),
            Product::builtin("HRD", "Heavy Rain Detection", "Severity index of intense or convective precipitation areas", GeoTiff, Some(5), Categorical),
            Product::builtin("RADAR_STATUS", "Radar", "Operational status of the national radar network", Shapefile, None, Categorical),
        ];

        for level in 1..=8 {
            products.push(Product::builtin(
                &format!("CAPPI{}", level),
                &format!("CAPPI {} m", level * 1000),
                &format!("Constant altitude reflectivity at {} m [dBZ]", level * 1000),
                GeoTiff,
                Some(10),
                Continuous,
            ));
        }

        Self { products }
    }

    /// Find a product by code (case-insensitive).
    pub fn lookup(&self, code: &str) -> CommonResult<&Product> {
        self.products
            .iter()
            .find(|p| p.code.eq_ignore_ascii_case(code.trim()))
            .ok_or_else(|| CommonError::UnknownProduct(code.to_string()))
    }

    pub fn list(&self) -> &[Product] {
        &self.products
    }

    /// Replace products with the same code, append the others.
    pub fn with_overrides(mut self, overrides: Vec<Product>) -> Self {
        for product in overrides {
            match self
                .products
                .iter_mut()
                .find(|p| p.code.eq_ignore_ascii_case(&product.code))
            {
                Some(existing) => *existing = product,
                None => self.products.push(product),
            }
        }
        self
    }

    /// Built-in products overridden by the `products:` list of a YAML document.
    pub fn from_yaml_str(yaml: &str) -> CommonResult<Self> {
        let file: ProductsFile = serde_yaml::from_str(yaml)?;
        Ok(Self::builtin().with_overrides(file.products))
    }

    pub fn load(path: impl AsRef<Path>) -> CommonResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CommonError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_iso8601;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ProductRegistry::builtin();
        assert_eq!(registry.lookup("sri").unwrap().code, "SRI");
        assert_eq!(registry.lookup("CAPPI3").unwrap().name, "CAPPI 3000 m");
    }

    #[test]
    fn test_unknown_product() {
        let registry = ProductRegistry::builtin();
        assert!(matches!(
            registry.lookup("XYZ"),
            Err(CommonError::UnknownProduct(code)) if code == "XYZ"
        ));
    }

    #[test]
    fn test_builtin_cadences() {
        let registry = ProductRegistry::builtin();
        assert_eq!(registry.list().len(), 21);
        assert_eq!(registry.lookup("SRT24").unwrap().cadence(), Some(Duration::hours(1)));
        assert_eq!(registry.lookup("AMV").unwrap().cadence(), Some(Duration::minutes(20)));
        assert_eq!(registry.lookup("RADAR_STATUS").unwrap().cadence(), None);
    }

    #[test]
    fn test_render_path_and_filename() {
        let registry = ProductRegistry::builtin();
        let sri = registry.lookup("SRI").unwrap();
        let t = parse_iso8601("2025-07-01T12:05:00Z").unwrap();
        assert_eq!(sri.render_path(t), "type=SRI&time=1751371500000");
        assert_eq!(sri.output_filename(t, DataFormat::NetCdf), "SRI_202507011205.nc");
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
products:
  - code: SRI
    name: Surface Rainfall Intensity
    cadence_minutes: 10
    publish_delay_minutes: 15
  - code: TEST
    name: Test product
    native_format: shapefile
    kind: categorical
"#;
        let registry = ProductRegistry::from_yaml_str(yaml).unwrap();
        let sri = registry.lookup("SRI").unwrap();
        assert_eq!(sri.cadence(), Some(Duration::minutes(10)));
        assert_eq!(sri.publish_delay(), Duration::minutes(15));
        assert_eq!(sri.coverage(), Duration::days(7));

        let test = registry.lookup("test").unwrap();
        assert_eq!(test.native_format, DataFormat::Shapefile);
        assert_eq!(test.kind, ValueKind::Categorical);
        assert_eq!(test.cadence(), None);
        assert_eq!(registry.list().len(), 22);
    }
}
