//! Interpolation methods for raster resampling, and the per-product choice of method.

use radar_common::{Product, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{Result, TransformError};

/// Resampling method used when reprojecting rasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplingMethod {
    Nearest,
    Bilinear,
    Cubic,
}

impl FromStr for ResamplingMethod {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "nearest" | "near" => Ok(ResamplingMethod::Nearest),
            "bilinear" => Ok(ResamplingMethod::Bilinear),
            "cubic" | "bicubic" => Ok(ResamplingMethod::Cubic),
            other => Err(TransformError::Config(format!("unknown resampling method: {}", other))),
        }
    }
}

/// Explicit mapping from products to resampling methods.
///
/// Categorical products (classes, flags) default to nearest neighbour so no
/// invented class values appear; continuous fields default to bilinear.
/// Per-product overrides win over both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResamplingPolicy {
    #[serde(default = "default_continuous")]
    pub continuous: ResamplingMethod,
    #[serde(default = "default_categorical")]
    pub categorical: ResamplingMethod,
    /// Product code -> method
    #[serde(default)]
    pub overrides: HashMap<String, ResamplingMethod>,
}

fn default_continuous() -> ResamplingMethod {
    ResamplingMethod::Bilinear
}

fn default_categorical() -> ResamplingMethod {
    ResamplingMethod::Nearest
}

impl Default for ResamplingPolicy {
    fn default() -> Self {
        Self {
            continuous: default_continuous(),
            categorical: default_categorical(),
            overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    resampling: Option<ResamplingPolicy>,
}

impl ResamplingPolicy {
    pub fn with_override(mut self, code: &str, method: ResamplingMethod) -> Self {
        self.overrides.insert(code.to_uppercase(), method);
        self
    }

    pub fn method_for(&self, product: &Product) -> ResamplingMethod {
        if let Some(method) = self.overrides.get(&product.code.to_uppercase()) {
            return *method;
        }
        match product.kind {
            ValueKind::Continuous => self.continuous,
            ValueKind::Categorical => self.categorical,
        }
    }

    /// Read the `resampling:` section of a products YAML file; defaults when absent.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: PolicyFile =
            serde_yaml::from_str(yaml).map_err(|e| TransformError::Config(e.to_string()))?;
        let mut policy = file.resampling.unwrap_or_default();
        policy.overrides = policy
            .overrides
            .into_iter()
            .map(|(code, method)| (code.to_uppercase(), method))
            .collect();
        Ok(policy)
    }
}

/// Sample a grid at fractional pixel coordinates (integer values are pixel
/// centers). Returns NaN outside the grid.
pub fn sample(
    data: &[f32],
    width: usize,
    height: usize,
    x: f64,
    y: f64,
    method: ResamplingMethod,
) -> f32 {
    if width == 0 || height == 0 || !x.is_finite() || !y.is_finite() {
        return f32::NAN;
    }
    // Half a pixel of slack so edge pixels keep their full footprint
    if x < -0.5 || y < -0.5 || x > width as f64 - 0.5 || y > height as f64 - 0.5 {
        return f32::NAN;
    }
    match method {
        ResamplingMethod::Nearest => nearest_interpolate(data, width, height, x, y),
        ResamplingMethod::Bilinear => bilinear_interpolate(data, width, height, x, y),
        ResamplingMethod::Cubic => cubic_interpolate(data, width, height, x, y),
    }
}

/// Nearest neighbor interpolation.
pub fn nearest_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    let col = x.round().clamp(0.0, (width - 1) as f64) as usize;
    let row = y.round().clamp(0.0, (height - 1) as f64) as usize;
    data[row * width + col]
}

/// Bilinear interpolation between the four nearest grid points.
///
/// Returns NaN if any contributing corner is NaN.
pub fn bilinear_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f32::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Bicubic interpolation over the 16 surrounding points.
///
/// Falls back to bilinear near nodata.
pub fn cubic_interpolate(data: &[f32], width: usize, height: usize, x: f64, y: f64) -> f32 {
    let xi = x.floor() as i64;
    let yi = y.floor() as i64;

    let xf = (x - xi as f64) as f32;
    let yf = (y - yi as f64) as f32;

    let mut values = [[0.0f32; 4]; 4];
    for j in 0..4 {
        for i in 0..4 {
            let px = (xi + i as i64 - 1).clamp(0, width as i64 - 1) as usize;
            let py = (yi + j as i64 - 1).clamp(0, height as i64 - 1) as usize;
            let v = data[py * width + px];
            if v.is_nan() {
                return bilinear_interpolate(data, width, height, x, y);
            }
            values[j][i] = v;
        }
    }

    let mut row_values = [0.0f32; 4];
    for (j, row) in values.iter().enumerate() {
        row_values[j] = cubic_1d(row[0], row[1], row[2], row[3], xf);
    }
    cubic_1d(row_values[0], row_values[1], row_values[2], row_values[3], yf)
}

/// 1D cubic interpolation using Catmull-Rom spline.
fn cubic_1d(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    let d = p1;

    a * t3 + b * t2 + c * t + d
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_common::ProductRegistry;

    #[test]
    fn test_nearest_interpolate() {
        let data: Vec<f32> = vec![
            1.0, 2.0, 3.0,
            4.0, 5.0, 6.0,
            7.0, 8.0, 9.0,
        ];

        assert_eq!(nearest_interpolate(&data, 3, 3, 0.0, 0.0), 1.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 0.4, 0.4), 1.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, 0.6, 0.6), 5.0);
        assert_eq!(nearest_interpolate(&data, 3, 3, -0.4, 2.4), 7.0);
    }

    #[test]
    fn test_bilinear_interpolate() {
        let data: Vec<f32> = vec![
            1.0, 2.0,
            3.0, 4.0,
        ];

        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 0.0), 1.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 1.0), 4.0);
        let center = bilinear_interpolate(&data, 2, 2, 0.5, 0.5);
        assert!((center - 2.5).abs() < 0.001);
    }

    #[test]
    fn test_bilinear_with_nan() {
        let data: Vec<f32> = vec![
            1.0, f32::NAN,
            3.0, 4.0,
        ];
        assert!(bilinear_interpolate(&data, 2, 2, 0.5, 0.5).is_nan());
    }

    #[test]
    fn test_sample_outside_is_nan() {
        let data = vec![1.0f32; 4];
        assert!(sample(&data, 2, 2, -0.6, 0.0, ResamplingMethod::Nearest).is_nan());
        assert!(sample(&data, 2, 2, 0.0, 1.6, ResamplingMethod::Bilinear).is_nan());
        assert_eq!(sample(&data, 2, 2, 1.4, 1.4, ResamplingMethod::Cubic), 1.0);
    }

    #[test]
    fn test_policy_by_kind_and_override() {
        let registry = ProductRegistry::builtin();
        let policy = ResamplingPolicy::default().with_override("temp", ResamplingMethod::Cubic);

        assert_eq!(policy.method_for(registry.lookup("SRI").unwrap()), ResamplingMethod::Bilinear);
        assert_eq!(policy.method_for(registry.lookup("HRD").unwrap()), ResamplingMethod::Nearest);
        assert_eq!(policy.method_for(registry.lookup("TEMP").unwrap()), ResamplingMethod::Cubic);
    }

    #[test]
    fn test_policy_from_yaml() {
        let yaml = r#"
products: []
resampling:
  continuous: cubic
  overrides:
    vmi: nearest
"#;
        let policy = ResamplingPolicy::from_yaml_str(yaml).unwrap();
        assert_eq!(policy.continuous, ResamplingMethod::Cubic);
        assert_eq!(policy.categorical, ResamplingMethod::Nearest);
        assert_eq!(policy.overrides.get("VMI"), Some(&ResamplingMethod::Nearest));

        let empty = ResamplingPolicy::from_yaml_str("products: []").unwrap();
        assert_eq!(empty, ResamplingPolicy::default());
    }
}
