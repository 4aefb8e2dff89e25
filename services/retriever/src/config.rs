//! Product configuration loading.
//!
//! Without a file the built-in product table and default resampling are
//! used. A YAML file may override or add products and set resampling:
//!
//! ```yaml
//! products:
//!   - code: SRI
//!     name: Surface Rainfall Intensity
//!     cadence_minutes: 5
//!     publish_delay_minutes: 2
//! resampling:
//!   continuous: bilinear
//!   categorical: nearest
//!   overrides:
//!     VMI: cubic
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use geo_transform::ResamplingPolicy;
use radar_common::ProductRegistry;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct RetrieverConfig {
    pub registry: ProductRegistry,
    pub resampling: ResamplingPolicy,
}

impl RetrieverConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read products config {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid products config {}", path.display()))?;

        info!(
            path = %path.display(),
            products = config.registry.list().len(),
            "Loaded products config"
        );
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(Self {
            registry: ProductRegistry::from_yaml_str(yaml)?,
            resampling: ResamplingPolicy::from_yaml_str(yaml)?,
        })
    }
}
