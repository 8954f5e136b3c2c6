//! Run configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::{FlowConfig, SelectorConfig, SpatialConfig};
use crate::error::{Error, Result};

/// Everything a pipeline run needs besides its input tables.
///
/// Missing fields in a JSON config fall back to [`Default`], so a file only
/// has to name what it changes:
///
/// ```json
/// { "time_scale": 900.0, "selector": { "base_eps": 4200.0 } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Meters per hour on the time axis of the feature space.
    pub time_scale: f64,
    /// Also aggregate and score the monetary value of trips.
    pub include_value: bool,
    /// Key of the daily table in the cache.
    pub cache_key: String,
    pub selector: SelectorConfig,
    pub spatial: SpatialConfig,
    pub flow: FlowConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            time_scale: 1200.0,
            include_value: false,
            cache_key: "daily_zone_hour".to_string(),
            selector: SelectorConfig::default(),
            spatial: SpatialConfig::default(),
            flow: FlowConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.time_scale.is_finite() && self.time_scale >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "time_scale",
                message: "must be finite and non-negative",
            });
        }
        if self.cache_key.is_empty()
            || self
                .cache_key
                .chars()
                .any(|c| matches!(c, '/' | '\\') || c.is_control())
        {
            return Err(Error::InvalidParameter {
                name: "cache_key",
                message: "must be a non-empty file-name-safe string",
            });
        }
        if !(self.spatial.eps.is_finite() && self.spatial.eps > 0.0) {
            return Err(Error::InvalidParameter {
                name: "spatial.eps",
                message: "must be positive and finite",
            });
        }
        if self.spatial.min_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "spatial.min_samples",
                message: "must be at least 1",
            });
        }
        self.flow.validate()?;
        self.selector.validate()?;
        self.selector.schedule().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_scale, 1200.0);
        assert_eq!(config.selector.min_samples, 30);
        assert_eq!(config.spatial.eps, 1600.0);
        assert_eq!(config.flow.eps, 1200.0);
        assert_eq!(config.flow.min_samples, 5);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"time_scale": 900.0, "selector": {{"base_eps": 4200.0}}}}"#).unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.time_scale, 900.0);
        assert_eq!(config.selector.base_eps, 4200.0);
        assert_eq!(config.selector.backstop_eps, vec![2200.0, 2000.0, 1800.0, 1600.0]);
        assert!(!config.include_value);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.cache_key = "../escape".into();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.selector.eps_factors.clear();
        config.selector.backstop_eps.clear();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.time_scale = -1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.flow.min_samples = 0;
        assert!(config.validate().is_err());
    }
}
