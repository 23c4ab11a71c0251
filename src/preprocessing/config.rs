//! Feature generation configuration

use super::ScalerType;
use crate::error::{FeatureError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a feature generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Column holding the unique row key of each table
    pub id_col: String,

    /// Label column, present in the train table only
    pub target_col: String,

    /// Minimum number of observations across train+test for a category
    /// to get its own indicator column
    pub min_obs: usize,

    /// Normalizer applied to numeric columns
    pub scaler_type: ScalerType,

    /// Upper bound on the assembled feature width
    pub max_features: Option<usize>,

    /// Input field delimiter; inferred from the file extension when unset
    pub delimiter: Option<u8>,

    /// Rows read to infer column types; the whole file when unset
    pub infer_schema_length: Option<usize>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            id_col: "id".to_string(),
            target_col: "target".to_string(),
            min_obs: 10,
            scaler_type: ScalerType::Gauss,
            max_features: None,
            delimiter: None,
            infer_schema_length: None,
        }
    }
}

impl FeatureConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FeatureError::ConfigError(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: FeatureConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Builder method to set the identifier column
    pub fn with_id_col(mut self, id_col: impl Into<String>) -> Self {
        self.id_col = id_col.into();
        self
    }

    /// Builder method to set the label column
    pub fn with_target_col(mut self, target_col: impl Into<String>) -> Self {
        self.target_col = target_col.into();
        self
    }

    /// Builder method to set the rare-category threshold
    pub fn with_min_obs(mut self, min_obs: usize) -> Self {
        self.min_obs = min_obs;
        self
    }

    /// Builder method to set the numeric normalizer
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    /// Builder method to cap the assembled feature width
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    /// Builder method to force an input delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Builder method to infer column types from the first `n` rows only
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = Some(n);
        self
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.id_col.is_empty() || self.target_col.is_empty() {
            return Err(FeatureError::ConfigError(
                "identifier and label column names must not be empty".to_string(),
            ));
        }
        if self.id_col == self.target_col {
            return Err(FeatureError::ConfigError(format!(
                "identifier and label column are both '{}'",
                self.id_col
            )));
        }
        if self.min_obs == 0 {
            return Err(FeatureError::ConfigError("min_obs must be at least 1".to_string()));
        }
        if self.infer_schema_length == Some(0) {
            return Err(FeatureError::ConfigError(
                "infer_schema_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FeatureConfig::default();
        assert_eq!(config.id_col, "id");
        assert_eq!(config.target_col, "target");
        assert_eq!(config.min_obs, 10);
        assert_eq!(config.scaler_type, ScalerType::Gauss);
        assert_eq!(config.infer_schema_length, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = FeatureConfig::new()
            .with_id_col("row_id")
            .with_target_col("label")
            .with_min_obs(2)
            .with_scaler(ScalerType::MinMax)
            .with_max_features(100);

        assert_eq!(config.id_col, "row_id");
        assert_eq!(config.target_col, "label");
        assert_eq!(config.min_obs, 2);
        assert_eq!(config.scaler_type, ScalerType::MinMax);
        assert_eq!(config.max_features, Some(100));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(FeatureConfig::new().with_min_obs(0).validate().is_err());
        assert!(FeatureConfig::new().with_target_col("id").validate().is_err());
        assert!(FeatureConfig::new().with_id_col("").validate().is_err());
        assert!(FeatureConfig::new().with_infer_schema_length(0).validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: FeatureConfig =
            serde_json::from_str(r#"{"min_obs": 3, "scaler_type": "standard"}"#).unwrap();
        assert_eq!(config.min_obs, 3);
        assert_eq!(config.scaler_type, ScalerType::Standard);
        assert_eq!(config.id_col, "id");
    }

    #[test]
    fn test_unreadable_config_file() {
        let result = FeatureConfig::from_json_file("/nonexistent/features.json");
        assert!(matches!(result, Err(FeatureError::ConfigError(_))));
    }
}
