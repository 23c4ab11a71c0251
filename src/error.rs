//! Error types for feature generation

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for feature generation
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Main error type for feature generation
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("IO error at {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Schema error in {table} table: {message}")]
    SchemaError { table: String, message: String },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Feature width {width} exceeds the configured limit of {limit}")]
    WidthLimitExceeded { width: usize, limit: usize },
}

impl FeatureError {
    /// Attach a path to an IO error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FeatureError::IoError {
            path: path.into(),
            source,
        }
    }

    /// Schema error for the named table
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        FeatureError::SchemaError {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Shape mismatch between two counts
    pub fn shape(expected: impl ToString, actual: impl ToString) -> Self {
        FeatureError::ShapeError {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for FeatureError {
    fn from(err: polars::error::PolarsError) -> Self {
        FeatureError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FeatureError {
    fn from(err: serde_json::Error) -> Self {
        FeatureError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FeatureError {
    fn from(err: ndarray::ShapeError) -> Self {
        FeatureError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FeatureError::schema("train", "missing identifier column 'id'");
        assert_eq!(
            err.to_string(),
            "Schema error in train table: missing identifier column 'id'"
        );
    }

    #[test]
    fn test_io_error_names_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = FeatureError::io("/data/train.csv", io_err);
        assert!(matches!(err, FeatureError::IoError { .. }));
        assert!(err.to_string().contains("/data/train.csv"));
    }

    #[test]
    fn test_shape_error() {
        let err = FeatureError::shape(5, 4);
        assert_eq!(err.to_string(), "Invalid shape: expected 5, got 4");
    }
}
