//! Kolosal Features - train/test feature generation
//!
//! Turns a raw train table and a raw test table into sparse feature
//! matrices for a downstream model:
//! - numeric columns are normalized (rank-Gauss by default)
//! - categorical columns are one-hot encoded, rare values collapsed
//! - encoders are fit on train and test rows together
//! - the assembled matrix is split back into train (with labels) and test
//!
//! # Modules
//!
//! - [`pipeline`] - Loading, classification, combination, assembly and persistence
//! - [`preprocessing`] - Normalizer and encoder collaborators
//! - [`sparse`] - Compressed sparse row matrices
//! - [`utils`] - Data loading and feature file writers
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Feature generation
pub mod pipeline;
pub mod preprocessing;
pub mod sparse;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{FeatureError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{FeatureError, Result};

    // Pipeline
    pub use crate::pipeline::{FeatureJob, FeaturePipeline, PipelineReport, Stage, StageError};

    // Preprocessing
    pub use crate::preprocessing::{
        CategoricalTransformer, ColumnType, FeatureConfig, NumericTransformer, OneHotEncoder, Scaler,
        ScalerType,
    };

    // Sparse matrices
    pub use crate::sparse::CsrMatrix;
}
