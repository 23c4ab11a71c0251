//! Data preprocessing module
//!
//! Provides the fit/transform collaborators used by the feature pipeline:
//! - Numeric normalization (rank-Gauss, Standard, MinMax, Robust, MaxAbs)
//! - One-hot encoding with rare-category collapsing
//!
//! Both are reached through traits so the pipeline can run with any
//! implementation, including deterministic stubs in tests.

mod config;
mod encoder;
mod scaler;

pub use config::FeatureConfig;
pub use encoder::OneHotEncoder;
pub use scaler::{Scaler, ScalerType};

use crate::error::Result;
use crate::sparse::CsrMatrix;
use ndarray::{Array2, ArrayView2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Numeric,
    Categorical,
}

impl ColumnType {
    /// Text columns are categorical, everything else is numeric
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::String | DataType::Categorical(..) => ColumnType::Categorical,
            _ => ColumnType::Numeric,
        }
    }
}

/// Stateful normalizer over a dense `rows × columns` numeric block.
///
/// `transform` must keep the block's shape and row order.
pub trait NumericTransformer {
    /// Learn per-column parameters
    fn fit(&mut self, block: ArrayView2<f64>) -> Result<()>;

    /// Apply the learned parameters
    fn transform(&self, block: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, block: ArrayView2<f64>) -> Result<Array2<f64>> {
        self.fit(block)?;
        self.transform(block)
    }
}

/// Stateful encoder turning categorical columns into a sparse indicator block.
///
/// Output rows follow input rows; output column order must be stable for a
/// fitted encoder since feature names are assigned by position.
pub trait CategoricalTransformer {
    /// Learn the indicator layout from `columns` of `df`
    fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<()>;

    /// Encode the fitted columns of `df`
    fn transform(&self, df: &DataFrame) -> Result<CsrMatrix>;

    /// Number of indicator columns produced by `transform`
    fn output_width(&self) -> usize;

    /// Fit and transform in one step
    fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<CsrMatrix> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}
