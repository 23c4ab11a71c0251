//! Numeric normalization implementations

use super::NumericTransformer;
use crate::error::{FeatureError, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerType {
    /// Rank-Gauss: map the empirical CDF onto a standard normal
    Gauss,
    /// Standard scaling (z-score normalization): (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// Max absolute scaling: x / max(|x|)
    MaxAbs,
    /// No scaling
    None,
}

impl FromStr for ScalerType {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gauss" | "rankgauss" => Ok(ScalerType::Gauss),
            "standard" => Ok(ScalerType::Standard),
            "minmax" => Ok(ScalerType::MinMax),
            "robust" => Ok(ScalerType::Robust),
            "maxabs" => Ok(ScalerType::MaxAbs),
            "none" => Ok(ScalerType::None),
            other => Err(FeatureError::ConfigError(format!("unknown scaler type '{}'", other))),
        }
    }
}

/// Parameters for one fitted column
#[derive(Debug, Clone, Serialize, Deserialize)]
enum ColumnParams {
    /// (x - center) / scale
    Affine { center: f64, scale: f64 },
    /// Sorted non-missing observations for the empirical CDF
    Ecdf { sorted: Vec<f64> },
}

/// Feature scaler over dense numeric blocks.
///
/// Missing values (NaN) are skipped while fitting and come out as `0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    params: Vec<ColumnParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            params: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    fn compute_params(&self, column: ArrayView1<f64>) -> ColumnParams {
        let mut values: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();

        match self.scaler_type {
            ScalerType::Gauss => {
                values.sort_by(f64::total_cmp);
                ColumnParams::Ecdf { sorted: values }
            }
            ScalerType::Standard => {
                let n = values.len();
                let mean = if n == 0 { 0.0 } else { values.iter().sum::<f64>() / n as f64 };
                let std = if n < 2 {
                    0.0
                } else {
                    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                    (ss / (n - 1) as f64).sqrt()
                };
                ColumnParams::Affine {
                    center: mean,
                    scale: nonzero_or_one(std),
                }
            }
            ScalerType::MinMax => {
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                if values.is_empty() {
                    return ColumnParams::Affine { center: 0.0, scale: 1.0 };
                }
                ColumnParams::Affine {
                    center: min,
                    scale: nonzero_or_one(max - min),
                }
            }
            ScalerType::Robust => {
                values.sort_by(f64::total_cmp);
                let median = quantile(&values, 0.5);
                let iqr = quantile(&values, 0.75) - quantile(&values, 0.25);
                ColumnParams::Affine {
                    center: median,
                    scale: nonzero_or_one(iqr),
                }
            }
            ScalerType::MaxAbs => {
                let max_abs = values.iter().map(|v| v.abs()).fold(0.0f64, f64::max);
                ColumnParams::Affine {
                    center: 0.0,
                    scale: nonzero_or_one(max_abs),
                }
            }
            ScalerType::None => ColumnParams::Affine {
                center: 0.0,
                scale: 1.0,
            },
        }
    }

    fn scale_value(params: &ColumnParams, v: f64) -> f64 {
        if v.is_nan() {
            return 0.0;
        }
        match params {
            ColumnParams::Affine { center, scale } => (v - center) / scale,
            ColumnParams::Ecdf { sorted } => {
                if sorted.is_empty() {
                    return 0.0;
                }
                let rank = sorted.partition_point(|&x| x <= v);
                let cdf = rank as f64 / sorted.len() as f64;
                norm_ppf(cdf * 0.998 + 0.001)
            }
        }
    }
}

impl NumericTransformer for Scaler {
    fn fit(&mut self, block: ArrayView2<f64>) -> Result<()> {
        self.params = block
            .columns()
            .into_iter()
            .map(|column| self.compute_params(column))
            .collect();
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, block: ArrayView2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(FeatureError::ModelNotFitted);
        }
        if block.ncols() != self.params.len() {
            return Err(FeatureError::shape(
                format!("{} numeric columns", self.params.len()),
                format!("{} numeric columns", block.ncols()),
            ));
        }

        let mut result = block.to_owned();
        for (mut column, params) in result.columns_mut().into_iter().zip(&self.params) {
            column.mapv_inplace(|v| Self::scale_value(params, v));
        }
        Ok(result)
    }
}

fn nonzero_or_one(scale: f64) -> f64 {
    if scale == 0.0 || !scale.is_finite() {
        1.0
    } else {
        scale
    }
}

/// Linear-interpolated quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Inverse of the standard normal CDF for `p` in (0, 1).
///
/// Acklam's rational approximation, relative error below 1.2e-9.
fn norm_ppf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}
