//! Feature assembly and the train/test re-split

use crate::error::{FeatureError, Result};
use crate::sparse::CsrMatrix;
use ndarray::ArrayView2;
use tracing::info;

/// Prefix of the positional names given to encoded columns
pub const ENCODED_PREFIX: &str = "ohe";

/// The assembled sparse matrix and one name per column
#[derive(Debug, Clone)]
pub struct AssembledFeatures {
    pub matrix: CsrMatrix,
    pub names: Vec<String>,
}

impl AssembledFeatures {
    pub fn n_rows(&self) -> usize {
        self.matrix.n_rows()
    }

    pub fn n_cols(&self) -> usize {
        self.matrix.n_cols()
    }
}

/// Put the numeric block left of the encoded block.
///
/// Names are the numeric column names followed by `ohe0, ohe1, ...` in
/// encoder output order.
pub fn assemble(
    numeric: ArrayView2<f64>,
    numeric_names: &[String],
    encoded: &CsrMatrix,
    max_features: Option<usize>,
) -> Result<AssembledFeatures> {
    if numeric.ncols() != numeric_names.len() {
        return Err(FeatureError::shape(
            format!("{} numeric columns", numeric_names.len()),
            format!("{} numeric columns", numeric.ncols()),
        ));
    }
    if numeric.nrows() != encoded.n_rows() {
        return Err(FeatureError::shape(
            format!("{} encoded rows", numeric.nrows()),
            format!("{} encoded rows", encoded.n_rows()),
        ));
    }

    let width = numeric.ncols() + encoded.n_cols();
    if let Some(limit) = max_features {
        if width > limit {
            return Err(FeatureError::WidthLimitExceeded { width, limit });
        }
    }

    let matrix = CsrMatrix::from_dense(numeric).hstack(encoded)?;

    let mut names = Vec::with_capacity(width);
    names.extend(numeric_names.iter().cloned());
    names.extend((0..encoded.n_cols()).map(|i| format!("{}{}", ENCODED_PREFIX, i)));

    info!(
        rows = matrix.n_rows(),
        cols = matrix.n_cols(),
        nnz = matrix.nnz(),
        "Assembled feature matrix"
    );
    Ok(AssembledFeatures { matrix, names })
}

/// Train rows paired with their labels, and the unlabeled test rows
#[derive(Debug, Clone)]
pub struct SplitFeatures {
    pub train: CsrMatrix,
    pub labels: Vec<f64>,
    pub test: CsrMatrix,
}

/// Slice rows `[0, n_train)` as train and `[n_train, end)` as test.
///
/// Fails with a shape error unless the labels cover the train rows exactly
/// and the two parts partition the assembled rows.
pub fn split_train_test(features: &AssembledFeatures, n_train: usize, labels: &[f64]) -> Result<SplitFeatures> {
    let n_rows = features.n_rows();
    if n_train > n_rows {
        return Err(FeatureError::shape(
            format!("at most {} train rows", n_rows),
            format!("{} train rows", n_train),
        ));
    }
    if labels.len() != n_train {
        return Err(FeatureError::shape(
            format!("{} labels", n_train),
            format!("{} labels", labels.len()),
        ));
    }
    if features.names.len() != features.n_cols() {
        return Err(FeatureError::shape(
            format!("{} feature names", features.n_cols()),
            format!("{} feature names", features.names.len()),
        ));
    }

    let train = features.matrix.slice_rows(0..n_train)?;
    let test = features.matrix.slice_rows(n_train..n_rows)?;

    if train.n_rows() + test.n_rows() != n_rows || train.nnz() + test.nnz() != features.matrix.nnz() {
        return Err(FeatureError::shape(
            format!("{} rows split without loss", n_rows),
            format!("{} + {} rows", train.n_rows(), test.n_rows()),
        ));
    }

    Ok(SplitFeatures {
        train,
        labels: labels.to_vec(),
        test,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_assemble_numeric_then_encoded() {
        let numeric = array![[1.0], [2.0], [3.0]];
        let encoded = CsrMatrix::from_triplets(3, 2, &[(0, 0, 1.0), (2, 1, 1.0)]).unwrap();

        let features = assemble(numeric.view(), &names(&["age"]), &encoded, None).unwrap();
        assert_eq!(features.names, names(&["age", "ohe0", "ohe1"]));
        assert_eq!(features.n_cols(), features.names.len());
        assert_eq!(
            features.matrix.to_dense(),
            array![[1.0, 1.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn test_assemble_without_encoded_columns() {
        let numeric = array![[1.0, 0.0], [0.0, 2.0]];
        let features = assemble(numeric.view(), &names(&["a", "b"]), &CsrMatrix::zeros(2, 0), None).unwrap();
        assert_eq!(features.names, names(&["a", "b"]));
        assert!(features.names.iter().all(|n| !n.starts_with(ENCODED_PREFIX)));
    }

    #[test]
    fn test_assemble_row_mismatch() {
        let numeric = array![[1.0], [2.0]];
        let result = assemble(numeric.view(), &names(&["a"]), &CsrMatrix::zeros(3, 1), None);
        assert!(matches!(result, Err(FeatureError::ShapeError { .. })));
    }

    #[test]
    fn test_assemble_width_limit() {
        let numeric = array![[1.0], [2.0]];
        let result = assemble(numeric.view(), &names(&["a"]), &CsrMatrix::zeros(2, 5), Some(4));
        assert!(matches!(
            result,
            Err(FeatureError::WidthLimitExceeded { width: 6, limit: 4 })
        ));
    }

    #[test]
    fn test_split_partitions_rows() {
        let numeric = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let features = assemble(numeric.view(), &names(&["x"]), &CsrMatrix::zeros(5, 0), None).unwrap();

        let split = split_train_test(&features, 3, &[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(split.train.n_rows(), 3);
        assert_eq!(split.test.n_rows(), 2);
        assert_eq!(split.train.get(2, 0), 3.0);
        assert_eq!(split.test.get(0, 0), 4.0);
        assert_eq!(split.labels, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_split_checks_boundary_and_labels() {
        let numeric = array![[1.0], [2.0]];
        let features = assemble(numeric.view(), &names(&["x"]), &CsrMatrix::zeros(2, 0), None).unwrap();

        assert!(split_train_test(&features, 3, &[0.0, 0.0, 0.0]).is_err());
        assert!(split_train_test(&features, 1, &[0.0, 1.0]).is_err());
        assert_eq!(split_train_test(&features, 2, &[0.0, 1.0]).unwrap().test.n_rows(), 0);
    }
}
