//! Loading, column classification and train+test combination

use crate::error::{FeatureError, Result};
use crate::preprocessing::{ColumnType, FeatureConfig};
use crate::utils::DataLoader;
use ndarray::Array2;
use polars::prelude::*;
use std::path::Path;
use tracing::info;

/// Which input partition a table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Train,
    Test,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Test => "test",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table keyed by its identifier column.
///
/// `frame` holds the feature columns only; the key lives in `ids`.
#[derive(Debug, Clone)]
pub struct RowKeyedTable {
    pub partition: Partition,
    pub ids: Series,
    pub frame: DataFrame,
}

impl RowKeyedTable {
    /// Split `df` into its unique key column and the remaining columns
    pub fn from_frame(partition: Partition, df: DataFrame, id_col: &str) -> Result<Self> {
        let ids = df
            .column(id_col)
            .map_err(|_| {
                FeatureError::schema(partition.as_str(), format!("missing identifier column '{}'", id_col))
            })?
            .as_materialized_series()
            .clone();

        if ids.null_count() > 0 {
            return Err(FeatureError::schema(
                partition.as_str(),
                format!("identifier column '{}' has {} missing values", id_col, ids.null_count()),
            ));
        }
        let n_unique = ids.n_unique()?;
        if n_unique != ids.len() {
            return Err(FeatureError::schema(
                partition.as_str(),
                format!(
                    "identifier column '{}' has {} duplicate keys",
                    id_col,
                    ids.len() - n_unique
                ),
            ));
        }

        let frame = df.drop(id_col)?;
        Ok(Self { partition, ids, frame })
    }

    pub fn n_rows(&self) -> usize {
        self.ids.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }
}

/// Train and test tables with the train labels split off
#[derive(Debug, Clone)]
pub struct TrainTestData {
    pub train: RowKeyedTable,
    pub test: RowKeyedTable,
    /// One label per train row, in train row order
    pub labels: Vec<f64>,
}

/// Read both input files and split off the train labels
pub fn load_datasets(
    loader: &DataLoader,
    train_path: &Path,
    test_path: &Path,
    config: &FeatureConfig,
) -> Result<TrainTestData> {
    let train_df = loader.load_csv(train_path)?;
    let test_df = loader.load_csv(test_path)?;

    let mut train = RowKeyedTable::from_frame(Partition::Train, train_df, &config.id_col)?;
    let test = RowKeyedTable::from_frame(Partition::Test, test_df, &config.id_col)?;

    let labels = extract_labels(&train.frame, &config.target_col)?;
    train.frame = train.frame.drop(&config.target_col)?;

    info!(
        train_rows = train.n_rows(),
        test_rows = test.n_rows(),
        "Loaded raw data"
    );

    Ok(TrainTestData { train, test, labels })
}

fn extract_labels(frame: &DataFrame, target_col: &str) -> Result<Vec<f64>> {
    let column = frame.column(target_col).map_err(|_| {
        FeatureError::schema("train", format!("missing label column '{}'", target_col))
    })?;

    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let ca = series.f64()?;
    if ca.null_count() > 0 {
        return Err(FeatureError::schema(
            "train",
            format!(
                "label column '{}' has {} missing or non-numeric values",
                target_col,
                ca.null_count()
            ),
        ));
    }

    Ok(ca.into_no_null_iter().collect())
}

/// Feature columns split by role, each group in original column order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRoles {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
}

impl ColumnRoles {
    pub fn len(&self) -> usize {
        self.numeric.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn role_of(&self, column: &str) -> Option<ColumnType> {
        if self.numeric.iter().any(|c| c == column) {
            Some(ColumnType::Numeric)
        } else if self.categorical.iter().any(|c| c == column) {
            Some(ColumnType::Categorical)
        } else {
            None
        }
    }
}

/// Classify the columns of the train table by declared type
pub fn classify_columns(train: &DataFrame) -> ColumnRoles {
    let mut roles = ColumnRoles::default();
    for column in train.get_columns() {
        let name = column.name().to_string();
        match ColumnType::from_dtype(column.dtype()) {
            ColumnType::Numeric => roles.numeric.push(name),
            ColumnType::Categorical => roles.categorical.push(name),
        }
    }

    info!(
        categorical = roles.categorical.len(),
        numerical = roles.numeric.len(),
        "Classified feature columns"
    );
    roles
}

/// Train rows followed by test rows, with the boundary remembered
#[derive(Debug, Clone)]
pub struct CombinedCorpus {
    pub frame: DataFrame,
    pub roles: ColumnRoles,
    pub n_train: usize,
    pub n_test: usize,
}

impl CombinedCorpus {
    pub fn n_rows(&self) -> usize {
        self.n_train + self.n_test
    }

    /// Dense `rows × numeric columns` block; missing values become NaN
    pub fn numeric_block(&self) -> Result<Array2<f64>> {
        let mut block = Array2::from_elem((self.n_rows(), self.roles.numeric.len()), f64::NAN);
        for (j, name) in self.roles.numeric.iter().enumerate() {
            let series = self.frame.column(name)?.as_materialized_series();
            let ca = series.f64()?;
            if ca.len() != self.n_rows() {
                return Err(FeatureError::shape(
                    format!("{} rows in '{}'", self.n_rows(), name),
                    format!("{} rows", ca.len()),
                ));
            }
            for (i, value) in ca.into_iter().enumerate() {
                if let Some(v) = value {
                    block[[i, j]] = v;
                }
            }
        }
        Ok(block)
    }
}

/// Stack train and test rows under the train classification.
///
/// Both tables must carry the same columns in the same order. Numeric
/// columns are read as `Float64` and categorical columns as `String`, so a
/// test column is never classified on its own content.
pub fn combine(train: &RowKeyedTable, test: &RowKeyedTable, roles: &ColumnRoles) -> Result<CombinedCorpus> {
    check_same_columns(&train.column_names(), &test.column_names())?;

    let train_frame = coerce_to_roles(&train.frame, roles, Partition::Train)?;
    let test_frame = coerce_to_roles(&test.frame, roles, Partition::Test)?;
    let frame = train_frame.vstack(&test_frame)?;

    let corpus = CombinedCorpus {
        frame,
        roles: roles.clone(),
        n_train: train.n_rows(),
        n_test: test.n_rows(),
    };

    if !roles.is_empty() && corpus.frame.height() != corpus.n_rows() {
        return Err(FeatureError::shape(
            format!("{} combined rows", corpus.n_rows()),
            format!("{} combined rows", corpus.frame.height()),
        ));
    }

    info!(
        rows = corpus.n_rows(),
        n_train = corpus.n_train,
        "Combined train and test rows"
    );
    Ok(corpus)
}

fn check_same_columns(train_cols: &[String], test_cols: &[String]) -> Result<()> {
    if let Some(missing) = train_cols.iter().find(|c| !test_cols.contains(c)) {
        return Err(FeatureError::schema(
            "test",
            format!("column '{}' present in train is missing", missing),
        ));
    }
    if let Some(extra) = test_cols.iter().find(|c| !train_cols.contains(c)) {
        return Err(FeatureError::schema(
            "test",
            format!("column '{}' is not present in train", extra),
        ));
    }
    if let Some((pos, (a, b))) = train_cols
        .iter()
        .zip(test_cols)
        .enumerate()
        .find(|(_, (a, b))| a != b)
    {
        return Err(FeatureError::schema(
            "test",
            format!("column order differs at position {}: expected '{}', found '{}'", pos, a, b),
        ));
    }
    Ok(())
}

fn coerce_to_roles(frame: &DataFrame, roles: &ColumnRoles, partition: Partition) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(frame.width());

    for column in frame.get_columns() {
        let name = column.name().to_string();
        let series = column.as_materialized_series();
        let coerced = match roles.role_of(&name) {
            Some(ColumnType::Numeric) => series.strict_cast(&DataType::Float64).map_err(|_| {
                FeatureError::schema(
                    partition.as_str(),
                    format!("column '{}' cannot be read as numeric ({})", name, series.dtype()),
                )
            })?,
            Some(ColumnType::Categorical) => series.cast(&DataType::String)?,
            None => {
                return Err(FeatureError::schema(
                    partition.as_str(),
                    format!("column '{}' was not classified", name),
                ))
            }
        };
        columns.push(coerced.into());
    }

    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(partition: Partition, df: DataFrame) -> RowKeyedTable {
        RowKeyedTable::from_frame(partition, df, "id").unwrap()
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let df = df!("id" => &[1, 1, 2], "a" => &[1.0, 2.0, 3.0]).unwrap();
        let result = RowKeyedTable::from_frame(Partition::Train, df, "id");
        assert!(matches!(result, Err(FeatureError::SchemaError { .. })));
    }

    #[test]
    fn test_missing_id_column() {
        let df = df!("a" => &[1.0]).unwrap();
        let err = RowKeyedTable::from_frame(Partition::Test, df, "id").unwrap_err();
        assert!(err.to_string().contains("test"));
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_extract_labels() {
        let df = df!("target" => &[0, 1, 0]).unwrap();
        assert_eq!(extract_labels(&df, "target").unwrap(), vec![0.0, 1.0, 0.0]);

        let df = df!("target" => &["yes", "no"]).unwrap();
        assert!(matches!(
            extract_labels(&df, "target"),
            Err(FeatureError::SchemaError { .. })
        ));
        assert!(extract_labels(&df, "label").is_err());
    }

    #[test]
    fn test_classify_columns_keeps_order() {
        let df = df!(
            "b" => &["x", "y"],
            "a" => &[1.0, 2.0],
            "d" => &[true, false],
            "c" => &["u", "v"],
        )
        .unwrap();

        let roles = classify_columns(&df);
        assert_eq!(roles.numeric, vec!["a", "d"]);
        assert_eq!(roles.categorical, vec!["b", "c"]);
        assert_eq!(roles.role_of("c"), Some(ColumnType::Categorical));
        assert_eq!(roles.role_of("id"), None);
    }

    #[test]
    fn test_combine_keeps_train_first() {
        let train = table(Partition::Train, df!("id" => &[1, 2], "age" => &[20, 30], "city" => &["NY", "LA"]).unwrap());
        let test = table(Partition::Test, df!("id" => &[1], "age" => &[25.5], "city" => &["SF"]).unwrap());
        let roles = classify_columns(&train.frame);

        let corpus = combine(&train, &test, &roles).unwrap();
        assert_eq!(corpus.n_train, 2);
        assert_eq!(corpus.n_rows(), 3);

        let block = corpus.numeric_block().unwrap();
        assert_eq!(block.column(0).to_vec(), vec![20.0, 30.0, 25.5]);
    }

    #[test]
    fn test_combine_uses_train_classification() {
        // codes look numeric in test but are categorical in train
        let train = table(Partition::Train, df!("id" => &[1, 2], "code" => &["a", "7"]).unwrap());
        let test = table(Partition::Test, df!("id" => &[3], "code" => &[7]).unwrap());
        let roles = classify_columns(&train.frame);

        let corpus = combine(&train, &test, &roles).unwrap();
        assert_eq!(corpus.frame.column("code").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_combine_rejects_text_in_numeric_column() {
        let train = table(Partition::Train, df!("id" => &[1], "age" => &[20]).unwrap());
        let test = table(Partition::Test, df!("id" => &[2], "age" => &["old"]).unwrap());
        let roles = classify_columns(&train.frame);

        let err = combine(&train, &test, &roles).unwrap_err();
        assert!(matches!(err, FeatureError::SchemaError { .. }));
    }

    #[test]
    fn test_combine_schema_mismatch() {
        let train = table(Partition::Train, df!("id" => &[1], "a" => &[1.0], "b" => &[2.0]).unwrap());
        let roles = classify_columns(&train.frame);

        let missing = table(Partition::Test, df!("id" => &[1], "a" => &[1.0]).unwrap());
        let err = combine(&train, &missing, &roles).unwrap_err();
        assert!(err.to_string().contains("'b'"));

        let reordered = table(Partition::Test, df!("id" => &[1], "b" => &[2.0], "a" => &[1.0]).unwrap());
        let err = combine(&train, &reordered, &roles).unwrap_err();
        assert!(err.to_string().contains("order"));

        let extra = table(
            Partition::Test,
            df!("id" => &[1], "a" => &[1.0], "b" => &[2.0], "c" => &[3.0]).unwrap(),
        );
        assert!(combine(&train, &extra, &roles).is_err());
    }
}
