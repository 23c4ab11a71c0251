//! One-hot encoding with rare-category collapsing

use super::CategoricalTransformer;
use crate::error::{FeatureError, Result};
use crate::sparse::CsrMatrix;
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Indicator layout learned for one source column
#[derive(Debug, Clone)]
struct ColumnVocab {
    column: String,
    /// Kept categories in output order; `None` is the missing value
    categories: Vec<Option<String>>,
    index: HashMap<Option<String>, usize>,
    /// First output column of this source column
    offset: usize,
}

/// One-hot encoder producing sparse indicator blocks.
///
/// A value seen at least `min_obs` times gets its own column. Rarer values,
/// and values never seen during fit, fall into the column's "other" bucket,
/// which is the all-zero indicator row. Within a source column, categories
/// are ordered by descending count, ties by first appearance.
#[derive(Debug, Clone)]
pub struct OneHotEncoder {
    min_obs: usize,
    vocabs: Vec<ColumnVocab>,
    width: usize,
    is_fitted: bool,
}

impl OneHotEncoder {
    /// Create a new encoder
    pub fn new(min_obs: usize) -> Self {
        Self {
            min_obs: min_obs.max(1),
            vocabs: Vec::new(),
            width: 0,
            is_fitted: false,
        }
    }

    pub fn min_obs(&self) -> usize {
        self.min_obs
    }

    /// `column=value` description of every output column, in output order
    pub fn feature_labels(&self) -> Vec<String> {
        self.vocabs
            .iter()
            .flat_map(|vocab| {
                vocab.categories.iter().map(move |c| match c {
                    Some(value) => format!("{}={}", vocab.column, value),
                    None => format!("{}=<missing>", vocab.column),
                })
            })
            .collect()
    }

    fn string_values(df: &DataFrame, col_name: &str) -> Result<Vec<Option<String>>> {
        let column = df.column(col_name).map_err(|_| {
            FeatureError::schema("categorical", format!("column '{}' not found", col_name))
        })?;
        let series = column.as_materialized_series().cast(&DataType::String)?;
        let ca = series.str()?;
        Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
    }

    fn build_vocab(&self, col_name: &str, values: Vec<Option<String>>, offset: usize) -> ColumnVocab {
        // value -> (count, first position)
        let mut counts: HashMap<Option<String>, (usize, usize)> = HashMap::new();
        for (pos, value) in values.into_iter().enumerate() {
            counts.entry(value).or_insert((0, pos)).0 += 1;
        }

        let n_unique = counts.len();
        let mut kept: Vec<(Option<String>, usize, usize)> = counts
            .into_iter()
            .filter(|(_, (count, _))| *count >= self.min_obs)
            .map(|(value, (count, first))| (value, count, first))
            .collect();
        kept.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        debug!(
            column = col_name,
            unique = n_unique,
            kept = kept.len(),
            collapsed = n_unique - kept.len(),
            "Fitted one-hot vocabulary"
        );

        let categories: Vec<Option<String>> = kept.into_iter().map(|(value, _, _)| value).collect();
        let index = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();

        ColumnVocab {
            column: col_name.to_string(),
            categories,
            index,
            offset,
        }
    }
}

impl CategoricalTransformer for OneHotEncoder {
    fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<()> {
        let mut vocabs = Vec::with_capacity(columns.len());
        let mut offset = 0;

        for col_name in columns {
            let values = Self::string_values(df, col_name)?;
            let vocab = self.build_vocab(col_name, values, offset);
            offset += vocab.categories.len();
            vocabs.push(vocab);
        }

        self.vocabs = vocabs;
        self.width = offset;
        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<CsrMatrix> {
        if !self.is_fitted {
            return Err(FeatureError::ModelNotFitted);
        }

        let n_rows = df.height();
        let mut triplets = Vec::with_capacity(n_rows * self.vocabs.len());

        for vocab in &self.vocabs {
            let values = Self::string_values(df, &vocab.column)?;
            for (row, value) in values.into_iter().enumerate() {
                if let Some(&idx) = vocab.index.get(&value) {
                    triplets.push((row, vocab.offset + idx, 1.0));
                }
            }
        }

        CsrMatrix::from_triplets(n_rows, self.width, &triplets)
    }

    fn output_width(&self) -> usize {
        self.width
    }
}
