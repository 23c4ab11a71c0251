//! Data loading utilities

use crate::error::{FeatureError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Field contents read as missing, besides the empty field
const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Loader for delimited text tables with a header row
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Field delimiter; inferred from the extension when unset
    delimiter: Option<u8>,
    /// Rows read to infer column types; the whole file when unset
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            delimiter: None,
            infer_schema_length: None,
        }
    }

    /// Force a field delimiter
    pub fn with_delimiter(mut self, delimiter: Option<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Limit the number of rows used for type inference
    pub fn with_infer_schema_length(mut self, n: Option<usize>) -> Self {
        self.infer_schema_length = n;
        self
    }

    /// Delimiter used for `path`: the forced one, tab for `.tsv`, comma otherwise
    pub fn delimiter_for(&self, path: &Path) -> u8 {
        if let Some(delimiter) = self.delimiter {
            return delimiter;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
            _ => b',',
        }
    }

    /// Load a delimited file
    pub fn load_csv(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| FeatureError::io(path, e))?;

        let null_values = NA_TOKENS.iter().map(|token| (*token).into()).collect();
        let parse_opts = CsvParseOptions::default()
            .with_separator(self.delimiter_for(path))
            .with_null_values(Some(NullValues::AllColumns(null_values)));

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| FeatureError::DataError(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded table");
        Ok(df)
    }
}
