//! Feature matrix persistence
//!
//! Matrices are written in a format picked from the output file extension.
//! Outputs are staged in temporary files next to their destination and only
//! renamed into place once every output of a run has been written.

use crate::error::{FeatureError, Result};
use crate::sparse::CsrMatrix;
use polars::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, warn};

/// On-disk layout of a feature matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// svmlight text: `label idx:value ...`, one-based indices
    LibSvm,
    /// Dense comma-separated rows, label first when present
    Csv,
    /// Dense Parquet columns named after the features
    Parquet,
}

impl OutputFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "sps" | "svm" | "libsvm" => Ok(OutputFormat::LibSvm),
            "csv" => Ok(OutputFormat::Csv),
            "parquet" | "pq" => Ok(OutputFormat::Parquet),
            _ => Err(FeatureError::ConfigError(format!(
                "unsupported feature file extension '{}' for {}",
                ext,
                path.display()
            ))),
        }
    }
}

/// Writes one feature matrix, with or without labels, to a destination path
#[derive(Debug, Clone)]
pub struct FeatureWriter {
    path: PathBuf,
    format: OutputFormat,
}

impl FeatureWriter {
    /// Writer for `path`, failing on an unsupported extension
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = OutputFormat::from_path(&path)?;
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Serialize `matrix` into `out`.
    ///
    /// `labels` must have one entry per row when given.
    pub fn write<W: Write>(
        &self,
        out: W,
        matrix: &CsrMatrix,
        labels: Option<&[f64]>,
        feature_names: &[String],
    ) -> Result<()> {
        if let Some(labels) = labels {
            if labels.len() != matrix.n_rows() {
                return Err(FeatureError::shape(
                    format!("{} labels", matrix.n_rows()),
                    format!("{} labels", labels.len()),
                ));
            }
        }
        if feature_names.len() != matrix.n_cols() {
            return Err(FeatureError::shape(
                format!("{} feature names", matrix.n_cols()),
                format!("{} feature names", feature_names.len()),
            ));
        }

        match self.format {
            OutputFormat::LibSvm => self.write_libsvm(out, matrix, labels),
            OutputFormat::Csv => self.write_csv(out, matrix, labels),
            OutputFormat::Parquet => self.write_parquet(out, matrix, labels, feature_names),
        }
    }

    fn write_libsvm<W: Write>(&self, mut out: W, matrix: &CsrMatrix, labels: Option<&[f64]>) -> Result<()> {
        if labels.is_none() {
            debug!(path = %self.path.display(), "Unlabeled svmlight output uses a 0 target placeholder");
        }
        for i in 0..matrix.n_rows() {
            let label = labels.map(|l| l[i]).unwrap_or(0.0);
            let mut line = label.to_string();
            for (j, v) in matrix.row(i) {
                line.push_str(&format!(" {}:{}", j + 1, v));
            }
            line.push('\n');
            out.write_all(line.as_bytes()).map_err(|e| FeatureError::io(&self.path, e))?;
        }
        out.flush().map_err(|e| FeatureError::io(&self.path, e))
    }

    fn write_csv<W: Write>(&self, mut out: W, matrix: &CsrMatrix, labels: Option<&[f64]>) -> Result<()> {
        let dense = matrix.to_dense();
        for (i, row) in dense.rows().into_iter().enumerate() {
            let mut fields: Vec<String> = Vec::with_capacity(row.len() + 1);
            if let Some(labels) = labels {
                fields.push(labels[i].to_string());
            }
            fields.extend(row.iter().map(|v| v.to_string()));
            writeln!(out, "{}", fields.join(",")).map_err(|e| FeatureError::io(&self.path, e))?;
        }
        out.flush().map_err(|e| FeatureError::io(&self.path, e))
    }

    fn write_parquet<W: Write>(
        &self,
        out: W,
        matrix: &CsrMatrix,
        labels: Option<&[f64]>,
        feature_names: &[String],
    ) -> Result<()> {
        let dense = matrix.to_dense();
        let mut columns: Vec<Column> = Vec::with_capacity(feature_names.len() + 1);
        if let Some(labels) = labels {
            columns.push(Column::new("target".into(), labels.to_vec()));
        }
        for (name, values) in feature_names.iter().zip(dense.columns()) {
            columns.push(Column::new(name.as_str().into(), values.to_vec()));
        }

        let mut df = DataFrame::new(columns)?;
        ParquetWriter::new(out).finish(&mut df)?;
        Ok(())
    }
}

/// Write the feature name list, one name per line
pub fn write_feature_names<W: Write>(mut out: W, path: &Path, feature_names: &[String]) -> Result<()> {
    for name in feature_names {
        writeln!(out, "{}", name).map_err(|e| FeatureError::io(path, e))?;
    }
    out.flush().map_err(|e| FeatureError::io(path, e))
}

/// Output files written to temporary siblings and committed together
#[derive(Debug, Default)]
pub struct StagedOutputs {
    staged: Vec<(PathBuf, NamedTempFile)>,
}

impl StagedOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of staged outputs
    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Write the content of `path` into a temporary file in the same directory
    pub fn stage<F>(&mut self, path: &Path, write: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
    {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".kolosal-features-")
            .tempfile_in(&dir)
            .map_err(|e| FeatureError::io(path, e))?;

        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            write(&mut writer)?;
            writer.flush().map_err(|e| FeatureError::io(path, e))?;
        }

        self.staged.push((path.to_path_buf(), tmp));
        Ok(())
    }

    /// Move every staged file to its destination.
    ///
    /// Files already at a destination are moved aside first. If any step
    /// fails, destinations committed in this call are removed, the previous
    /// files are put back and the remaining temporaries are discarded.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut committed: Vec<(PathBuf, Option<TempPath>)> = Vec::with_capacity(self.staged.len());

        for (path, tmp) in self.staged {
            let backup = match move_aside(&path) {
                Ok(backup) => backup,
                Err(err) => {
                    rollback(committed);
                    return Err(err);
                }
            };
            if let Err(err) = tmp.persist(&path) {
                committed.push((path.clone(), backup));
                rollback(committed);
                return Err(FeatureError::io(path, err.error));
            }
            committed.push((path, backup));
        }

        // dropping the backups deletes the replaced files
        Ok(committed.into_iter().map(|(path, _)| path).collect())
    }
}

/// Rename an existing file at `path` to a temporary sibling
fn move_aside(path: &Path) -> Result<Option<TempPath>> {
    if !path.exists() {
        return Ok(None);
    }
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let backup = tempfile::Builder::new()
        .prefix(".kolosal-features-previous-")
        .tempfile_in(dir)
        .map_err(|e| FeatureError::io(path, e))?
        .into_temp_path();
    std::fs::rename(path, &backup).map_err(|e| FeatureError::io(path, e))?;
    debug!(path = %path.display(), "Moved previous output aside");
    Ok(Some(backup))
}

fn rollback(committed: Vec<(PathBuf, Option<TempPath>)>) {
    for (path, backup) in committed.into_iter().rev() {
        if path.is_file() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to roll back output");
            }
        }
        if let Some(backup) = backup {
            if let Err(e) = backup.persist(&path) {
                warn!(path = %path.display(), error = %e.error, "Failed to restore previous output");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_matrix() -> CsrMatrix {
        CsrMatrix::from_dense(array![[0.5, 0.0, 1.0], [0.0, 0.0, 0.0]].view())
    }

    fn names() -> Vec<String> {
        vec!["age".to_string(), "ohe0".to_string(), "ohe1".to_string()]
    }

    fn render(path: &str, labels: Option<&[f64]>) -> String {
        let writer = FeatureWriter::new(path).unwrap();
        let mut buf = Vec::new();
        writer.write(&mut buf, &sample_matrix(), labels, &names()).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a.sps")).unwrap(), OutputFormat::LibSvm);
        assert_eq!(OutputFormat::from_path(Path::new("a.CSV")).unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path(Path::new("a.parquet")).unwrap(), OutputFormat::Parquet);
        assert!(matches!(
            OutputFormat::from_path(Path::new("a.h5")),
            Err(FeatureError::ConfigError(_))
        ));
    }

    #[test]
    fn test_libsvm_layout() {
        let text = render("train.sps", Some(&[1.0, 0.0]));
        assert_eq!(text, "1 1:0.5 3:1\n0\n");
    }

    #[test]
    fn test_csv_label_only_when_given() {
        assert_eq!(render("train.csv", Some(&[1.0, 0.0])), "1,0.5,0,1\n0,0,0,0\n");
        assert_eq!(render("test.csv", None), "0.5,0,1\n0,0,0\n");
    }

    #[test]
    fn test_label_count_mismatch() {
        let writer = FeatureWriter::new("train.sps").unwrap();
        let result = writer.write(Vec::new(), &sample_matrix(), Some(&[1.0]), &names());
        assert!(matches!(result, Err(FeatureError::ShapeError { .. })));
    }

    #[test]
    fn test_parquet_roundtrip_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.parquet");
        let writer = FeatureWriter::new(&path).unwrap();
        let file = File::create(&path).unwrap();
        writer.write(file, &sample_matrix(), Some(&[1.0, 0.0]), &names()).unwrap();

        let df = ParquetReader::new(File::open(&path).unwrap()).finish().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 4);
        assert!(df.column("target").is_ok());
    }

    #[test]
    fn test_feature_names_one_per_line() {
        let mut buf = Vec::new();
        write_feature_names(&mut buf, Path::new("header.txt"), &names()).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "age\nohe0\nohe1\n");
    }

    #[test]
    fn test_staged_outputs_commit_together() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");

        let mut staged = StagedOutputs::new();
        staged
            .stage(&a, |w| w.write_all(b"first").map_err(|e| FeatureError::io(&a, e)))
            .unwrap();
        staged
            .stage(&b, |w| w.write_all(b"second").map_err(|e| FeatureError::io(&b, e)))
            .unwrap();
        assert!(!a.exists());

        let committed = staged.commit().unwrap();
        assert_eq!(committed.len(), 2);
        assert_eq!(std::fs::read_to_string(&a).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&b).unwrap(), "second");
    }

    #[test]
    fn test_staging_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.sps");

        let mut staged = StagedOutputs::new();
        let result = staged.stage(&path, |_| Ok(()));
        assert!(matches!(result, Err(FeatureError::IoError { .. })));
        assert!(staged.is_empty());
    }

    #[test]
    fn test_commit_replaces_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, "old").unwrap();

        let mut staged = StagedOutputs::new();
        staged
            .stage(&path, |w| w.write_all(b"new").map_err(|e| FeatureError::io(&path, e)))
            .unwrap();
        staged.commit().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_commit_restores_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.txt");
        std::fs::write(&first, "old").unwrap();
        // a non-empty directory cannot be replaced by a file
        let blocked = dir.path().join("b.txt");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), "x").unwrap();

        let mut staged = StagedOutputs::new();
        staged
            .stage(&first, |w| w.write_all(b"new").map_err(|e| FeatureError::io(&first, e)))
            .unwrap();
        staged.stage(&blocked, |_| Ok(())).unwrap();

        let result = staged.commit();
        assert!(matches!(result, Err(FeatureError::IoError { .. })));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "old");
        assert!(blocked.join("keep").exists());
        // no temporaries or backups left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_dropped_stage_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        {
            let mut staged = StagedOutputs::new();
            staged.stage(&path, |_| Ok(())).unwrap();
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
