//! Feature generation pipeline
//!
//! A single forward pass over a train/test pair:
//! load → classify → combine → encode (normalize + one-hot + assemble) → persist.
//!
//! Every stage is fatal on failure and nothing is written until the last
//! stage has produced all three outputs.

pub mod assembler;
pub mod dataset;

pub use assembler::{assemble, split_train_test, AssembledFeatures, SplitFeatures, ENCODED_PREFIX};
pub use dataset::{
    classify_columns, combine, load_datasets, ColumnRoles, CombinedCorpus, Partition, RowKeyedTable,
    TrainTestData,
};

use crate::error::{FeatureError, Result};
use crate::preprocessing::{CategoricalTransformer, FeatureConfig, NumericTransformer, OneHotEncoder, Scaler};
use crate::sparse::CsrMatrix;
use crate::utils::{write_feature_names, DataLoader, FeatureWriter, StagedOutputs, Timer};
use ndarray::Array2;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Pipeline stage, used to tag failures.
///
/// Column classification cannot fail and has no stage of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Configure,
    Load,
    Combine,
    Encode,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configure => "configure",
            Stage::Load => "load",
            Stage::Combine => "combine",
            Stage::Encode => "encode",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// A failure and the stage it happened in
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub error: FeatureError,
}

trait InStage<T> {
    fn in_stage(self, stage: Stage) -> std::result::Result<T, StageError>;
}

impl<T> InStage<T> for Result<T> {
    fn in_stage(self, stage: Stage) -> std::result::Result<T, StageError> {
        self.map_err(|error| StageError { stage, error })
    }
}

/// Input and output paths of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureJob {
    pub train_file: PathBuf,
    pub test_file: PathBuf,
    pub train_feature_file: PathBuf,
    pub test_feature_file: PathBuf,
    pub feature_header_file: PathBuf,
}

impl FeatureJob {
    fn outputs(&self) -> [&PathBuf; 3] {
        [&self.train_feature_file, &self.test_feature_file, &self.feature_header_file]
    }

    /// Reject unsupported output formats and colliding output paths
    pub fn validate(&self) -> Result<()> {
        FeatureWriter::new(&self.train_feature_file)?;
        FeatureWriter::new(&self.test_feature_file)?;

        let outputs = self.outputs();
        for (i, a) in outputs.iter().enumerate() {
            for b in &outputs[i + 1..] {
                if a == b {
                    return Err(FeatureError::ConfigError(format!(
                        "output path {} is used twice",
                        a.display()
                    )));
                }
            }
            if *a == &self.train_file || *a == &self.test_file {
                return Err(FeatureError::ConfigError(format!(
                    "output path {} would overwrite an input",
                    a.display()
                )));
            }
        }
        Ok(())
    }
}

/// Encoded train/test matrices ready to be written
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub split: SplitFeatures,
    pub names: Vec<String>,
    pub roles: ColumnRoles,
    /// Indicator columns produced by the encoder
    pub n_encoded: usize,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub n_train: usize,
    pub n_test: usize,
    pub n_numeric: usize,
    pub n_categorical: usize,
    pub n_encoded: usize,
    pub n_features: usize,
    pub nnz: usize,
    pub elapsed_secs: f64,
    pub outputs: Vec<PathBuf>,
}

/// Train/test feature generation with swappable collaborators
pub struct FeaturePipeline {
    config: FeatureConfig,
    loader: DataLoader,
    normalizer: Box<dyn NumericTransformer>,
    encoder: Box<dyn CategoricalTransformer>,
}

impl FeaturePipeline {
    /// Pipeline with the configured scaler and a one-hot encoder
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        let loader = DataLoader::new()
            .with_delimiter(config.delimiter)
            .with_infer_schema_length(config.infer_schema_length);

        Ok(Self {
            normalizer: Box::new(Scaler::new(config.scaler_type)),
            encoder: Box::new(OneHotEncoder::new(config.min_obs)),
            loader,
            config,
        })
    }

    /// Replace the numeric normalizer
    pub fn with_normalizer(mut self, normalizer: Box<dyn NumericTransformer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Replace the categorical encoder
    pub fn with_encoder(mut self, encoder: Box<dyn CategoricalTransformer>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Run the whole job: read inputs, build features and write all outputs
    pub fn run(&mut self, job: &FeatureJob) -> std::result::Result<PipelineReport, StageError> {
        let timer = Timer::start();

        job.validate().in_stage(Stage::Configure)?;
        let train_writer = FeatureWriter::new(&job.train_feature_file).in_stage(Stage::Configure)?;
        let test_writer = FeatureWriter::new(&job.test_feature_file).in_stage(Stage::Configure)?;

        info!(train = %job.train_file.display(), test = %job.test_file.display(), "Loading raw data");
        let data = load_datasets(&self.loader, &job.train_file, &job.test_file, &self.config)
            .in_stage(Stage::Load)?;

        let features = self.transform_datasets(&data)?;

        info!("Saving features");
        let outputs = Self::persist(&features, &train_writer, &test_writer, &job.feature_header_file)
            .in_stage(Stage::Persist)?;

        let report = PipelineReport {
            n_train: features.split.train.n_rows(),
            n_test: features.split.test.n_rows(),
            n_numeric: features.roles.numeric.len(),
            n_categorical: features.roles.categorical.len(),
            n_encoded: features.n_encoded,
            n_features: features.names.len(),
            nnz: features.split.train.nnz() + features.split.test.nnz(),
            elapsed_secs: timer.elapsed_secs(),
            outputs,
        };

        info!("Finished ({:.2} sec elapsed)", report.elapsed_secs);
        Ok(report)
    }

    /// Classify, combine, encode and re-split already loaded tables
    pub fn transform_datasets(&mut self, data: &TrainTestData) -> std::result::Result<FeatureSet, StageError> {
        let roles = classify_columns(&data.train.frame);
        if roles.is_empty() {
            debug!("No feature columns besides identifier and label");
        }

        let corpus = combine(&data.train, &data.test, &roles).in_stage(Stage::Combine)?;

        let assembled = self.encode(&corpus).in_stage(Stage::Encode)?;
        let n_encoded = assembled.n_cols() - roles.numeric.len();

        let split = split_train_test(&assembled, corpus.n_train, &data.labels).in_stage(Stage::Persist)?;
        if split.test.n_rows() != corpus.n_test {
            return Err(StageError {
                stage: Stage::Persist,
                error: FeatureError::shape(
                    format!("{} test rows", corpus.n_test),
                    format!("{} test rows", split.test.n_rows()),
                ),
            });
        }

        Ok(FeatureSet {
            split,
            names: assembled.names,
            roles,
            n_encoded,
        })
    }

    fn encode(&mut self, corpus: &CombinedCorpus) -> Result<AssembledFeatures> {
        let n_rows = corpus.n_rows();

        info!(columns = corpus.roles.numeric.len(), "Normalizing numeric features");
        let numeric = corpus.numeric_block()?;
        let normalized = if numeric.ncols() == 0 {
            Array2::zeros((n_rows, 0))
        } else {
            self.normalizer.fit_transform(numeric.view())?
        };
        if normalized.dim() != numeric.dim() {
            return Err(FeatureError::shape(
                format!("{:?} normalized block", numeric.dim()),
                format!("{:?}", normalized.dim()),
            ));
        }

        info!(columns = corpus.roles.categorical.len(), "One-hot encoding categorical features");
        let encoded = if corpus.roles.categorical.is_empty() {
            CsrMatrix::zeros(n_rows, 0)
        } else {
            let columns: Vec<&str> = corpus.roles.categorical.iter().map(|s| s.as_str()).collect();
            let encoded = self.encoder.fit_transform(&corpus.frame, &columns)?;
            if encoded.n_cols() != self.encoder.output_width() {
                return Err(FeatureError::shape(
                    format!("{} encoded columns", self.encoder.output_width()),
                    format!("{} encoded columns", encoded.n_cols()),
                ));
            }
            encoded
        };
        debug!(width = encoded.n_cols(), nnz = encoded.nnz(), "Encoded categorical block");

        assemble(normalized.view(), &corpus.roles.numeric, &encoded, self.config.max_features)
    }

    fn persist(
        features: &FeatureSet,
        train_writer: &FeatureWriter,
        test_writer: &FeatureWriter,
        header_path: &Path,
    ) -> Result<Vec<PathBuf>> {
        let split = &features.split;
        let mut staged = StagedOutputs::new();

        staged.stage(header_path, |w| write_feature_names(w, header_path, &features.names))?;
        staged.stage(train_writer.path(), |w| {
            train_writer.write(w, &split.train, Some(&split.labels), &features.names)
        })?;
        staged.stage(test_writer.path(), |w| {
            test_writer.write(w, &split.test, None, &features.names)
        })?;

        let outputs = staged.commit()?;
        info!(
            train_rows = split.train.n_rows(),
            test_rows = split.test.n_rows(),
            features = features.names.len(),
            "Wrote feature files"
        );
        Ok(outputs)
    }
}
