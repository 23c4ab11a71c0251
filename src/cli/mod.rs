//! Kolosal Features CLI Module
//!
//! Command-line interface for generating train/test feature files.

use clap::Parser;
use colored::*;
use std::path::PathBuf;

use crate::pipeline::{FeatureJob, FeaturePipeline, PipelineReport};
use crate::preprocessing::{FeatureConfig, ScalerType};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString    { s.truecolor(100, 210, 120) }

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "kolosal-features")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate normalized, one-hot encoded train/test feature files")]
#[command(long_about = None)]
pub struct Cli {
    /// Raw train table (delimited text with header)
    #[arg(long = "train-file")]
    pub train_file: PathBuf,

    /// Raw test table (delimited text with header)
    #[arg(long = "test-file")]
    pub test_file: PathBuf,

    /// Output train feature file (.sps, .csv or .parquet)
    #[arg(long = "train-feature-file")]
    pub train_feature_file: PathBuf,

    /// Output test feature file (.sps, .csv or .parquet)
    #[arg(long = "test-feature-file")]
    pub test_feature_file: PathBuf,

    /// Output feature name list, one name per line
    #[arg(long = "feature-header-file")]
    pub feature_header_file: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Identifier column name [default: id]
    #[arg(long)]
    pub id_col: Option<String>,

    /// Label column name [default: target]
    #[arg(long)]
    pub target_col: Option<String>,

    /// Minimum observations for a category to get its own column [default: 10]
    #[arg(long)]
    pub min_obs: Option<usize>,

    /// Numeric normalizer (gauss, standard, minmax, robust, maxabs, none) [default: gauss]
    #[arg(long)]
    pub scaler: Option<String>,

    /// Fail when the assembled feature width exceeds this
    #[arg(long)]
    pub max_features: Option<usize>,
}

impl Cli {
    /// Base configuration from `--config` (or defaults) with flag overrides
    pub fn feature_config(&self) -> anyhow::Result<FeatureConfig> {
        let mut config = match &self.config {
            Some(path) => FeatureConfig::from_json_file(path)?,
            None => FeatureConfig::default(),
        };

        if let Some(id_col) = &self.id_col {
            config = config.with_id_col(id_col.clone());
        }
        if let Some(target_col) = &self.target_col {
            config = config.with_target_col(target_col.clone());
        }
        if let Some(min_obs) = self.min_obs {
            config = config.with_min_obs(min_obs);
        }
        if let Some(scaler) = &self.scaler {
            config = config.with_scaler(scaler.parse::<ScalerType>()?);
        }
        if let Some(max_features) = self.max_features {
            config = config.with_max_features(max_features);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn job(&self) -> FeatureJob {
        FeatureJob {
            train_file: self.train_file.clone(),
            test_file: self.test_file.clone(),
            train_feature_file: self.train_feature_file.clone(),
            test_feature_file: self.test_feature_file.clone(),
            feature_header_file: self.feature_header_file.clone(),
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

/// Generate the feature files described by `cli`
pub fn cmd_generate(cli: &Cli) -> anyhow::Result<PipelineReport> {
    let config = cli.feature_config()?;
    let job = cli.job();

    let mut pipeline = FeaturePipeline::new(config)?;
    let report = pipeline.run(&job)?;

    print_report(&report);
    Ok(report)
}

fn print_report(report: &PipelineReport) {
    section("Features");
    kv("Train rows", &report.n_train.to_string());
    kv("Test rows", &report.n_test.to_string());
    kv("Numeric", &report.n_numeric.to_string());
    kv("Categorical", &format!("{} → {} indicators", report.n_categorical, report.n_encoded));
    kv("Features", &report.n_features.to_string());
    kv("Non-zeros", &report.nnz.to_string());
    println!();
    for path in &report.outputs {
        step_ok(&format!("{}", path.display()));
    }
    println!();
    println!("  {}", dim(&format!("finished ({:.2} sec elapsed)", report.elapsed_secs)));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = [
            "kolosal-features",
            "--train-file", "train.csv",
            "--test-file", "test.csv",
            "--train-feature-file", "train.sps",
            "--test-feature-file", "test.sps",
            "--feature-header-file", "header.txt",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        v.extend(extra.iter().map(|s| s.to_string()));
        v
    }

    #[test]
    fn test_required_paths() {
        let cli = Cli::try_parse_from(args(&[])).unwrap();
        assert_eq!(cli.job().test_feature_file, PathBuf::from("test.sps"));
        assert_eq!(cli.feature_config().unwrap(), FeatureConfig::default());

        assert!(Cli::try_parse_from(["kolosal-features", "--train-file", "train.csv"]).is_err());
    }

    #[test]
    fn test_flag_overrides() {
        let cli = Cli::try_parse_from(args(&[
            "--id-col", "row_id", "--min-obs", "2", "--scaler", "standard", "--max-features", "50",
        ]))
        .unwrap();
        let config = cli.feature_config().unwrap();
        assert_eq!(config.id_col, "row_id");
        assert_eq!(config.min_obs, 2);
        assert_eq!(config.scaler_type, ScalerType::Standard);
        assert_eq!(config.max_features, Some(50));
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.json");
        std::fs::write(&path, r#"{"target_col": "label", "min_obs": 5}"#).unwrap();

        let cli = Cli::try_parse_from(args(&["--config", path.to_str().unwrap(), "--min-obs", "3"])).unwrap();
        let config = cli.feature_config().unwrap();
        assert_eq!(config.target_col, "label");
        assert_eq!(config.min_obs, 3);
    }

    #[test]
    fn test_unknown_scaler_rejected() {
        let cli = Cli::try_parse_from(args(&["--scaler", "zscore"])).unwrap();
        assert!(cli.feature_config().is_err());
    }
}
