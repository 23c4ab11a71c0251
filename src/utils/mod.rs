//! Utility functions and types

pub mod data_loader;
pub mod data_saver;

pub use data_loader::DataLoader;
pub use data_saver::{write_feature_names, FeatureWriter, OutputFormat, StagedOutputs};

use std::time::{Duration, Instant};

/// Wall-clock timer for stage logging
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Seconds since start
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}
