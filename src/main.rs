//! Kolosal Features - Main Entry Point
//!
//! Generates train/test feature files from raw tables.

use clap::Parser;
use kolosal_features::cli::{cmd_generate, Cli};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_features=info".into()),
        )
        .init();

    let cli = Cli::parse();
    cmd_generate(&cli)?;

    Ok(())
}
