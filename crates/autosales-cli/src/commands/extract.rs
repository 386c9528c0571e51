//! Fetch the raw dataset

use anyhow::{Context, Result};
use autosales_core::config::KaggleCredentials;
use autosales_core::extract::{extract, source_for};
use autosales_core::{Config, RawDataset};

/// Download or copy the dataset into the raw directory
pub async fn extract_dataset(
    config: &Config,
    credentials: Option<KaggleCredentials>,
    force: bool,
) -> Result<RawDataset> {
    let source = source_for(config, credentials).context("Failed to configure dataset source")?;
    let raw = extract(
        source.as_ref(),
        &config.raw_dir(),
        &config.project.dataset.file_name,
        force,
    )
    .await
    .with_context(|| format!("Failed to extract dataset from {}", source.describe()))?;
    Ok(raw)
}

/// Run the extract command
pub async fn run(
    config_path: &str,
    force: bool,
    credentials: Option<KaggleCredentials>,
) -> Result<()> {
    let config = super::load_config(config_path)?;
    let raw = extract_dataset(&config, credentials, force).await?;

    if raw.fetched {
        println!("Extracted {}", raw.csv_path.display());
    } else {
        println!(
            "Dataset already present at {} (use --force to fetch again)",
            raw.csv_path.display()
        );
    }
    Ok(())
}
