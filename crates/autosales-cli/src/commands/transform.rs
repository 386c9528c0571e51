//! Normalize the raw dataset into staged files

use anyhow::{Context, Result};
use autosales_core::extract::find_dataset_file;
use autosales_core::transform::transform;
use autosales_core::{Config, StagedTables, TransformReport};
use std::path::Path;

/// Transform `raw_csv` into the configured staging directory
pub async fn transform_dataset(
    config: &Config,
    raw_csv: &Path,
) -> Result<(StagedTables, TransformReport)> {
    let staged = StagedTables::new(config.staging_dir());
    let input = raw_csv.to_path_buf();
    let output = staged.clone();
    let report = tokio::task::spawn_blocking(move || transform(&input, &output))
        .await
        .context("Transform task failed")?
        .with_context(|| format!("Failed to transform {}", raw_csv.display()))?;
    Ok((staged, report))
}

/// Run the transform command
pub async fn run(config_path: &str) -> Result<()> {
    let config = super::load_config(config_path)?;
    let file_name = &config.project.dataset.file_name;
    let raw_csv = find_dataset_file(&config.raw_dir(), file_name).with_context(|| {
        format!("{file_name} not found in the raw directory; run `autosales extract` first")
    })?;

    let (staged, report) = transform_dataset(&config, &raw_csv).await?;
    println!("Staged tables in {}", staged.dir().display());
    print!("{report}");
    Ok(())
}
