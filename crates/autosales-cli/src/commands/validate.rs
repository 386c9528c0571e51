//! Validate configuration command

use anyhow::Result;
use autosales_core::config::{DatabaseMode, SourceKind};

/// Run the validate command
pub async fn run(config_path: &str) -> Result<()> {
    tracing::info!("Validating configuration: {}", config_path);

    let config = super::load_config(config_path)?;
    let project = &config.project;

    tracing::info!("✓ Project: {}", project.name);
    match project.dataset.source {
        SourceKind::Kaggle => tracing::info!(
            "✓ Dataset: kaggle {}/{} ({})",
            project.dataset.owner,
            project.dataset.dataset,
            project.dataset.file_name
        ),
        SourceKind::Local => tracing::info!(
            "✓ Dataset: local {}",
            project.dataset.local_path.as_deref().unwrap_or_default()
        ),
    }
    match project.database.mode {
        DatabaseMode::Embedded => tracing::info!(
            "✓ Database: embedded on port {} in {}",
            project.database.port,
            config.database_data_dir().display()
        ),
        DatabaseMode::External => tracing::info!(
            "✓ Database: external {}:{}/{}",
            project.database.host,
            project.database.port,
            project.database.name
        ),
    }

    println!("Configuration is valid: {}", project.name);
    Ok(())
}
