//! Initialize a new Autosales project

use anyhow::Result;
use autosales_core::config::CONFIG_FILE;
use std::fs;
use std::path::Path;

/// Run the init command
pub async fn run(path: &str, name: Option<&str>) -> Result<()> {
    let project_dir = Path::new(path);

    if !project_dir.exists() {
        fs::create_dir_all(project_dir)?;
    }

    let abs_path = project_dir.canonicalize()?;

    // Derive project name from directory name if not provided
    let project_name = match name {
        Some(n) => n.to_string(),
        None => abs_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Could not determine project name from path"))?,
    };

    if project_dir.join(CONFIG_FILE).exists() {
        anyhow::bail!(
            "Directory '{}' already contains a {}",
            project_dir.display(),
            CONFIG_FILE
        );
    }

    tracing::info!("Creating new Autosales project: {}", project_name);

    let config = format!(
        r#"# Autosales Project Configuration
name: {project_name}

dataset:
  # kaggle: download with --kaggle-username/--kaggle-key (or KAGGLE_USERNAME/KAGGLE_KEY)
  # local: copy local_path (a CSV or ZIP file)
  source: kaggle
  owner: syedanwarafridi
  dataset: vehicle-sales-data
  file_name: car_prices.csv

paths:
  raw_dir: .autosales/raw
  staging_dir: .autosales/staging

database:
  # embedded: start a local server in data_dir
  # external: connect with --db-password (or AUTOSALES_DB_PASSWORD)
  mode: embedded
  host: localhost
  port: 5433
  name: autosales
  username: autosales
  data_dir: .autosales/pg
  batch_size: 1000
  reset_schema: true

verify:
  top_n: 10
"#
    );
    fs::write(project_dir.join(CONFIG_FILE), config)?;

    let gitignore = r#"# Autosales working data
.autosales/

# IDE
.idea/
.vscode/
*.swp
"#;
    fs::write(project_dir.join(".gitignore"), gitignore)?;

    tracing::info!(
        "✓ Created project '{}' at {}",
        project_name,
        abs_path.display()
    );
    tracing::info!("");
    tracing::info!("Next steps:");
    if path != "." {
        tracing::info!("  cd {}", project_dir.display());
    }
    tracing::info!("  autosales validate    # Check configuration");
    tracing::info!("  autosales run         # Build the warehouse");

    Ok(())
}
