//! Load staged files into the warehouse

use anyhow::{Context, Result};
use autosales_core::{Config, LoadSummary, Loader, MemorySink, Secret, StagedTables};

use crate::session::Session;

/// Staged tables of the project, failing when the transform has not run
pub fn staged_tables(config: &Config) -> Result<StagedTables> {
    let staged = StagedTables::new(config.staging_dir());
    if !staged.is_complete() {
        anyhow::bail!(
            "Staged tables missing in {}; run `autosales transform` first",
            staged.dir().display()
        );
    }
    Ok(staged)
}

/// Load into memory and check referential integrity
pub async fn load_in_memory(config: &Config, staged: &StagedTables) -> Result<MemorySink> {
    let mut sink = MemorySink::new();
    let summary = Loader::new(&mut sink, config.project.database.batch_size)
        .load(staged)
        .await
        .context("Failed to load staged tables into memory")?;
    tracing::debug!("Dry-run load:\n{}", summary);

    let violations = sink.violations();
    if !violations.is_empty() {
        for violation in &violations {
            tracing::error!("{}", violation);
        }
        anyhow::bail!("{} integrity violations in loaded data", violations.len());
    }
    Ok(sink)
}

/// Load the staged tables through `session`
pub async fn load_into(
    session: &Session,
    config: &Config,
    staged: &StagedTables,
) -> Result<LoadSummary> {
    session
        .warehouse()
        .load(staged, config.project.database.batch_size)
        .await
}

/// Run the load command
pub async fn run(config_path: &str, dry_run: bool, password: Option<Secret>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let staged = staged_tables(&config)?;

    if dry_run {
        let sink = load_in_memory(&config, &staged).await?;
        println!("Dry run: all fact rows reference existing dimension rows");
        for (table, count) in sink.row_counts() {
            println!("  {table}: {count} rows");
        }
        return Ok(());
    }

    let session = Session::open(&config, password)
        .await
        .context("Failed to open warehouse")?;
    let result = async {
        session
            .warehouse()
            .create_schema(config.project.database.reset_schema)
            .await
            .context("Failed to create schema")?;
        load_into(&session, &config, &staged).await
    }
    .await;
    session.close().await;

    let summary = result?;
    println!("Loaded warehouse");
    print!("{summary}");
    Ok(())
}
