//! Run the whole pipeline

use anyhow::{Context, Result};
use autosales_core::config::KaggleCredentials;
use autosales_core::{Config, Secret, Stage, StagedTables};
use tokio::io::AsyncBufRead;

use crate::prompt::Prompter;
use crate::session::Session;

use super::extract::extract_dataset;
use super::load::{load_in_memory, load_into};
use super::transform::transform_dataset;

/// Flags of the run command
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip the confirmation prompts
    pub assume_yes: bool,
    /// Load into memory instead of the database
    pub dry_run: bool,
    /// Fetch the dataset even when present
    pub force: bool,
}

/// Run the run command
pub async fn run(
    config_path: &str,
    options: RunOptions,
    kaggle: Option<KaggleCredentials>,
    password: Option<Secret>,
) -> Result<()> {
    let config = super::load_config(config_path)?;
    tracing::info!("Building warehouse for project {}", config.project.name);

    Stage::Extract.begin();
    let raw = extract_dataset(&config, kaggle, options.force)
        .await
        .with_context(|| format!("Stage '{}' failed", Stage::Extract))?;

    Stage::Transform.begin();
    let (staged, report) = transform_dataset(&config, &raw.csv_path)
        .await
        .with_context(|| format!("Stage '{}' failed", Stage::Transform))?;
    print!("{report}");

    if options.dry_run {
        tracing::info!("Dry run: loading into memory, database stages skipped");
        Stage::Load.begin();
        let sink = load_in_memory(&config, &staged)
            .await
            .with_context(|| format!("Stage '{}' failed", Stage::Load))?;
        println!("Dry run complete");
        for (table, count) in sink.row_counts() {
            println!("  {table}: {count} rows");
        }
        return Ok(());
    }

    Stage::StartDatabase.begin();
    let session = Session::open(&config, password)
        .await
        .with_context(|| format!("Stage '{}' failed", Stage::StartDatabase))?;

    let mut prompter = Prompter::stdin(options.assume_yes);
    let result = database_stages(&session, &config, &staged, &mut prompter).await;

    Stage::Teardown.begin();
    if result.is_ok() && let Err(e) = prompter.pause("Press Enter to tear down").await {
        tracing::warn!("{:#}", e);
    }
    session.close().await;

    result?;
    println!("Warehouse build complete");
    Ok(())
}

/// Schema, load and verification, run while the session is open
async fn database_stages(
    session: &Session,
    config: &Config,
    staged: &StagedTables,
    prompter: &mut Prompter<impl AsyncBufRead + Unpin>,
) -> Result<()> {
    Stage::CreateSchema.begin();
    session
        .warehouse()
        .create_schema(config.project.database.reset_schema)
        .await
        .with_context(|| format!("Stage '{}' failed", Stage::CreateSchema))?;

    Stage::Load.begin();
    let summary = load_into(session, config, staged)
        .await
        .with_context(|| format!("Stage '{}' failed", Stage::Load))?;
    print!("{summary}");

    Stage::Verify.begin();
    if prompter.confirm("Run verification queries?").await? {
        let report = session
            .warehouse()
            .verify(&config.project.verify)
            .await
            .with_context(|| format!("Stage '{}' failed", Stage::Verify))?;
        print!("{report}");
    } else {
        tracing::info!("Verification skipped");
    }
    Ok(())
}
