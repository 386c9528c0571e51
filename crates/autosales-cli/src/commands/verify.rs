//! Run the verification queries

use anyhow::{Context, Result};
use autosales_core::Secret;

use crate::session::Session;

/// Run the verify command
pub async fn run(config_path: &str, password: Option<Secret>) -> Result<()> {
    let config = super::load_config(config_path)?;

    let session = Session::open(&config, password)
        .await
        .context("Failed to open warehouse")?;
    let result = session.warehouse().verify(&config.project.verify).await;
    session.close().await;

    let report = result.context("Verification failed")?;
    print!("{report}");
    Ok(())
}
