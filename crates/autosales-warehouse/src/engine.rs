//! Warehouse connection and the operations run against it

use anyhow::Context;
use autosales_core::config::VerifyConfig;
use autosales_core::{LoadSummary, Loader, StagedTables};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::connection::ConnectionSettings;
use crate::error::Result;
use crate::postgres::{MAX_BATCH_ROWS, PgSink};
use crate::schema;
use crate::verify::{self, VerificationReport};

/// An open connection to the warehouse database
///
/// The pool holds a single connection that is shared by schema creation,
/// loading and verification. [`Warehouse::close`] consumes the warehouse,
/// dropping the connection settings and with them the password.
pub struct Warehouse {
    settings: ConnectionSettings,
    pool: PgPool,
}

impl Warehouse {
    /// Open the connection described by `settings`
    pub async fn connect(settings: ConnectionSettings) -> Result<Self> {
        tracing::info!("Connecting to {}", settings.display_target());
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(settings.connect_options())
            .await
            .with_context(|| format!("Failed to connect to {}", settings.display_target()))?;
        Ok(Self { settings, pool })
    }

    /// Wrap an existing pool
    pub fn with_pool(settings: ConnectionSettings, pool: PgPool) -> Self {
        Self { settings, pool }
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the star schema, dropping existing tables when `reset`
    pub async fn create_schema(&self, reset: bool) -> Result<()> {
        schema::create(&self.pool, reset).await
    }

    /// Load the staged tables, dimensions first
    ///
    /// `batch_size` is capped at [`MAX_BATCH_ROWS`].
    pub async fn load(&self, staged: &StagedTables, batch_size: usize) -> Result<LoadSummary> {
        let batch_size = batch_size.min(MAX_BATCH_ROWS);
        let mut sink = PgSink::new(self.pool.clone());
        let summary = Loader::new(&mut sink, batch_size)
            .load(staged)
            .await
            .context("Failed to load staged tables")?;
        Ok(summary)
    }

    /// Run the verification queries
    pub async fn verify(&self, config: &VerifyConfig) -> Result<VerificationReport> {
        verify::run(&self.pool, config).await
    }

    /// Close the connection and release the credentials
    pub async fn close(self) {
        tracing::info!("Closing connection to {}", self.settings.display_target());
        self.pool.close().await;
    }
}
