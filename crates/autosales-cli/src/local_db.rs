//! Embedded PostgreSQL server

use anyhow::{Context, Result};
use autosales_core::Secret;
use autosales_core::config::DatabaseConfig;
use autosales_warehouse::ConnectionSettings;
use postgresql_embedded::{PostgreSQL, Settings};
use std::path::Path;

/// Password file kept beside the cluster so later runs can log in again
const PASSWORD_FILE: &str = ".pgpass";

/// A running embedded PostgreSQL server
///
/// The server is stopped by [`EmbeddedServer::stop`]; callers stop it on
/// both the success and the failure path.
pub struct EmbeddedServer {
    pg: PostgreSQL,
    port: u16,
}

impl EmbeddedServer {
    /// Install (first run), initialize and start the server, and make sure
    /// the warehouse database exists
    pub async fn start(
        config: &DatabaseConfig,
        data_dir: &Path,
    ) -> Result<(Self, ConnectionSettings)> {
        std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;

        tracing::debug!("Initializing PostgreSQL in {:?}", data_dir);

        let password_file = data_dir.join(PASSWORD_FILE);
        let password = cluster_password(&password_file)?;

        let settings = Settings {
            installation_dir: data_dir.join("pg"),
            data_dir: data_dir.join("data"),
            password_file: password_file.clone(),
            port: config.port,
            username: config.username.clone(),
            password: password.expose().to_string(),
            temporary: false,
            ..Default::default()
        };

        let mut pg = PostgreSQL::new(settings);

        tracing::info!("Setting up PostgreSQL (this may take a moment on first run)...");
        pg.setup().await.context("Failed to setup PostgreSQL")?;

        tracing::debug!("Starting PostgreSQL server...");
        pg.start().await.context("Failed to start PostgreSQL")?;

        let server = Self {
            pg,
            port: config.port,
        };
        if let Err(e) = server.ensure_database(&config.name).await {
            server.stop().await;
            return Err(e);
        }

        tracing::info!("Embedded database ready on port {}", config.port);

        let connection = ConnectionSettings::from_config(
            &DatabaseConfig {
                host: "localhost".to_string(),
                ..config.clone()
            },
            password,
        );
        Ok((server, connection))
    }

    async fn ensure_database(&self, name: &str) -> Result<()> {
        if !self
            .pg
            .database_exists(name)
            .await
            .context("Failed to check database existence")?
        {
            tracing::debug!("Creating database '{}'", name);
            self.pg
                .create_database(name)
                .await
                .context("Failed to create database")?;
        }
        Ok(())
    }

    /// Stop the server; failures are logged, not returned
    pub async fn stop(self) {
        tracing::info!("Stopping embedded database on port {}", self.port);
        if let Err(e) = self.pg.stop().await {
            tracing::warn!("Failed to stop embedded database: {}", e);
        }
    }
}

/// Password of the cluster in `password_file`'s directory, generated on
/// first use
fn cluster_password(password_file: &Path) -> Result<Secret> {
    if password_file.exists() {
        let stored = std::fs::read_to_string(password_file)
            .with_context(|| format!("Failed to read {}", password_file.display()))?;
        return Ok(Secret::new(stored.trim()));
    }
    let generated = Settings::default().password;
    std::fs::write(password_file, &generated)
        .with_context(|| format!("Failed to write {}", password_file.display()))?;
    Ok(Secret::new(generated))
}
