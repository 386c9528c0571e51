//! Database session: the warehouse connection plus, in embedded mode, the
//! server it runs on

use anyhow::{Context, Result};
use autosales_core::config::DatabaseMode;
use autosales_core::{Config, Secret};
use autosales_warehouse::{ConnectionSettings, Warehouse};

use crate::local_db::EmbeddedServer;

/// Open warehouse connection and the embedded server behind it, if any
pub struct Session {
    warehouse: Warehouse,
    server: Option<EmbeddedServer>,
}

impl Session {
    /// Start the server (embedded mode) and connect
    ///
    /// `password` is only used in external mode; the embedded server has its
    /// own generated password.
    pub async fn open(config: &Config, password: Option<Secret>) -> Result<Self> {
        let database = &config.project.database;
        let (server, settings) = match database.mode {
            DatabaseMode::Embedded => {
                let (server, settings) =
                    EmbeddedServer::start(database, &config.database_data_dir()).await?;
                (Some(server), settings)
            }
            DatabaseMode::External => {
                let password = password.context(
                    "A database password is required in external mode \
                     (--db-password or AUTOSALES_DB_PASSWORD)",
                )?;
                (None, ConnectionSettings::from_config(database, password))
            }
        };

        match Warehouse::connect(settings).await {
            Ok(warehouse) => Ok(Self { warehouse, server }),
            Err(e) => {
                if let Some(server) = server {
                    server.stop().await;
                }
                Err(e)
            }
        }
    }

    /// The open warehouse
    pub fn warehouse(&self) -> &Warehouse {
        &self.warehouse
    }

    /// Close the connection, then stop the embedded server
    pub async fn close(self) {
        self.warehouse.close().await;
        if let Some(server) = self.server {
            server.stop().await;
        }
    }
}
