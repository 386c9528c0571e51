//! Connection settings
//!
//! Credentials travel inside [`ConnectionSettings`] from the caller to
//! [`Warehouse::connect`](crate::Warehouse::connect) and are owned by the
//! warehouse until it is closed. They are never written to the process
//! environment; the CLI clears the variables it read them from.

use autosales_core::Secret;
use autosales_core::config::DatabaseConfig;
use sqlx::postgres::PgConnectOptions;

/// Login role and password
#[derive(Debug, Clone)]
pub struct DatabaseCredentials {
    /// Role name
    pub username: String,
    /// Role password
    pub password: Secret,
}

/// Everything needed to open the warehouse connection
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Login
    pub credentials: DatabaseCredentials,
}

impl ConnectionSettings {
    /// Settings for the configured server, authenticated with `password`
    pub fn from_config(config: &DatabaseConfig, password: Secret) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            database: config.name.clone(),
            credentials: DatabaseCredentials {
                username: config.username.clone(),
                password,
            },
        }
    }

    /// sqlx connect options
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.credentials.username)
            .password(self.credentials.password.expose())
    }

    /// Connection target without the password, for logs
    pub fn display_target(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}",
            self.credentials.username, self.host, self.port, self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let config = DatabaseConfig {
            host: "db.internal".to_string(),
            port: 6543,
            name: "dw".to_string(),
            username: "loader".to_string(),
            ..Default::default()
        };
        let settings = ConnectionSettings::from_config(&config, Secret::new("s3cret"));
        assert_eq!(settings.display_target(), "postgres://loader@db.internal:6543/dw");
        assert_eq!(settings.credentials.password.expose(), "s3cret");
    }

    #[test]
    fn test_debug_hides_password() {
        let settings =
            ConnectionSettings::from_config(&DatabaseConfig::default(), Secret::new("s3cret"));
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("s3cret"));
        assert!(!settings.display_target().contains("s3cret"));
    }

    #[test]
    fn test_connect_options_carry_password_without_exposing_it() {
        let settings =
            ConnectionSettings::from_config(&DatabaseConfig::default(), Secret::new("s3cret"));
        let options = settings.connect_options();
        assert_eq!(options.get_username(), "autosales");
        assert_eq!(options.get_port(), 5433);
        assert!(!format!("{:?}", settings.credentials).contains("s3cret"));
    }
}
