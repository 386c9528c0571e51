//! Autosales CLI
//!
//! Builds the vehicle-sales warehouse: extract, transform, load, verify.

use anyhow::Result;
use autosales_core::Secret;
use autosales_core::config::KaggleCredentials;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod local_db;
mod prompt;
mod session;

/// Autosales - vehicle-sales data warehouse
#[derive(Parser)]
#[command(name = "autosales")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file or project directory
    #[arg(short, long, default_value = "autosales.yaml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Variables that may carry a secret into [`Cli::parse`]
///
/// They are read once by clap and then removed, so the secrets live only in
/// the parsed arguments.
const SECRET_VARS: [&str; 2] = ["KAGGLE_KEY", "AUTOSALES_DB_PASSWORD"];

/// Dataset API login
#[derive(Args, Debug, Default)]
pub struct KaggleArgs {
    /// Kaggle username
    #[arg(long, env = "KAGGLE_USERNAME", hide_env_values = true)]
    kaggle_username: Option<String>,

    /// Kaggle API key
    #[arg(long, env = "KAGGLE_KEY", hide_env_values = true)]
    kaggle_key: Option<String>,
}

impl KaggleArgs {
    /// Credentials, when both parts were supplied
    pub fn credentials(self) -> Option<KaggleCredentials> {
        match (self.kaggle_username, self.kaggle_key) {
            (Some(username), Some(key)) => Some(KaggleCredentials {
                username,
                key: Secret::new(key),
            }),
            _ => None,
        }
    }
}

/// External database login
#[derive(Args, Debug, Default)]
pub struct DatabaseArgs {
    /// Password for an external database
    #[arg(long, env = "AUTOSALES_DB_PASSWORD", hide_env_values = true)]
    db_password: Option<String>,
}

impl DatabaseArgs {
    /// Password as a secret
    pub fn password(self) -> Option<Secret> {
        self.db_password.map(Secret::new)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new Autosales project
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Project name (defaults to directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Validate configuration without running
    Validate,

    /// Download or copy the raw dataset
    Extract {
        /// Fetch again even when the dataset is already present
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        kaggle: KaggleArgs,
    },

    /// Normalize the raw dataset into staged dimension and fact files
    Transform,

    /// Create the schema and load the staged files
    Load {
        /// Load into memory and check integrity instead of the database
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        database: DatabaseArgs,
    },

    /// Run the verification queries
    Verify {
        #[command(flatten)]
        database: DatabaseArgs,
    },

    /// Run the whole pipeline
    Run {
        /// Do not pause for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Skip the database and load into memory
        #[arg(long)]
        dry_run: bool,

        /// Fetch the dataset again even when present
        #[arg(long)]
        force: bool,

        #[command(flatten)]
        kaggle: KaggleArgs,

        #[command(flatten)]
        database: DatabaseArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    clear_secret_vars(&SECRET_VARS);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

/// Remove `vars` from the process environment
///
/// Must be called before the runtime starts any thread.
fn clear_secret_vars(vars: &[&str]) {
    for var in vars {
        if std::env::var_os(var).is_some() {
            // SAFETY: the process is still single threaded here
            unsafe { std::env::remove_var(var) };
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init { path, name } => {
            commands::init::run(&path, name.as_deref()).await?;
        }
        Commands::Validate => {
            commands::validate::run(&cli.config).await?;
        }
        Commands::Extract { force, kaggle } => {
            commands::extract::run(&cli.config, force, kaggle.credentials()).await?;
        }
        Commands::Transform => {
            commands::transform::run(&cli.config).await?;
        }
        Commands::Load { dry_run, database } => {
            commands::load::run(&cli.config, dry_run, database.password()).await?;
        }
        Commands::Verify { database } => {
            commands::verify::run(&cli.config, database.password()).await?;
        }
        Commands::Run {
            yes,
            dry_run,
            force,
            kaggle,
            database,
        } => {
            let options = commands::run::RunOptions {
                assume_yes: yes,
                dry_run,
                force,
            };
            commands::run::run(
                &cli.config,
                options,
                kaggle.credentials(),
                database.password(),
            )
            .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_env_is_read_then_cleared() {
        // SAFETY: no other test in this binary reads this variable
        unsafe { std::env::set_var("AUTOSALES_DB_PASSWORD", "s3cret") };

        let cli = Cli::parse_from(["autosales", "verify"]);
        clear_secret_vars(&SECRET_VARS);

        assert!(std::env::var_os("AUTOSALES_DB_PASSWORD").is_none());
        let Commands::Verify { database } = cli.command else {
            panic!("expected the verify command");
        };
        assert_eq!(database.password().unwrap().expose(), "s3cret");
    }

    #[test]
    fn test_password_flag_wins_over_env() {
        let cli = Cli::parse_from(["autosales", "load", "--db-password", "from-flag"]);
        let Commands::Load { database, .. } = cli.command else {
            panic!("expected the load command");
        };
        assert_eq!(database.password().unwrap().expose(), "from-flag");
    }
}
