use clap::{Parser, Subcommand};
use std::path::PathBuf;
use testdb_provider::infrastructure::config::{Config, LogFormat};
use testdb_provider::{DbConfigProvider, NoopMigrator, SqlxMigrations, TestDbProvider};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Provision and tear down isolated test databases cloned from a template.
///
/// Server and template settings come from TESTDB_HOST, TESTDB_PORT,
/// TESTDB_USERNAME, TESTDB_PASSWORD, TESTDB_DATABASE and TESTDB_SSL_MODE.
#[derive(Debug, Parser)]
#[command(name = "testdb-provider", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Clone a fresh database from the template and print its URL
    Provision {
        /// Directory of sqlx migrations applied to the template
        #[arg(long, env = "TESTDB_MIGRATIONS_DIR")]
        migrations: Option<PathBuf>,
    },
    /// Drop a provisioned database and forget it
    Cleanup {
        /// Name of the database to drop
        database: String,
    },
    /// Drop every managed database past its expiry
    Sweep,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Using template {} on {}:{}",
        config.db.database,
        config.db.host,
        config.db.port
    );

    match cli.command {
        Command::Provision { migrations } => {
            let provider = match migrations {
                Some(dir) => {
                    tracing::info!(dir = %dir.display(), "Loading template migrations");
                    TestDbProvider::new(config.db.clone(), SqlxMigrations::from_dir(&dir).await?)?
                }
                None => TestDbProvider::new(config.db.clone(), NoopMigrator)?,
            };

            let fresh = provider.get_fresh_db_config().await?;
            println!("{}", fresh.database_url());
        }
        Command::Cleanup { database } => {
            let provider = TestDbProvider::new(config.db.clone(), NoopMigrator)?;
            let target = provider.template_config().with_database(database);
            provider.cleanup(&target).await?;
        }
        Command::Sweep => {
            let provider = TestDbProvider::new(config.db.clone(), NoopMigrator)?;
            let swept = provider.sweep_expired().await?;
            for name in swept {
                println!("{name}");
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    // Logs go to stderr so stdout stays machine-readable
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "testdb_provider=info".into()),
            )
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "testdb_provider=info".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }
}
