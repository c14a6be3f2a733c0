//! civica database migration tool.
//!
//! ```text
//! civica-migrate [up]       apply pending migrations
//! civica-migrate down [N]   roll back the last N migrations (default 1)
//! civica-migrate status     list pending migrations
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use civica_common::{AppResult, Config, LoggingConfig};
use sea_orm::DatabaseConnection;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "civica-migrate")]
#[command(about = "Apply or roll back civica database migrations", long_about = None)]
struct Cli {
    /// Configuration file to use instead of the `config/` directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Apply pending migrations
    Up,
    /// Roll back the most recent migrations
    Down {
        /// Number of migrations to roll back
        #[arg(default_value_t = 1)]
        steps: u32,
    },
    /// List pending migrations
    Status,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(db: &DatabaseConnection, command: Command) -> AppResult<()> {
    match command {
        Command::Up => {
            civica_db::migrate(db).await?;
            info!("Migrations completed");
        }
        Command::Down { steps } => {
            civica_db::rollback(db, steps).await?;
            info!(steps, "Rolled back migrations");
        }
        Command::Status => {
            let pending = civica_db::pending_migrations(db).await?;
            if pending.is_empty() {
                info!("Database is up to date");
            }
            for name in pending {
                info!(migration = %name, "Pending");
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    init_tracing(&config.logging);

    let result = async {
        let db = civica_db::init(&config).await?;
        info!("Connected to database");
        run(&db, cli.command.unwrap_or(Command::Up)).await
    }
    .await;

    if let Err(e) = &result {
        e.trace();
    }
    Ok(result?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("civica-migrate").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&[]).unwrap().command, None);
        assert_eq!(parse(&["up"]).unwrap().command, Some(Command::Up));
        assert_eq!(
            parse(&["down"]).unwrap().command,
            Some(Command::Down { steps: 1 })
        );
        assert_eq!(
            parse(&["down", "3"]).unwrap().command,
            Some(Command::Down { steps: 3 })
        );
        assert_eq!(parse(&["status"]).unwrap().command, Some(Command::Status));
    }

    #[test]
    fn test_parse_config_path() {
        let cli = parse(&["--config", "config/production.toml", "status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("config/production.toml")));
        assert_eq!(cli.command, Some(Command::Status));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse(&["sideways"]).is_err());
        assert!(parse(&["down", "-1"]).is_err());
        assert!(parse(&["down", "two"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
