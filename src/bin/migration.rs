use anyhow::Context;
use clap::{Parser, Subcommand};
use commerce_core::{config, db};
use migrations::{Migrator, MigratorTrait};
use tracing::info;

/// Schema management for the commerce database.
#[derive(Debug, Parser)]
#[command(name = "migration", version, about)]
struct Cli {
    /// Overrides the configured database URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations (default).
    Up {
        /// Apply at most this many migrations.
        #[arg(short, long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations.
    Down {
        #[arg(short, long, default_value_t = 1)]
        steps: u32,
    },
    /// Print the state of every migration.
    Status,
    /// Drop every table and reapply all migrations.
    Fresh,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);
    if let Some(url) = cli.database_url {
        cfg.database_url = url;
    }
    cfg.auto_migrate = false;

    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;

    match cli.command.unwrap_or(Command::Up { steps: None }) {
        Command::Up { steps } => {
            Migrator::up(&pool, steps).await?;
            info!("Migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&pool, Some(steps)).await?;
            info!(steps, "Migrations rolled back");
        }
        Command::Status => Migrator::status(&pool).await?,
        Command::Fresh => {
            Migrator::fresh(&pool).await?;
            info!("Schema recreated");
        }
    }

    db::close_pool(pool).await?;
    Ok(())
}
