mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;
use portal_session::SessionManager;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    let cfg = config::loader::load_config(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    observability::init_tracing_with_level(&cfg.logging.level);

    let sessions = SessionManager::connect(&cfg.store, cfg.sessions.clone())
        .await
        .with_context(|| format!("Cannot reach the session store at {}", cfg.store.endpoint()))?;
    tracing::debug!(endpoint = %cfg.store.endpoint(), "connected to session store");

    match &cli.command {
        Commands::Inspect(args) => {
            commands::session::inspect(&sessions, &args.key, format).await?;
        }
        Commands::Backends(args) => {
            commands::session::backends(&sessions, &args.key, format).await?;
        }
        Commands::AppStatus(args) => {
            commands::session::app_status(&sessions, &args.key, &args.app_id, format).await?;
        }
        Commands::Destroy(args) => {
            commands::session::destroy(&sessions, &args.key, args.app).await?;
        }
        Commands::Topology => {
            commands::store::topology(sessions.store(), &cfg.store, format).await?;
        }
    }

    Ok(())
}
