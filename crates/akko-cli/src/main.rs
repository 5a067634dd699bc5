mod cli;
mod commands;
mod config;
mod observability;
mod output;

use akko_cache::create_cache_manager;
use anyhow::{Context, Result, anyhow};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::loader::load_config(cli.config.as_deref())
        .map_err(|e| anyhow!(e))
        .context("Failed to load configuration")?;

    let level = cli.log_level.as_deref().unwrap_or(&cfg.logging.level);
    observability::init_tracing_with_level(level);
    tracing::debug!(
        path = ?cli.config,
        multi_level = cfg.cache.multi_level,
        redis = cfg.cache.redis.enabled,
        "configuration loaded"
    );

    let format = cli.format.unwrap_or_default();
    let policies = cfg.cache.policy_table();

    match &cli.command {
        Commands::Policies => commands::inspect::policies(&policies, format),
        Commands::Get(args) => {
            let manager = create_cache_manager(&cfg.cache).await;
            commands::entries::get(&manager, args, format).await?;
        }
        Commands::Put(args) => {
            let manager = create_cache_manager(&cfg.cache).await;
            commands::entries::put(&manager, args).await?;
        }
        Commands::Evict(args) => {
            let manager = create_cache_manager(&cfg.cache).await;
            commands::entries::evict(&manager, args).await?;
        }
        Commands::Clear(args) => {
            let manager = create_cache_manager(&cfg.cache).await;
            commands::entries::clear(&manager, args).await?;
        }
        Commands::Status => {
            let manager = create_cache_manager(&cfg.cache).await;
            commands::inspect::status(&manager, &policies).await?;
        }
    }

    Ok(())
}
