use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "akko-cache")]
#[command(about = "Inspect and manage Akko platform caches")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./akko.toml when present)
    #[arg(short, long, global = true, env = "AKKO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read a key (e.g. user detail:42)
    Get(KeyArgs),
    /// Write a JSON value through every tier
    Put(PutArgs),
    /// Remove a key from every tier
    Evict(KeyArgs),
    /// Remove every key of a cache
    Clear(CacheArgs),
    /// Show the effective policy table
    Policies,
    /// Provision the known caches and show which tiers back them
    Status,
}

#[derive(clap::Args)]
pub struct CacheArgs {
    /// Cache name (user, role, permission, menu, dictionary, config)
    pub cache: String,
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// Cache name (user, role, permission, menu, dictionary, config)
    pub cache: String,
    /// Key within the cache (e.g. detail:42)
    pub key: String,
}

#[derive(clap::Args)]
pub struct PutArgs {
    /// Cache name (user, role, permission, menu, dictionary, config)
    pub cache: String,
    /// Key within the cache (e.g. detail:42)
    pub key: String,
    /// JSON value (reads --file or stdin if omitted)
    pub value: Option<String>,
    /// Path to a JSON file
    #[arg(long, conflicts_with = "value")]
    pub file: Option<PathBuf>,
    /// Cache an absence instead of a value
    #[arg(long, conflicts_with_all = ["value", "file"])]
    pub null: bool,
    /// Keep an existing entry instead of overwriting it
    #[arg(long)]
    pub if_absent: bool,
}
