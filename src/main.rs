use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
#[cfg(feature = "desktop")]
mod desktop;
mod logging;

use crate::commands::{PlacesArgs, SessionArgs};
use crate::config::AppConfig;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file, defaults to <config dir>/beacon/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group notes from a JSON file into places ranked by distance
    Places(PlacesArgs),
    /// Share presence and watch friends against an in-memory store
    Session(SessionArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    logging::init(&config.logs_dir(), &config.log_level)?;

    match cli.command {
        Commands::Places(args) => commands::places(&config, args).await,
        Commands::Session(args) => commands::session(&config, args).await,
    }
}
