// sopguard/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging (Tracing)
    // RUST_LOG=debug sopguard run ... pour voir les intents résolus.
    // Logs sur stderr : stdout reste exploitable pour `tools` / `route`.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Route {
            check,
            project_dir,
            plan,
        } => commands::route::execute(check, project_dir, plan).await,
        Commands::Tools => commands::tools::execute(),
    }
}
