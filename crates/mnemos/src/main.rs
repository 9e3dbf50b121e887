//! mnemos - tiered semantic memory CLI
//!
//! Drives consolidation cycles over files or an interactive session and
//! prints the resulting hot context and cold records.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("mnemos=info".parse()?)
                .add_directive("mnemos_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load(cli.config.as_deref())?;

    // Execute command
    match cli.command {
        Commands::Ingest(args) => commands::ingest::execute(args, &config).await,
        Commands::Session => commands::session::execute(&config).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.config.as_deref(), &config),
        Commands::Version => {
            println!("mnemos {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
