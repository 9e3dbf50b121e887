//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Mnemos - tiered semantic memory for LLM agents
///
/// Feeds observations through summarize / merge / prune / commit cycles and
/// shows what the memory retained.
#[derive(Parser, Debug)]
#[command(name = "mnemos")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true, env = "MNEMOS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one consolidation cycle per file, then print the memory
    Ingest(IngestArgs),

    /// Interactive session: each line is an observation
    Session,

    /// Configuration management (show, path, init)
    Config(ConfigCommand),

    /// Show version information
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingest Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Files to observe, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Write a JSON snapshot of both tiers to this path
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// Print the final snapshot as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration (API keys hidden)
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
