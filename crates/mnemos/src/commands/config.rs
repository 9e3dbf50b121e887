//! Config command: show, path, init.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use colored::Colorize;

use crate::cli::{ConfigAction, ConfigCommand};
use crate::config::Config;

/// Execute config command.
pub fn execute(cmd: ConfigCommand, path: Option<&Path>, config: &Config) -> Result<()> {
    let config_path = resolve_path(path);

    match cmd.action {
        ConfigAction::Show => {
            let content =
                toml::to_string_pretty(&config.redacted()).context("Failed to serialize config")?;
            println!("{} {}", "#".dimmed(), config_path.display().to_string().dimmed());
            print!("{}", content);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Init { force } => {
            init(&config_path, force)?;
            println!("{} Wrote {}", "✓".green(), config_path.display());
        }
    }

    Ok(())
}

fn resolve_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf).unwrap_or_else(Config::default_path)
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    Config::default().save(path)
}
