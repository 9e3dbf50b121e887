//! Ingest command: one consolidation cycle per file.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use super::{open, print_context, print_record, print_report, write_snapshot};
use crate::cli::IngestArgs;
use crate::config::Config;

/// Execute ingest command.
pub async fn execute(args: IngestArgs, config: &Config) -> Result<()> {
    let mnemos = open(config)?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    for path in &args.files {
        if cancel.is_cancelled() {
            bail!("Interrupted");
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        if !args.json {
            println!("{} {}", "→".blue(), path.display());
        }

        let report = mnemos
            .observe_with_cancel(&observation(path, &content), &cancel)
            .await
            .with_context(|| format!("Consolidation failed for {}", path.display()))?;

        if !args.json {
            print_report(&report);
        }
    }

    let snapshot = mnemos.store().snapshot().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!();
        print_context(&snapshot.hot_context);
        println!();
        println!("{} ({})", "Memories".bold(), snapshot.records.len());
        for record in &snapshot.records {
            print_record(record);
        }
    }

    if let Some(path) = &args.snapshot {
        write_snapshot(&snapshot, path)?;
        if !args.json {
            println!("{} Snapshot written to {}", "✓".green(), path.display());
        }
    }

    Ok(())
}

/// Observation text for one file
fn observation(path: &Path, content: &str) -> String {
    format!("File: {}\nContent:\n{}", path.display(), content)
}
