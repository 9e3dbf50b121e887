//! Command implementations for the mnemos CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod config;
pub mod ingest;
pub mod session;

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use mnemos_core::{CycleReport, MemoryRecord, MemorySnapshot, Mnemos};

use crate::config::Config;

/// Build the memory engine from configuration.
pub(crate) fn open(config: &Config) -> Result<Mnemos> {
    Mnemos::new(config.memory.clone()).context("Failed to initialise memory")
}

/// First eight characters of an id
pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub(crate) fn print_record(record: &MemoryRecord) {
    println!(
        "  {} [{}] {} {}",
        short_id(&record.id).dimmed(),
        record.category.cyan(),
        record.content,
        format!("(importance {})", record.importance).dimmed()
    );
}

pub(crate) fn print_report(report: &CycleReport) {
    if !report.has_changes() {
        println!("{} Nothing worth remembering", "·".dimmed());
        return;
    }

    let mode = if report.consolidate_skipped {
        "rendered"
    } else {
        "consolidated"
    };
    println!(
        "{} {} candidates ({}), {} related, {} committed, {} forgotten",
        "✓".green(),
        report.candidates,
        mode,
        report.related,
        report.committed.len(),
        report.deleted.len()
    );
    for error in &report.errors {
        println!("  {} {}", "!".yellow(), error);
    }
}

pub(crate) fn print_context(context: &str) {
    println!("{}", "Hot context".bold());
    if context.trim().is_empty() {
        println!("  {}", "(empty)".dimmed());
    } else {
        for line in context.lines() {
            println!("  {}", line);
        }
    }
}

pub(crate) fn write_snapshot(snapshot: &MemorySnapshot, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create snapshot directory")?;
    }
    let json = serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    Ok(())
}
