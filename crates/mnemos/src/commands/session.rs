//! Interactive session over stdin.
//!
//! Plain lines are observations. Slash commands inspect or edit the memory:
//! `/recall <query>`, `/context`, `/memories`, `/forget <id>`,
//! `/save [path]`, `/help`, `/quit`. Ctrl-C cancels a running cycle, and at
//! an idle prompt it ends the session.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use mnemos_core::Mnemos;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;

use super::{open, print_context, print_record, print_report, short_id, write_snapshot};
use crate::config::Config;

/// One parsed line of input
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Observe(String),
    Recall(String),
    Context,
    Memories,
    Forget(String),
    Save(Option<PathBuf>),
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Observe(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match (name, arg) {
        ("recall" | "r", query) if !query.is_empty() => Input::Recall(query.to_string()),
        ("context" | "c", _) => Input::Context,
        ("memories" | "m", _) => Input::Memories,
        ("forget" | "f", id) if !id.is_empty() => Input::Forget(id.to_string()),
        ("save", "") => Input::Save(None),
        ("save", path) => Input::Save(Some(PathBuf::from(path))),
        ("help" | "h", _) => Input::Help,
        ("quit" | "q" | "exit", _) => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

/// Execute session command.
pub async fn execute(config: &Config) -> Result<()> {
    let mnemos = open(config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{} Type an observation, or /help", "mnemos".bold());

    loop {
        print!("{} ", ">".cyan());
        std::io::stdout().flush()?;

        let line = match next_prompt(&mut lines, interrupted()).await? {
            Prompt::Line(line) => line,
            Prompt::Eof => break,
            Prompt::Interrupt => {
                println!();
                break;
            }
        };

        match parse_input(&line) {
            Input::Observe(text) => observe(&mnemos, &text).await,
            Input::Recall(query) => {
                let store = mnemos.store();
                let limit = store.config().recall_limit;
                let threshold = store.config().recall_threshold;
                let hits = store.recall_scored(&query, limit, threshold).await;
                if hits.is_empty() {
                    println!("{} Nothing related", "·".dimmed());
                }
                for hit in hits {
                    print!("  {:.2}", hit.similarity);
                    print_record(&hit.record);
                }
            }
            Input::Context => print_context(&mnemos.store().context().await),
            Input::Memories => {
                let records = mnemos.store().all().await;
                println!("{} ({})", "Memories".bold(), records.len());
                for record in &records {
                    print_record(record);
                }
            }
            Input::Forget(prefix) => forget(&mnemos, &prefix).await,
            Input::Save(path) => {
                let path = path.unwrap_or_else(|| config.paths.snapshot_dir.join("session.json"));
                let snapshot = mnemos.store().snapshot().await;
                match write_snapshot(&snapshot, &path) {
                    Ok(()) => println!("{} Snapshot written to {}", "✓".green(), path.display()),
                    Err(e) => println!("{} {:#}", "✗".red(), e),
                }
            }
            Input::Help => print_help(),
            Input::Quit => break,
            Input::Empty => {}
            Input::Unknown(line) => println!("{} Unknown command: {}", "?".yellow(), line),
        }
    }

    Ok(())
}

/// What ended a wait at the prompt
#[derive(Debug, PartialEq, Eq)]
enum Prompt {
    Line(String),
    Eof,
    Interrupt,
}

async fn next_prompt<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    interrupt: impl Future<Output = ()>,
) -> Result<Prompt> {
    tokio::select! {
        line = lines.next_line() => Ok(match line? {
            Some(line) => Prompt::Line(line),
            None => Prompt::Eof,
        }),
        _ = interrupt => Ok(Prompt::Interrupt),
    }
}

/// Resolves on Ctrl-C, never when signals are unavailable.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn observe(mnemos: &Mnemos, text: &str) {
    let cancel = CancellationToken::new();
    let cycle = mnemos.observe_with_cancel(text, &cancel);
    tokio::pin!(cycle);

    let result = tokio::select! {
        result = &mut cycle => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            cycle.await
        }
    };

    match result {
        Ok(report) => print_report(&report),
        Err(e) if e.is_cancelled() => println!("{} Cycle cancelled", "·".dimmed()),
        Err(e) => println!("{} {}", "✗".red(), e),
    }
}

/// Forget the single record whose id starts with `prefix`.
async fn forget(mnemos: &Mnemos, prefix: &str) {
    let matches: Vec<String> = mnemos
        .store()
        .all()
        .await
        .into_iter()
        .map(|r| r.id)
        .filter(|id| id.starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [id] => match mnemos.store().delete(id).await {
            Ok(()) => println!("{} Forgot {}", "✓".green(), short_id(id)),
            Err(e) => println!("{} {}", "✗".red(), e),
        },
        [] => println!("{} No memory matches {}", "✗".red(), prefix),
        _ => println!(
            "{} {} memories match {}, use a longer prefix",
            "?".yellow(),
            matches.len(),
            prefix
        ),
    }
}

fn print_help() {
    println!("  <text>           observe text");
    println!("  /recall <query>  similar memories");
    println!("  /context         hot context");
    println!("  /memories        all memories");
    println!("  /forget <id>     delete by id or unique prefix");
    println!("  /save [path]     write a JSON snapshot");
    println!("  /quit            leave (or Ctrl-C at the prompt)");
}
