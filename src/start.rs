//! Command-line runner for the semantic memory engine.
//!
//! Configuration comes from the environment (see [`MemoryConfig::from_env`]).
//! Logs go to stderr so command output on stdout stays clean.

use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, bail};

use crate::memory::core::config::MemoryConfig;
use crate::memory::core::document::SearchResult;
use crate::memory::engine::core::{IndexOptions, MemorySearch, MemoryStats, SearchOptions};

/// Usage text printed by `help` and on argument errors.
pub const USAGE: &str = "\
usage: semantic-memory <command> [options]

commands:
  index <path> [--source S]            index a file or directory
  add <text> [--source S]              store one memory
  search <query> [--limit N] [--threshold T] [--hybrid] [--source S]...
  stats                                show document count and provider
  clear <source>                       delete every document with this source
  help                                 show this message";

/// Characters of content shown per search hit.
const PREVIEW_CHARS: usize = 200;

/// A parsed command line.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Index a file or directory.
    Index {
        /// Path to index.
        path: String,
        /// Source label override.
        source: Option<String>,
    },
    /// Store one memory.
    Add {
        /// Memory text.
        text: String,
        /// Source label.
        source: Option<String>,
    },
    /// Search stored documents.
    Search {
        /// Query text.
        query: String,
        /// Maximum number of results.
        limit: Option<usize>,
        /// Minimum similarity.
        threshold: Option<f32>,
        /// Merge full-text hits.
        hybrid: bool,
        /// Allowed sources; empty means all.
        sources: Vec<String>,
    },
    /// Show statistics.
    Stats,
    /// Delete a source.
    Clear {
        /// Source label to delete.
        source: String,
    },
    /// Print usage.
    Help,
}

/// Run the CLI with the process arguments.
///
/// # Returns
/// `ExitCode::SUCCESS` on success, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            tracing::error!("{e}");
            let _ = writeln!(std::io::stderr().lock(), "{USAGE}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    match rt.block_on(execute(command)) {
        Ok(output) => {
            if writeln!(std::io::stdout().lock(), "{output}").is_err() {
                return ExitCode::from(1);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// Parse command-line arguments (without the program name).
///
/// # Errors
/// Returns an error for unknown commands or flags, missing values, or values
/// that do not parse.
pub fn parse_args<I>(args: I) -> anyhow::Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(name) = args.next() else {
        bail!("missing command");
    };

    let mut positional = Vec::new();
    let mut sources = Vec::new();
    let mut limit = None;
    let mut threshold = None;
    let mut hybrid = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--source" => sources.push(flag_value(&mut args, "--source")?),
            "--limit" => {
                let value = flag_value(&mut args, "--limit")?;
                limit = Some(value.parse().with_context(|| format!("invalid --limit {value:?}"))?);
            }
            "--threshold" => {
                let value = flag_value(&mut args, "--threshold")?;
                threshold = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid --threshold {value:?}"))?,
                );
            }
            "--hybrid" => hybrid = true,
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            _ => positional.push(arg),
        }
    }

    let search_only = [
        ("--limit", limit.is_some()),
        ("--threshold", threshold.is_some()),
        ("--hybrid", hybrid),
    ];
    match name.as_str() {
        "search" => {}
        "index" | "add" => reject_flags(&name, &search_only)?,
        _ => {
            reject_flags(&name, &search_only)?;
            reject_flags(&name, &[("--source", !sources.is_empty())])?;
        }
    }

    let command = match name.as_str() {
        "index" => Command::Index {
            path: single_positional(positional, "path")?,
            source: last_source(sources),
        },
        "add" => Command::Add {
            text: single_positional(positional, "text")?,
            source: last_source(sources),
        },
        "search" => Command::Search {
            query: single_positional(positional, "query")?,
            limit,
            threshold,
            hybrid,
            sources,
        },
        "clear" => Command::Clear {
            source: single_positional(positional, "source")?,
        },
        "stats" => {
            no_positional(&positional, &name)?;
            Command::Stats
        }
        "help" | "--help" | "-h" => {
            no_positional(&positional, &name)?;
            Command::Help
        }
        other => bail!("unknown command {other}"),
    };

    Ok(command)
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("{flag} requires a value"))
}

fn reject_flags(command: &str, flags: &[(&str, bool)]) -> anyhow::Result<()> {
    if let Some((flag, _)) = flags.iter().find(|(_, used)| *used) {
        bail!("{flag} does not apply to {command}");
    }
    Ok(())
}

fn no_positional(positional: &[String], command: &str) -> anyhow::Result<()> {
    if let Some(extra) = positional.first() {
        bail!("unexpected argument {extra:?} for {command}");
    }
    Ok(())
}

fn single_positional(mut positional: Vec<String>, what: &str) -> anyhow::Result<String> {
    match positional.len() {
        0 => bail!("missing {what}"),
        1 => Ok(positional.remove(0)),
        _ => bail!("expected a single {what}, got {}", positional.len()),
    }
}

fn last_source(mut sources: Vec<String>) -> Option<String> {
    sources.pop()
}

/// Execute a command against an engine built from the environment and
/// return the text to print.
///
/// # Errors
/// Returns an error if the engine cannot be opened or the command fails.
pub async fn execute(command: Command) -> anyhow::Result<String> {
    if command == Command::Help {
        return Ok(USAGE.to_string());
    }

    let config = MemoryConfig::from_env();
    let engine = MemorySearch::from_config(config)
        .await
        .context("failed to open semantic memory")?;

    let result = execute_with(&engine, command).await;
    engine.close().await.context("failed to close store")?;
    result
}

/// Execute a command against an existing engine.
///
/// # Errors
/// Returns an error if the command fails.
pub async fn execute_with(engine: &MemorySearch, command: Command) -> anyhow::Result<String> {
    let output = match command {
        Command::Index { path, source } => {
            let chunks = engine
                .index_path(
                    &path,
                    IndexOptions {
                        source,
                        ..IndexOptions::default()
                    },
                )
                .await
                .with_context(|| format!("failed to index {path}"))?;
            format!("indexed {chunks} chunk(s) from {path}")
        }
        Command::Add { text, source } => {
            let id = engine.add_memory(&text, source.as_deref()).await?;
            format!("added memory {id}")
        }
        Command::Search {
            query,
            limit,
            threshold,
            hybrid,
            sources,
        } => {
            let options = SearchOptions {
                limit,
                threshold,
                sources: (!sources.is_empty()).then_some(sources),
                hybrid: Some(hybrid),
            };
            let results = engine.search(&query, options).await?;
            format_results(&results)
        }
        Command::Stats => format_stats(&engine.get_stats().await?),
        Command::Clear { source } => {
            let removed = engine.clear_source(&source).await?;
            format!("removed {removed} document(s) from {source}")
        }
        Command::Help => USAGE.to_string(),
    };
    Ok(output)
}

fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "no results".to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(rank, hit)| {
            let preview: String = hit
                .content
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .chars()
                .take(PREVIEW_CHARS)
                .collect();
            format!(
                "{}. [{:.3}] {}\n   {preview}",
                rank + 1,
                hit.score,
                hit.source.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_stats(stats: &MemoryStats) -> String {
    format!(
        "documents: {}\nprovider: {} ({} dimensions)",
        stats.count, stats.provider, stats.dimensions
    )
}
