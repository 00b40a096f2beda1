// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metasync keeps local module metadata reconciled with the validation server.
//
// Entry point. Parses arguments, initialises logging, loads configuration and
// definitions, and runs one workflow per matching definition concurrently.

mod prompt;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use metasync_core::config::{Scope, SyncOptions};
use metasync_core::error::Result;
use metasync_core::human_errors::humanize_error;
use metasync_core::registry::SearchCriteria;
use metasync_engine::{AutoApprove, DecisionPolicy, DenyAll};

use prompt::ConsolePolicy;
use services::setup;

#[derive(Debug, Parser)]
#[command(name = "metasync", version)]
#[command(about = "Reconcile local OE and dependency metadata with the validation server")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (default: <data dir>/metasync/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Definitions file: JSON array of module/vendor/OE definitions
    #[arg(short, long, global = true, default_value = "definitions.json")]
    definitions: PathBuf,

    #[command(flatten)]
    filter: Filter,

    /// Register and update without asking
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Delete the records of this scope from the server (repeatable)
    #[arg(long, global = true, value_parser = parse_scope)]
    delete: Vec<Scope>,

    /// Force an update of the records of this scope (repeatable)
    #[arg(long, global = true, value_parser = parse_scope)]
    update: Vec<Scope>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
enum Command {
    /// Reconcile OEs and their dependencies with the server
    Sync,
    /// Only resolve requests still awaiting server approval
    Resolve,
    /// Search the server and report, without any change
    Show,
    /// Print what would be registered, without contacting the server
    Dump,
}

/// Which definitions to work on. Absent filters match everything.
#[derive(Debug, Clone, Default, clap::Args)]
struct Filter {
    #[arg(long, global = true)]
    module: Option<String>,
    #[arg(long, global = true)]
    module_version: Option<String>,
    #[arg(long, global = true)]
    vendor: Option<String>,
    #[arg(long, global = true)]
    env: Option<String>,
    #[arg(long, global = true)]
    processor: Option<String>,
    /// Match filters as substrings
    #[arg(long, global = true)]
    fuzzy: bool,
}

impl From<Filter> for SearchCriteria {
    fn from(f: Filter) -> Self {
        Self {
            module_name: f.module,
            module_version: f.module_version,
            vendor_name: f.vendor,
            env_name: f.env,
            processor: f.processor,
            fuzzy: f.fuzzy,
        }
    }
}

fn parse_scope(s: &str) -> std::result::Result<Scope, String> {
    serde_json::from_value(serde_json::Value::from(s.to_ascii_lowercase()))
        .map_err(|_| format!("unknown scope '{s}' (expected oe, vendor, module or person)"))
}

/// Outcome counts of one run.
#[derive(Debug, Default)]
struct Summary {
    done: usize,
    skipped: usize,
    failed: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(summary) if summary.failed == 0 => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            let human = humanize_error(&e);
            error!(error = %e, "{}", human.message);
            eprintln!("error: {}\n  {}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<Summary> {
    let mut config = setup::load_config(cli.config.as_deref())?;
    apply_overrides(&mut config.options, &cli);

    let registry = setup::load_definitions(&cli.definitions)?;
    let defs = registry.find_all(&cli.filter.clone().into());
    if defs.is_empty() {
        warn!("no definition matches the given filters");
        return Ok(Summary::default());
    }

    let policy: Arc<dyn DecisionPolicy> = if cli.command == Command::Show {
        Arc::new(DenyAll)
    } else if config.options.non_interactive {
        Arc::new(AutoApprove)
    } else {
        Arc::new(ConsolePolicy::default())
    };
    let engine = Arc::new(setup::build_reconciler(&config, policy)?);
    info!(command = ?cli.command, definitions = defs.len(), "metasync starting");

    let mut tasks = JoinSet::new();
    for def in defs {
        let engine = Arc::clone(&engine);
        let command = cli.command;
        tasks.spawn(async move {
            let outcome = match command {
                Command::Resolve => engine.handle_open_requests(&def).await,
                Command::Sync | Command::Show | Command::Dump => engine.handle_oe(&def).await,
            };
            (def.label(), outcome)
        });
    }

    let mut summary = Summary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((label, Ok(()))) => {
                info!(definition = %label, "done");
                summary.done += 1;
            }
            Ok((label, Err(e))) if e.is_soft() => {
                info!(definition = %label, reason = %e, "skipped");
                summary.skipped += 1;
            }
            Ok((label, Err(e))) => {
                let human = humanize_error(&e);
                error!(
                    definition = %label,
                    error = %e,
                    suggestion = %human.suggestion,
                    "{}",
                    human.message
                );
                summary.failed += 1;
            }
            Err(e) => {
                error!(error = %e, "workflow task aborted");
                summary.failed += 1;
            }
        }
    }

    info!(
        done = summary.done,
        skipped = summary.skipped,
        failed = summary.failed,
        "metasync finished"
    );
    Ok(summary)
}

fn apply_overrides(options: &mut SyncOptions, cli: &Cli) {
    match cli.command {
        Command::Show => options.show_db_entries = true,
        Command::Dump => options.dry_run = true,
        Command::Sync | Command::Resolve => {}
    }
    if cli.yes {
        options.non_interactive = true;
    }
    options.delete.extend(cli.delete.iter().copied());
    options.update.extend(cli.update.iter().copied());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_options() {
        let cli = Cli::try_parse_from([
            "metasync", "show", "--yes", "--delete", "OE", "--env", "Linux", "--fuzzy",
        ])
        .expect("parse");
        let mut options = SyncOptions::default();
        apply_overrides(&mut options, &cli);
        assert!(options.show_db_entries);
        assert!(options.non_interactive);
        assert!(options.deletes(Scope::Oe));
        assert!(!options.dry_run);

        let criteria = SearchCriteria::from(cli.filter);
        assert_eq!(criteria.env_name.as_deref(), Some("Linux"));
        assert!(criteria.fuzzy);
    }

    #[test]
    fn unknown_scope_is_rejected() {
        assert!(Cli::try_parse_from(["metasync", "sync", "--update", "printer"]).is_err());
    }
}
