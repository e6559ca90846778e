//! Driftwatch CLI - structural drift detection for REST and GraphQL APIs
//!
//! Exit status of `run`: 0 when nothing blocks (or the run was skipped),
//! 1 when drift trips the gate, 2 when the run failed.

use anyhow::Context;
use clap::Parser;
use driftwatch_core::config::DEFAULT_CONFIG_FILE;
use driftwatch_core::{
    Collaborators, Driftwatch, DriftwatchConfig, FetchRequest, RunOutcome, EXIT_FAILED, EXIT_OK,
};
use driftwatch_schema::canonicalize::{short_hex, signature_fingerprint, to_hex};
use driftwatch_schema::BaselineStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "driftwatch", version)]
#[command(about = "Driftwatch - structural drift detection for REST and GraphQL APIs")]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Execute one drift run
    Run {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Check configuration validity
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Show the accepted baseline with signature fingerprints
    Baseline {
        /// Configuration file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct BaselineEntry {
    target: String,
    fingerprint: String,
    entries: usize,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::Check { config } => check(&config).map(|()| EXIT_OK),
        Commands::Baseline { config, json } => baseline(&config, json).map(|()| EXIT_OK),
    };

    let code = result.unwrap_or_else(|e| {
        error!("{:#}", e);
        EXIT_FAILED
    });
    std::process::exit(code);
}

async fn run(path: &Path) -> anyhow::Result<i32> {
    let config = DriftwatchConfig::load(path)
        .with_context(|| format!("loading {}", path.display()))?;
    let collaborators = Collaborators::from_config(&config).context("setting up collaborators")?;
    let driftwatch = Driftwatch::new(config, collaborators);

    match driftwatch.run().await {
        Ok(RunOutcome::Completed(report)) if report.all_failed() => {
            error!("All {} targets failed to fetch", report.total_targets);
            Ok(EXIT_FAILED)
        }
        Ok(outcome) => {
            let code = outcome.exit_code();
            info!("Run finished with exit status {}", code);
            Ok(code)
        }
        Err(e) => {
            driftwatch.notify_failure(&e).await;
            Err(e).context("drift run failed")
        }
    }
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = DriftwatchConfig::load(path)
        .with_context(|| format!("loading {}", path.display()))?;

    println!("Configuration OK: {} targets", config.targets.len());
    println!("  baseline: {} ({:?})", config.baseline.path.display(), config.baseline.strategy);
    if let Some(window) = &config.permission.window {
        println!("  window:   {} UTC", window);
    }
    for target in &config.targets {
        let (protocol, request) = FetchRequest::for_target(target);
        println!(
            "  {:<16} {:<7} {:<6} {}",
            target.id,
            format!("{:?}", protocol),
            request.method,
            target.url
        );
    }
    Ok(())
}

fn baseline(path: &Path, json: bool) -> anyhow::Result<()> {
    let config = DriftwatchConfig::load(path)
        .with_context(|| format!("loading {}", path.display()))?;
    let store = BaselineStore::new(config.baseline);
    let baseline = store
        .load()
        .with_context(|| format!("reading baseline {}", store.path().display()))?;

    if json {
        let entries: Vec<BaselineEntry> = baseline
            .iter()
            .map(|(target, signature)| -> anyhow::Result<BaselineEntry> {
                Ok(BaselineEntry {
                    target: target.clone(),
                    fingerprint: to_hex(&signature_fingerprint(signature)?),
                    entries: signature.len(),
                })
            })
            .collect::<anyhow::Result<_>>()?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if baseline.is_empty() {
        println!("No baseline at {}", store.path().display());
        return Ok(());
    }
    for (target, signature) in baseline.iter() {
        println!(
            "{}  {:<16} {} entries",
            short_hex(&signature_fingerprint(signature)?),
            target,
            signature.len()
        );
    }
    Ok(())
}
