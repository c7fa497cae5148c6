//! Contributor pipeline CLI
//!
//! # Usage
//!
//! ```bash
//! # Run until an attempt succeeds, retrying failures on the configured interval
//! contrib-pipeline run --user Algolia
//!
//! # Single attempt from the checkpoint journal
//! contrib-pipeline run --resume --once
//!
//! # Print the output CSV as JSON
//! contrib-pipeline results
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use contrib_pipeline::config::Validatable;
use contrib_pipeline::{
    ConfigHandle, PipelineConfig, PipelineService, ResultLog, RunState, StartStage,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contrib-pipeline")]
#[command(author, version, about = "Count new contributors per repository of a GitHub user", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a run and keep retrying until it succeeds
    Run {
        /// Replay the checkpoint journal instead of fetching repositories
        #[arg(long)]
        resume: bool,

        /// Stop after the first attempt instead of waiting for retries
        #[arg(long)]
        once: bool,

        /// GitHub user whose repositories are counted
        #[arg(short, long)]
        user: Option<String>,

        /// Seconds before a failed attempt is retried
        #[arg(long)]
        retry_interval: Option<u64>,

        /// Directory holding the journal and the output CSV
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Print the results written so far
    Results,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            resume,
            once,
            user,
            retry_interval,
            data_dir,
        } => {
            if let Some(user) = user {
                config.github.user_name = user;
            }
            if let Some(secs) = retry_interval {
                config.retry_interval_secs = secs;
            }
            if let Some(dir) = data_dir {
                config.storage.data_dir = dir;
            }
            config.validate()?;

            let start = if resume {
                StartStage::Resume
            } else {
                StartStage::First
            };
            run(config, start, once).await
        }
        Commands::Results => {
            let results = ResultLog::new(config.storage.output_path()).read().await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
    }
}

/// Defaults, then the YAML file if given, then the environment
fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_yaml(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

async fn run(config: PipelineConfig, start: StartStage, once: bool) -> anyhow::Result<()> {
    info!(
        "contrib-pipeline starting for {} (data in {})",
        config.github.user_name,
        config.storage.data_dir.display()
    );

    let service = PipelineService::github(ConfigHandle::new(config))?;
    let mut states = service.subscribe();
    service.start_run(start)?;

    loop {
        let settled = tokio::select! {
            state = states.wait_for(|s| s.is_terminal()) => state?.clone(),
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, exiting");
                return Ok(());
            }
        };

        match &settled {
            RunState::Success { started_at, ended_at } => {
                let written = service.results().await?.records().len();
                info!(
                    "Run succeeded in {}s, {} records in output",
                    (*ended_at - *started_at).num_seconds(),
                    written
                );
                return Ok(());
            }
            RunState::Failure { stage, error, .. } => {
                if once {
                    bail!("attempt failed at stage {}: {}", stage, error);
                }
                match service.pending_retry() {
                    Some(retry) => info!("Waiting for retry at {}", retry.due_at),
                    None => warn!("No retry pending"),
                }
            }
            _ => {}
        }

        // wait for the retry to replace this failure
        tokio::select! {
            state = states.wait_for(|s| *s != settled) => { state?; }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, exiting");
                return Ok(());
            }
        }
    }
}
