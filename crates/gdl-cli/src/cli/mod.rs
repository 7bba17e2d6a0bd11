//! CLI for the GDL episode download orchestrator.

mod commands;
pub mod control_socket;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gdl_core::config;
use gdl_core::store::JobStore;

use commands::{run_add, run_cancel, run_scheduler, run_show, run_status, run_watch, run_worker};

/// Top-level CLI for the GDL download orchestrator.
#[derive(Debug, Parser)]
#[command(name = "gdl")]
#[command(about = "GDL: episode download job orchestrator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Enqueue a new download job.
    Add {
        /// Series or episode page URL.
        url: String,

        /// Named download profile to pass to the worker.
        #[arg(long)]
        profile: Option<String>,

        /// Extra worker arguments (whitelisted flags only).
        #[arg(long, allow_hyphen_values = true)]
        extra_args: Option<String>,
    },

    /// Run the scheduler loop: claim queued jobs and supervise workers.
    Run,

    /// Show status of all jobs.
    Status,

    /// Show one job with its episodes.
    Show {
        /// Job identifier.
        id: i64,
    },

    /// Cancel a queued or running job by its ID.
    Cancel {
        /// Job identifier.
        id: i64,
    },

    /// Follow one job live: status/episode deltas plus new log lines.
    Watch {
        /// Job identifier.
        id: i64,
    },

    /// Worker process entry point (spawned by the scheduler per job).
    Worker(commands::WorkerArgs),
}

impl CliCommand {
    /// Parse args, dispatch, and return the process exit code.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        // The worker subcommand must not touch the store: it is a plain
        // output-producing process observed by its parent.
        let command = match cli.command {
            CliCommand::Worker(args) => return run_worker(&cfg, args),
            other => other,
        };

        let store = JobStore::open_default().await?;
        match command {
            CliCommand::Add {
                url,
                profile,
                extra_args,
            } => run_add(&store, &url, profile.as_deref(), extra_args.as_deref()).await?,
            CliCommand::Run => run_scheduler(store, cfg).await?,
            CliCommand::Status => run_status(&store).await?,
            CliCommand::Show { id } => run_show(&store, id).await?,
            CliCommand::Cancel { id } => run_cancel(&store, id).await?,
            CliCommand::Watch { id } => run_watch(&store, id).await?,
            CliCommand::Worker(_) => unreachable!("handled above"),
        }

        Ok(0)
    }
}

#[cfg(test)]
mod tests;
