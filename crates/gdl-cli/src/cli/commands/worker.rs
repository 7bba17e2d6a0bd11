//! `gdl worker` – the per-job worker process the scheduler spawns.
//!
//! This process never touches the store: everything the orchestrator needs
//! is inferred from the lines printed to stdout. The built-in wiring covers
//! direct links (the fetch tool does its own extraction); site-specific
//! episode sources and discovery sessions plug in through `gdl_core::worker`
//! when embedding the library.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use gdl_core::config::GdlConfig;
use gdl_core::worker::{run_job, Console, DirectResolver, DirectSource, WorkerJob, YtDlpFetcher};

#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Job link to process.
    #[arg(long)]
    pub link: String,

    /// Directory downloads are written to.
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Concurrent episode tasks.
    #[arg(long, default_value = "3")]
    pub workers: usize,

    /// Named download profile (informational for the direct path).
    #[arg(long)]
    pub profile: Option<String>,

    /// First episode (inclusive).
    #[arg(long)]
    pub ep_from: Option<i64>,

    /// Last episode (inclusive).
    #[arg(long)]
    pub ep_to: Option<i64>,

    /// Season number for output naming.
    #[arg(long)]
    pub season: Option<i64>,

    /// Preferred download type (sub/dub) where the source distinguishes.
    #[arg(long)]
    pub download_type: Option<String>,

    /// Preferred stream server where the source distinguishes.
    #[arg(long)]
    pub server: Option<String>,

    /// Skip caption discovery and download.
    #[arg(long)]
    pub no_subtitles: bool,

    /// Preferred quality label, passed through to the fetch tool setup.
    #[arg(long)]
    pub quality: Option<String>,

    /// Caption language override.
    #[arg(long)]
    pub sub_lang: Option<String>,

    /// Audio language override.
    #[arg(long)]
    pub dub_lang: Option<String>,

    /// Container format override.
    #[arg(long)]
    pub format: Option<String>,
}

pub fn run_worker(cfg: &GdlConfig, args: WorkerArgs) -> Result<i32> {
    if let Some(profile) = &args.profile {
        tracing::info!(profile, "worker profile selected");
    }
    // Source-selection options only matter to site-specific episode sources;
    // the direct path records them for the log.
    tracing::debug!(
        download_type = ?args.download_type,
        server = ?args.server,
        quality = ?args.quality,
        sub_lang = ?args.sub_lang,
        dub_lang = ?args.dub_lang,
        format = ?args.format,
        "worker options",
    );

    let job = WorkerJob {
        link: args.link,
        output_dir: args.output_dir,
        ep_from: args.ep_from,
        ep_to: args.ep_to,
        season: args.season,
        no_subtitles: args.no_subtitles || cfg.subtitles().disabled,
        workers: args.workers.max(1),
    };

    run_job(
        &job,
        &DirectSource,
        &DirectResolver,
        &YtDlpFetcher::default(),
        &Console::stdout(),
    )
}
