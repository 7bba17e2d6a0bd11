//! The worker run: list episodes, fan out tasks, summarize.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::discover::{DiscoveryError, MediaResource};
use crate::pool::{run_episode_pool, EpisodeDescriptor, PoolResult, TaskOutcome};

use super::console::Console;
use super::fetch_tool::MediaFetcher;
use super::resolve::StreamResolver;
use super::source::{sanitize_title, EpisodeSource};

/// Parameters of one worker invocation (one job).
#[derive(Debug, Clone)]
pub struct WorkerJob {
    pub link: String,
    pub output_dir: PathBuf,
    pub ep_from: Option<i64>,
    pub ep_to: Option<i64>,
    pub season: Option<i64>,
    pub no_subtitles: bool,
    pub workers: usize,
}

/// Run one job end to end. Returns the process exit code: 0 only when every
/// episode completed.
///
/// The printed lines are load-bearing: the scheduler's progress pipeline
/// reconstructs all job/episode state from them.
pub fn run_job<S, R, F>(job: &WorkerJob, source: &S, resolver: &R, fetcher: &F, console: &Console) -> Result<i32>
where
    S: EpisodeSource,
    R: StreamResolver,
    F: MediaFetcher,
{
    let mut series = source.series(&job.link).context("resolve series metadata")?;
    if let Some(season) = job.season {
        series.season = season;
    }
    series.name = sanitize_title(&series.name);

    let episodes = source
        .episodes(&job.link, job.ep_from, job.ep_to)
        .context("list episodes")?;
    if episodes.is_empty() {
        anyhow::bail!("no episodes found for {}", job.link);
    }

    let folder = job.output_dir.join(&series.name);
    std::fs::create_dir_all(&folder)
        .with_context(|| format!("create output folder {}", folder.display()))?;

    console.line(format!(
        "Starting parallel processing of {} episodes...",
        episodes.len()
    ));
    console.line(format!("Max concurrent operations: {}", job.workers));

    let result = run_episode_pool(episodes, job.workers, |episode| {
        run_one_episode(job, &series.name, series.season, &folder, episode, resolver, fetcher, console)
    });

    write_metadata(&folder, &series.name, series.season, job, &result)?;
    print_summary(console, &result);

    Ok(if result.failed() == 0 { 0 } else { 1 })
}

#[allow(clippy::too_many_arguments)]
fn run_one_episode<R, F>(
    job: &WorkerJob,
    series_name: &str,
    season: i64,
    folder: &std::path::Path,
    episode: &EpisodeDescriptor,
    resolver: &R,
    fetcher: &F,
    console: &Console,
) -> Result<()>
where
    R: StreamResolver,
    F: MediaFetcher,
{
    let number = episode.number;
    console.line(format!(
        "Getting Episode {number} - {} from {}",
        episode.title, episode.url
    ));

    let resolved = match resolver.resolve(episode) {
        Ok(r) => r,
        Err(DiscoveryError::NoStreamFound) => {
            console.line(format!(
                "Episode {number}: No m3u8 file found, skipping download"
            ));
            anyhow::bail!("No stream found");
        }
        Err(e) => {
            return Err(e).context("stream resolution");
        }
    };
    console.line(format!("Episode {number}: Stream found"));

    let stem = format!(
        "{series_name} - s{season:02}e{number:02} - {}",
        sanitize_title(&episode.title)
    );

    console.line(format!("Episode {number}: Starting download..."));
    fetcher
        .fetch(&resolved.video, &folder.join(format!("{stem}.mp4")), console)
        .context("video fetch")?;

    if let Some(vtt) = resolved.subtitle.as_deref().filter(|_| !job.no_subtitles) {
        console.line(format!("Episode {number}: Downloading subtitles..."));
        let subtitle = MediaResource {
            url: vtt.to_string(),
            headers: resolved.video.headers.clone(),
        };
        if let Err(e) = fetcher.fetch(&subtitle, &folder.join(format!("{stem}.vtt")), console) {
            // Captions are best-effort; the episode still counts.
            tracing::warn!(episode = number, "subtitle fetch failed: {e:#}");
        }
    } else if !job.no_subtitles {
        console.line(format!("Episode {number}: No VTT stream found"));
    }

    console.line(format!("Episode {number}: Download completed!"));
    Ok(())
}

/// Season metadata JSON next to the output files.
fn write_metadata(
    folder: &std::path::Path,
    name: &str,
    season: i64,
    job: &WorkerJob,
    result: &PoolResult,
) -> Result<()> {
    let episodes: Vec<serde_json::Value> = result
        .outcomes
        .iter()
        .map(|(ep, outcome)| {
            serde_json::json!({
                "number": ep.number,
                "title": ep.title,
                "url": ep.url,
                "status": match outcome {
                    TaskOutcome::Completed => "completed",
                    TaskOutcome::Failed { .. } => "failed",
                },
                "error": match outcome {
                    TaskOutcome::Completed => serde_json::Value::Null,
                    TaskOutcome::Failed { error } => serde_json::Value::String(error.clone()),
                },
            })
        })
        .collect();

    let doc = serde_json::json!({
        "name": name,
        "url": job.link,
        "season": season,
        "episodes": episodes,
    });

    let path = folder.join(format!("{name} (Season {season}).json"));
    std::fs::write(&path, serde_json::to_string_pretty(&doc)?)
        .with_context(|| format!("write metadata {}", path.display()))?;
    Ok(())
}

fn print_summary(console: &Console, result: &PoolResult) {
    console.line("");
    console.line("=".repeat(60));
    console.line("Download Summary:");
    console.line(format!("  Total episodes: {}", result.outcomes.len()));
    console.line(format!("  Successful: {}", result.completed()));
    if result.failed() > 0 {
        console.line(format!("  Failed: {}", result.failed()));
    }
    console.line("=".repeat(60));
}
