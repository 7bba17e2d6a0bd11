//! Worker runs against fake collaborators, end to end into the progress
//! pipeline: the lines the worker prints must reconstruct the same state
//! the worker actually reached.

use anyhow::Result;
use std::path::Path;

use crate::discover::{DiscoveryError, MediaResource};
use crate::pool::EpisodeDescriptor;
use crate::progress::ProgressTracker;
use crate::request::JobRequest;
use crate::store::db::open_memory;
use crate::store::EpisodeStatus;

use super::{run_job, Console, EpisodeSource, MediaFetcher, ResolvedMedia, SeriesInfo, StreamResolver, WorkerJob};

struct FakeSource {
    count: i64,
}

impl EpisodeSource for FakeSource {
    fn series(&self, _link: &str) -> Result<SeriesInfo> {
        Ok(SeriesInfo {
            name: "Test Show".to_string(),
            season: 1,
        })
    }

    fn episodes(
        &self,
        _link: &str,
        from: Option<i64>,
        to: Option<i64>,
    ) -> Result<Vec<EpisodeDescriptor>> {
        let from = from.unwrap_or(1);
        let to = to.unwrap_or(self.count);
        Ok((from..=to.min(self.count))
            .map(|n| EpisodeDescriptor {
                number: n,
                title: format!("Part {n}"),
                url: format!("https://example.com/watch?ep={n}"),
            })
            .collect())
    }
}

/// Resolver with a scripted failure for one episode number.
struct FakeResolver {
    no_stream_for: Option<i64>,
}

impl StreamResolver for FakeResolver {
    fn resolve(&self, episode: &EpisodeDescriptor) -> Result<ResolvedMedia, DiscoveryError> {
        if self.no_stream_for == Some(episode.number) {
            return Err(DiscoveryError::NoStreamFound);
        }
        Ok(ResolvedMedia {
            video: MediaResource {
                url: format!("https://cdn.example/v/{}/index.m3u8", episode.number),
                headers: Default::default(),
            },
            subtitle: Some(format!("https://cdn.example/c/{}-en.vtt", episode.number)),
        })
    }
}

/// Fetcher that emits downloader-style lines instead of touching the network.
struct FakeFetcher;

impl MediaFetcher for FakeFetcher {
    fn fetch(&self, _resource: &MediaResource, output: &Path, console: &Console) -> Result<()> {
        console.line(format!("[download] Destination: {}", output.display()));
        console.line("[download]  42.0% of ~ 100.00MiB at 2.00MiB/s ETA 00:30 (frag 42/100)");
        console.line("[download] 100.0% of 100.00MiB");
        Ok(())
    }
}

fn job(dir: &Path, workers: usize) -> WorkerJob {
    WorkerJob {
        link: "https://example.com/show".to_string(),
        output_dir: dir.to_path_buf(),
        ep_from: None,
        ep_to: None,
        season: None,
        no_subtitles: false,
        workers,
    }
}

fn captured_lines(buf: &std::sync::Arc<std::sync::Mutex<Vec<u8>>>) -> Vec<String> {
    String::from_utf8(buf.lock().unwrap().clone())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn clean_run_exits_zero_and_writes_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let (console, buf) = Console::buffer();

    let code = run_job(
        &job(dir.path(), 1),
        &FakeSource { count: 2 },
        &FakeResolver { no_stream_for: None },
        &FakeFetcher,
        &console,
    )
    .unwrap();
    assert_eq!(code, 0);

    let lines = captured_lines(&buf);
    assert!(lines.contains(&"Getting Episode 1 - Part 1 from https://example.com/watch?ep=1".to_string()));
    assert!(lines.contains(&"Episode 1: Stream found".to_string()));
    assert!(lines.contains(&"Episode 2: Download completed!".to_string()));
    assert!(lines.iter().any(|l| l.contains("Download Summary:")));
    assert!(lines.iter().any(|l| l.contains("Successful: 2")));

    let meta_path = dir.path().join("Test Show").join("Test Show (Season 1).json");
    let meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(meta_path).unwrap()).unwrap();
    assert_eq!(meta["name"], "Test Show");
    assert_eq!(meta["episodes"].as_array().unwrap().len(), 2);
}

#[test]
fn failed_episode_fails_run_but_not_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let (console, buf) = Console::buffer();

    let code = run_job(
        &job(dir.path(), 2),
        &FakeSource { count: 3 },
        &FakeResolver { no_stream_for: Some(2) },
        &FakeFetcher,
        &console,
    )
    .unwrap();
    assert_eq!(code, 1);

    let lines = captured_lines(&buf);
    assert!(lines.contains(&"Episode 2: No m3u8 file found, skipping download".to_string()));
    assert!(lines.contains(&"Episode 1: Download completed!".to_string()));
    assert!(lines.contains(&"Episode 3: Download completed!".to_string()));
    assert!(lines.iter().any(|l| l.contains("Failed: 1")));
}

#[tokio::test]
async fn worker_output_reconstructs_state_through_pipeline() {
    // Sequential worker (one pool thread) so line order is deterministic.
    let dir = tempfile::tempdir().unwrap();
    let (console, buf) = Console::buffer();
    let code = run_job(
        &job(dir.path(), 1),
        &FakeSource { count: 2 },
        &FakeResolver { no_stream_for: Some(2) },
        &FakeFetcher,
        &console,
    )
    .unwrap();
    assert_eq!(code, 1);

    let store = open_memory().await.unwrap();
    let job_id = store
        .create_job(&JobRequest::new("https://example.com/show", None, None).unwrap())
        .await
        .unwrap();
    store.claim_job(job_id).await.unwrap();

    let log_dir = tempfile::tempdir().unwrap();
    let mut tracker = ProgressTracker::new(store.clone(), job_id, log_dir.path().to_path_buf(), None);
    for line in captured_lines(&buf) {
        tracker.apply_line(&line).await;
    }
    let summary = tracker.finish(Some(code), false).await.unwrap();
    assert!(!summary.success);

    let ep1 = store.get_episode(job_id, 1).await.unwrap().unwrap();
    assert_eq!(ep1.status, EpisodeStatus::Complete);
    let ep2 = store.get_episode(job_id, 2).await.unwrap().unwrap();
    assert_eq!(ep2.status, EpisodeStatus::Failed);
    assert_eq!(ep2.error_message.as_deref(), Some("No stream found"));
    // The structured transfer fields scraped from the downloader lines.
    assert_eq!(ep1.stage_data.unwrap().percent, Some(100.0));
}
