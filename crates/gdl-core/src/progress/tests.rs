//! Scenario tests: full output streams through the tracker.

use crate::progress::{map_download_percent, ProgressTracker};
use crate::request::JobRequest;
use crate::store::db::open_memory;
use crate::store::{EpisodeStatus, JobStage, JobStatus, JobStore};

async fn running_job(store: &JobStore) -> i64 {
    let id = store
        .create_job(&JobRequest::new("https://example.com/watch/1", None, None).unwrap())
        .await
        .unwrap();
    assert!(store.claim_job(id).await.unwrap());
    id
}

fn tracker(store: &JobStore, job_id: i64, dir: &tempfile::TempDir) -> ProgressTracker {
    ProgressTracker::new(store.clone(), job_id, dir.path().to_path_buf(), None)
}

#[tokio::test]
async fn happy_path_single_episode() {
    let store = open_memory().await.unwrap();
    let job = running_job(&store).await;
    let dir = tempfile::tempdir().unwrap();
    let mut t = tracker(&store, job, &dir);

    for line in [
        "Getting Episode 1 - Pilot from https://example.com/watch/1?ep=1",
        "Episode 1: Stream found",
        "Episode 1: Starting download...",
        "[download] Destination: /downloads/Show - s01e01 - Pilot.mp4",
        "[download]  45.2% of ~ 123.45MiB at 1.23MiB/s ETA 00:45 (frag 12/100)",
        "[download] 100.0% of 123.45MiB",
        "[Merger] Merging formats into \"/downloads/Show - s01e01 - Pilot.mp4\"",
        "Episode 1: Download completed!",
    ] {
        t.apply_line(line).await;
    }

    let ep = store.get_episode(job, 1).await.unwrap().unwrap();
    assert_eq!(ep.status, EpisodeStatus::Complete);
    assert_eq!(ep.progress_percent, 100);
    let data = ep.stage_data.unwrap();
    assert_eq!(data.percent, Some(100.0));

    let summary = t.finish(Some(0), false).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.forced_failures, 0);

    let job = store.get_job(job).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Success);
    assert_eq!(job.stage, JobStage::Done);
    assert_eq!(job.progress_percent, 100);
}

#[tokio::test]
async fn implicit_completion_and_reconciliation() {
    // "Episode 1 start" -> "45%" -> "Episode 2 start" -> exit 0.
    // Episode 1 completes implicitly; episode 2 is forced failed; the job
    // fails with affected-count 1.
    let store = open_memory().await.unwrap();
    let job = running_job(&store).await;
    let dir = tempfile::tempdir().unwrap();
    let mut t = tracker(&store, job, &dir);

    t.apply_line("Getting Episode 1 - Pilot from https://example.com/1").await;
    t.apply_line("Episode 1: Starting download...").await;
    t.apply_line("[download]  45.0% of ~ 100.00MiB at 1.00MiB/s ETA 01:00").await;
    t.apply_line("Getting Episode 2 - Second from https://example.com/2").await;

    let summary = t.finish(Some(0), false).await.unwrap();
    assert!(!summary.success);
    assert_eq!(summary.forced_failures, 1);

    let ep1 = store.get_episode(job, 1).await.unwrap().unwrap();
    let ep2 = store.get_episode(job, 2).await.unwrap().unwrap();
    assert_eq!(ep1.status, EpisodeStatus::Complete);
    assert_eq!(ep2.status, EpisodeStatus::Failed);
    assert_eq!(
        ep2.error_message.as_deref(),
        Some("did not complete before process exit")
    );

    let job = store.get_job(job).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("1 episode(s) did not complete")
    );
}

#[tokio::test]
async fn no_stream_marks_episode_failed() {
    let store = open_memory().await.unwrap();
    let job = running_job(&store).await;
    let dir = tempfile::tempdir().unwrap();
    let mut t = tracker(&store, job, &dir);

    t.apply_line("Getting Episode 1 - Pilot from https://example.com/1").await;
    t.apply_line("Episode 1: No m3u8 file found, skipping download").await;

    let ep = store.get_episode(job, 1).await.unwrap().unwrap();
    assert_eq!(ep.status, EpisodeStatus::Failed);
    assert_eq!(ep.error_message.as_deref(), Some("No stream found"));

    // A failed episode counts as terminal, not as a forced failure; the run
    // itself still fails because the worker exits non-zero in this case.
    let summary = t.finish(Some(1), false).await.unwrap();
    assert!(!summary.success);
    assert_eq!(summary.forced_failures, 0);
}

#[tokio::test]
async fn progress_lines_attributed_to_active_episode_only() {
    let store = open_memory().await.unwrap();
    let job = running_job(&store).await;
    let dir = tempfile::tempdir().unwrap();
    let mut t = tracker(&store, job, &dir);

    // Episode 1 announced but episode 2 is the one downloading; interleaved
    // progress must land on 2, never on the merely-announced 1.
    t.apply_line("Getting Episode 1 - A from https://example.com/1").await;
    t.apply_line("Getting Episode 2 - B from https://example.com/2").await;
    t.apply_line("Episode 2: Starting download...").await;
    t.apply_line("[download]  50.0% of ~ 10.00MiB at 1.00MiB/s ETA 00:05").await;

    let ep2 = store.get_episode(job, 2).await.unwrap().unwrap();
    assert_eq!(ep2.status, EpisodeStatus::DownloadingVideo);
    assert_eq!(ep2.progress_percent, map_download_percent(50.0));

    // Episode 1 was implicitly completed by episode 2's announcement and
    // must not have picked up transfer data.
    let ep1 = store.get_episode(job, 1).await.unwrap().unwrap();
    assert_eq!(ep1.status, EpisodeStatus::Complete);
    assert!(ep1.stage_data.is_none());
}

#[tokio::test]
async fn orphan_progress_lines_are_ignored() {
    let store = open_memory().await.unwrap();
    let job = running_job(&store).await;
    let dir = tempfile::tempdir().unwrap();
    let mut t = tracker(&store, job, &dir);

    // No episode announced yet: generic downloader output must not create
    // rows or crash the pipeline.
    t.apply_line("[download]  10.0% of ~ 5.00MiB at 1.00MiB/s ETA 00:05").await;
    t.apply_line("[download] Destination: /downloads/video.mp4").await;
    t.apply_line("garbage \u{1b}[31mwith colors\u{1b}[0m").await;

    assert!(store.list_episodes(job).await.unwrap().is_empty());
}

#[tokio::test]
async fn destination_token_reattributes_download() {
    let store = open_memory().await.unwrap();
    let job = running_job(&store).await;
    let dir = tempfile::tempdir().unwrap();
    let mut t = tracker(&store, job, &dir);

    t.apply_line("Getting Episode 5 - E from https://example.com/5").await;
    t.apply_line("[download] Destination: /downloads/Show - s01e05 - E.mp4").await;
    t.apply_line("[download]  20.0% of ~ 10.00MiB at 1.00MiB/s ETA 00:10").await;

    let ep = store.get_episode(job, 5).await.unwrap().unwrap();
    assert_eq!(ep.status, EpisodeStatus::DownloadingVideo);
    assert_eq!(ep.progress_percent, map_download_percent(20.0));
}

#[tokio::test]
async fn subtitle_flow_and_skip() {
    let store = open_memory().await.unwrap();
    let job = running_job(&store).await;
    let dir = tempfile::tempdir().unwrap();
    let mut t = tracker(&store, job, &dir);

    t.apply_line("Getting Episode 1 - A from https://example.com/1").await;
    t.apply_line("Episode 1: Starting download...").await;
    t.apply_line("Episode 1: Downloading subtitles...").await;
    let ep = store.get_episode(job, 1).await.unwrap().unwrap();
    assert_eq!(ep.status, EpisodeStatus::DownloadingSubtitles);
    t.apply_line("Episode 1: Download completed!").await;

    t.apply_line("Getting Episode 2 - B from https://example.com/2").await;
    t.apply_line("Episode 2: Starting download...").await;
    t.apply_line("Episode 2: No VTT stream found").await;
    let ep = store.get_episode(job, 2).await.unwrap().unwrap();
    assert_eq!(ep.status, EpisodeStatus::Complete);
}

#[tokio::test]
async fn merge_bumps_job_to_postprocess() {
    let store = open_memory().await.unwrap();
    let job = running_job(&store).await;
    let dir = tempfile::tempdir().unwrap();
    let mut t = tracker(&store, job, &dir);

    t.apply_line("Getting Episode 1 - A from https://example.com/1").await;
    t.apply_line("Episode 1: Starting download...").await;
    t.apply_line("[Merger] Merging formats into \"/downloads/a.mp4\"").await;

    let ep = store.get_episode(job, 1).await.unwrap().unwrap();
    assert_eq!(ep.status, EpisodeStatus::MergingVideo);

    let job = store.get_job(job).await.unwrap().unwrap();
    assert_eq!(job.stage, JobStage::Postprocess);
    assert_eq!(job.progress_percent, JobStage::Postprocess.percent());
}

#[tokio::test]
async fn canceled_run_reconciles_and_marks_canceled() {
    let store = open_memory().await.unwrap();
    let job = running_job(&store).await;
    let dir = tempfile::tempdir().unwrap();
    let mut t = tracker(&store, job, &dir);

    t.apply_line("Getting Episode 1 - A from https://example.com/1").await;
    t.apply_line("Episode 1: Starting download...").await;

    let summary = t.finish(None, true).await.unwrap();
    assert!(!summary.success);
    assert_eq!(summary.forced_failures, 1);

    let job = store.get_job(job).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Canceled);
}

#[test]
fn download_percent_mapping_is_monotonic_and_bounded() {
    assert_eq!(map_download_percent(0.0), 30);
    assert_eq!(map_download_percent(100.0), 90);
    assert_eq!(map_download_percent(250.0), 90);
    assert_eq!(map_download_percent(-5.0), 30);
    let mut last = 0;
    for p in 0..=100 {
        let mapped = map_download_percent(p as f64);
        assert!(mapped >= last);
        last = mapped;
    }
}
