//! Per-job progress state: line application and end-of-run reconciliation.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::diag::{EpisodeLog, JobLog};
use crate::store::{EpisodeStatus, JobId, JobStage, JobStore, StageData};

use super::ansi::strip_ansi;
use super::rules::{match_line, LineEvent};

/// Map the external downloader's 0–100 percent into the episode's reserved
/// 30–90 mid-range. The exact bounds are a heuristic carried over from the
/// observed tool; the property that matters is monotonicity.
pub fn map_download_percent(percent: f64) -> i64 {
    let p = percent.clamp(0.0, 100.0);
    30 + (p / 100.0 * 60.0) as i64
}

/// Outcome of one supervised worker run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Episodes forced to Failed by reconciliation.
    pub forced_failures: u64,
    /// Final job success flag (exit 0 and nothing forced).
    pub success: bool,
}

/// Applies worker output lines to the store for one job.
///
/// Keeps the transient context the raw rows cannot express: which episode
/// was announced last (and is therefore implicitly completed by the next
/// announcement) and which episode most recently began downloading (and
/// therefore owns un-numbered downloader progress lines).
pub struct ProgressTracker {
    store: JobStore,
    job_id: JobId,
    log_dir: PathBuf,
    job_log: Option<JobLog>,
    episode_logs: HashMap<i64, EpisodeLog>,
    /// Local status cache; enforces forward-only transitions without a read
    /// per line.
    statuses: HashMap<i64, EpisodeStatus>,
    /// Most recently announced episode, cleared once it reaches a terminal
    /// status. The next announcement implicitly completes it.
    last_started: Option<i64>,
    /// Most recently active downloading episode; owns generic `[download]`
    /// progress lines.
    active_download: Option<i64>,
    job_stage: JobStage,
}

impl ProgressTracker {
    pub fn new(store: JobStore, job_id: JobId, log_dir: PathBuf, job_log: Option<JobLog>) -> Self {
        Self {
            store,
            job_id,
            log_dir,
            job_log,
            episode_logs: HashMap::new(),
            statuses: HashMap::new(),
            last_started: None,
            active_download: None,
            job_stage: JobStage::Init,
        }
    }

    /// Consume one raw output line. Never fails: store errors are logged and
    /// swallowed so a transient write problem cannot kill the supervisor.
    pub async fn apply_line(&mut self, raw: &str) {
        let line = strip_ansi(raw).into_owned();

        if let Some(log) = self.job_log.as_mut() {
            log.append_line(&line);
        }

        let Some(event) = match_line(&line) else {
            // Unattributed chatter still lands in the active episode's log
            // so per-episode files read like a contiguous transcript.
            if let Some(n) = self.active_download {
                self.append_episode_line(n, &line);
            }
            return;
        };

        self.route_line(&event, &line);
        self.apply_event(event).await;
    }

    /// Append the line to the log of the episode the event concerns.
    fn route_line(&mut self, event: &LineEvent, line: &str) {
        let number = match event {
            LineEvent::EpisodeStarted { number, .. }
            | LineEvent::DownloadStarted { number }
            | LineEvent::DownloadCompleted { number }
            | LineEvent::NoStreamFound { number }
            | LineEvent::StreamFound { number }
            | LineEvent::SubtitlesStarted { number }
            | LineEvent::SubtitlesSkipped { number } => Some(*number),
            LineEvent::Destination { number, .. } => (*number).or(self.active_download),
            LineEvent::TransferProgress { .. } | LineEvent::Merging => self.active_download,
        };
        if let Some(n) = number {
            self.append_episode_line(n, line);
        }
    }

    fn append_episode_line(&mut self, number: i64, line: &str) {
        if let Some(log) = self.episode_logs.get_mut(&number) {
            log.append_line(line);
        }
    }

    async fn apply_event(&mut self, event: LineEvent) {
        match event {
            LineEvent::EpisodeStarted { number, title } => {
                self.implicit_complete_previous(number).await;
                self.episode_started(number, &title).await;
            }
            LineEvent::DownloadStarted { number } => {
                self.advance(number, EpisodeStatus::DownloadingVideo, None).await;
                self.active_download = Some(number);
                self.job_stage_at_least(JobStage::Download, None).await;
            }
            LineEvent::DownloadCompleted { number } => {
                self.advance(number, EpisodeStatus::Complete, None).await;
                self.retire(number);
            }
            LineEvent::NoStreamFound { number } => {
                self.advance(number, EpisodeStatus::Failed, Some("No stream found")).await;
                self.retire(number);
            }
            LineEvent::StreamFound { number } => {
                self.advance(number, EpisodeStatus::DownloadingVideo, None).await;
                self.active_download = Some(number);
                self.job_stage_at_least(JobStage::Download, None).await;
            }
            LineEvent::Destination { number, subtitle } => {
                // The sNNeNN token is the fallback attribution path for runs
                // where the explicit per-episode markers were lost.
                let Some(n) = number.or(self.active_download) else {
                    return;
                };
                if subtitle {
                    self.advance(n, EpisodeStatus::DownloadingSubtitles, None).await;
                } else {
                    self.advance(n, EpisodeStatus::DownloadingVideo, None).await;
                    self.active_download = Some(n);
                    self.job_stage_at_least(JobStage::Download, None).await;
                }
            }
            LineEvent::TransferProgress { data } => {
                // Only the episode that most recently began downloading may
                // own an un-numbered progress line.
                let Some(n) = self.active_download else {
                    return;
                };
                self.transfer_progress(n, data).await;
            }
            LineEvent::Merging => {
                if let Some(n) = self.active_download {
                    self.advance(n, EpisodeStatus::MergingVideo, None).await;
                }
                self.job_stage_at_least(JobStage::Postprocess, None).await;
            }
            LineEvent::SubtitlesStarted { number } => {
                self.advance(number, EpisodeStatus::DownloadingSubtitles, None).await;
            }
            LineEvent::SubtitlesSkipped { number } => {
                // Captions explicitly skipped: nothing left for this episode.
                self.advance(number, EpisodeStatus::Complete, None).await;
                self.retire(number);
            }
        }
    }

    /// Rule 9: an announcement while the previous announced episode is still
    /// open is an implicit completion signal for it.
    async fn implicit_complete_previous(&mut self, new_number: i64) {
        let Some(prev) = self.last_started else {
            return;
        };
        if prev == new_number {
            return;
        }
        let open = self
            .statuses
            .get(&prev)
            .map(|s| !s.is_terminal())
            .unwrap_or(false);
        if open {
            self.advance(prev, EpisodeStatus::Complete, None).await;
            self.retire(prev);
        }
    }

    async fn episode_started(&mut self, number: i64, title: &str) {
        if let Err(e) = self.store.upsert_episode(self.job_id, number, Some(title)).await {
            tracing::warn!(job_id = self.job_id, number, "episode upsert failed: {e}");
        }
        self.statuses.entry(number).or_insert(EpisodeStatus::Pending);
        self.last_started = Some(number);

        match EpisodeLog::create(&self.log_dir, self.job_id, number) {
            Ok(log) => {
                let path = log.path().display().to_string();
                self.episode_logs.insert(number, log);
                if let Err(e) = self
                    .store
                    .set_episode_log_file(self.job_id, number, &path)
                    .await
                {
                    tracing::warn!(job_id = self.job_id, number, "episode log path update failed: {e}");
                }
            }
            Err(e) => {
                tracing::warn!(job_id = self.job_id, number, "episode log open failed: {e}");
            }
        }
        // Re-route the announcement itself now that the log exists.
        let announce = format!("Getting Episode {number} - {title}");
        self.append_episode_line(number, &announce);

        self.advance(number, EpisodeStatus::ResolvingStream, None).await;
        self.job_stage_at_least(JobStage::Resolve, Some(&format!("Episode {number} - {title}")))
            .await;
    }

    /// Advance an episode's status if the transition is forward. Episodes
    /// that were never announced have no row and are ignored.
    async fn advance(&mut self, number: i64, status: EpisodeStatus, error: Option<&str>) {
        let Some(&current) = self.statuses.get(&number) else {
            return;
        };
        if !current.can_advance_to(status) {
            return;
        }
        self.statuses.insert(number, status);
        if let Err(e) = self
            .store
            .set_episode_status(self.job_id, number, status, error)
            .await
        {
            tracing::warn!(job_id = self.job_id, number, "episode status update failed: {e}");
        }
        if status.is_terminal() {
            self.episode_logs.remove(&number);
        }
    }

    /// Drop an episode from the transient tracking context.
    fn retire(&mut self, number: i64) {
        if self.active_download == Some(number) {
            self.active_download = None;
        }
        if self.last_started == Some(number) {
            self.last_started = None;
        }
    }

    async fn transfer_progress(&mut self, number: i64, data: StageData) {
        let Some(percent) = data.percent else {
            return;
        };
        let mapped = map_download_percent(percent);
        if let Err(e) = self
            .store
            .update_episode_progress(self.job_id, number, mapped, &data)
            .await
        {
            tracing::warn!(job_id = self.job_id, number, "episode progress update failed: {e}");
        }
        let text = format!("Episode {number}: downloading {percent:.1}%");
        if let Err(e) = self
            .store
            .update_job_progress(self.job_id, mapped, None, Some(&text))
            .await
        {
            tracing::warn!(job_id = self.job_id, "job progress update failed: {e}");
        }
    }

    /// Bump the job stage forward (never backward) and refresh the coarse
    /// percent from the stage table.
    async fn job_stage_at_least(&mut self, stage: JobStage, text: Option<&str>) {
        if stage <= self.job_stage {
            if let Some(t) = text {
                let _ = self
                    .store
                    .update_job_progress(self.job_id, self.job_stage.percent(), None, Some(t))
                    .await;
            }
            return;
        }
        self.job_stage = stage;
        if let Err(e) = self
            .store
            .update_job_progress(self.job_id, stage.percent(), Some(stage), text)
            .await
        {
            tracing::warn!(job_id = self.job_id, "job stage update failed: {e}");
        }
    }

    /// End-of-run reconciliation and terminal transition.
    ///
    /// Every episode still open is forced to Failed; the job is Success only
    /// for a clean exit with nothing forced. When `canceled` is set the job
    /// goes to Canceled instead (episodes are still reconciled; they died
    /// with the process).
    pub async fn finish(mut self, exit_code: Option<i32>, canceled: bool) -> anyhow::Result<RunSummary> {
        // Final sweep: close any per-episode handle that survived the run.
        self.episode_logs.clear();

        let forced = self
            .store
            .fail_unfinished_episodes(self.job_id, "did not complete before process exit")
            .await?;

        if canceled {
            self.store.cancel_job(self.job_id).await?;
            return Ok(RunSummary {
                forced_failures: forced,
                success: false,
            });
        }

        let success = exit_code == Some(0) && forced == 0;
        if success {
            self.store.finish_job(self.job_id, true, None).await?;
        } else {
            let message = match exit_code {
                Some(0) => format!("{forced} episode(s) did not complete"),
                Some(code) => format!("process exited with code {code}"),
                None => "process terminated by signal".to_string(),
            };
            self.store.finish_job(self.job_id, false, Some(&message)).await?;
        }

        Ok(RunSummary {
            forced_failures: forced,
            success,
        })
    }
}
