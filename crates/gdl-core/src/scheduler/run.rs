//! The scheduler proper: tick loop, claim-and-spawn, cancel.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GdlConfig;
use crate::diag::{self, JobLog};
use crate::progress::ProgressTracker;
use crate::request::JobRequest;
use crate::store::{JobId, JobStatus, JobStore};

use super::control::{send_signal, JobControl};
use super::spawn::build_worker_command;
use super::supervise::supervise;

pub struct Scheduler {
    store: JobStore,
    cfg: GdlConfig,
    control: Arc<JobControl>,
    log_dir: PathBuf,
}

impl Scheduler {
    pub fn new(store: JobStore, cfg: GdlConfig, log_dir: PathBuf) -> Self {
        Self {
            store,
            cfg,
            control: Arc::new(JobControl::new()),
            log_dir,
        }
    }

    pub fn control(&self) -> Arc<JobControl> {
        Arc::clone(&self.control)
    }

    /// Validate and enqueue a request. Admission errors reject synchronously;
    /// no job row is created for them.
    pub async fn enqueue(&self, request: JobRequest) -> Result<JobId> {
        let id = self.store.create_job(&request).await?;
        tracing::info!(job_id = id, url = %request.url, "job queued");
        Ok(id)
    }

    /// Poll-and-dispatch until the process is stopped. Latency of admission
    /// is bounded by one interval plus spawn time; that is fine at this
    /// arrival rate.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.cfg.poll_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_secs = self.cfg.poll_interval_secs,
            max_concurrent_jobs = self.cfg.max_concurrent_jobs,
            "scheduler started",
        );
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                tracing::error!("scheduler tick failed: {e:#}");
            }
            if let Err(e) = diag::rotate_logs(&self.log_dir, self.cfg.log_retention) {
                tracing::warn!("log rotation failed: {e:#}");
            }
        }
    }

    /// One dispatch cycle: claim queued jobs while below the limit.
    pub async fn tick(&self) -> Result<()> {
        let active = self.store.active_jobs().await?;
        let mut running = active
            .iter()
            .filter(|j| j.status == JobStatus::Running)
            .count();

        for job in active.iter().filter(|j| j.status == JobStatus::Queued) {
            if running >= self.cfg.max_concurrent_jobs {
                break;
            }
            // Claim races (another tick, another scheduler on the same
            // store) are not errors; the loser just skips the job.
            if !self.store.claim_job(job.id).await? {
                continue;
            }
            self.spawn_worker(job.id).await;
            running += 1;
        }
        Ok(())
    }

    /// Spawn and supervise the worker for a freshly claimed job. Spawn
    /// failures finalize the job immediately.
    async fn spawn_worker(&self, job_id: JobId) {
        let job = match self.store.get_job(job_id).await {
            Ok(Some(j)) => j,
            Ok(None) => {
                tracing::error!(job_id, "claimed job vanished");
                return;
            }
            Err(e) => {
                tracing::error!(job_id, "claimed job unreadable: {e:#}");
                return;
            }
        };

        let spawned = build_worker_command(&self.cfg, &job).and_then(|(mut cmd, display)| {
            let child = cmd.spawn()?;
            Ok((child, display))
        });
        let (child, worker_display) = match spawned {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(job_id, "worker spawn failed: {e:#}");
                let _ = self
                    .store
                    .finish_job(job_id, false, Some(&format!("spawn failed: {e:#}")))
                    .await;
                return;
            }
        };

        let pid = child.id().map(i64::from).unwrap_or(0);
        let job_log = match JobLog::create(&self.log_dir, job_id, &worker_display) {
            Ok(l) => Some(l),
            Err(e) => {
                tracing::warn!(job_id, "job log unavailable: {e:#}");
                None
            }
        };
        let log_path = diag::job_log_path(&self.log_dir, job_id).display().to_string();
        if let Err(e) = self.store.start_job(job_id, pid, &log_path).await {
            tracing::warn!(job_id, "start_job update failed: {e:#}");
        }
        tracing::info!(job_id, pid, "worker started: {}", worker_display);

        let (cancel, done) = self.control.register(job_id, pid);
        let tracker = ProgressTracker::new(self.store.clone(), job_id, self.log_dir.clone(), job_log);
        let control = Arc::clone(&self.control);
        tokio::spawn(async move {
            supervise(job_id, child, tracker, cancel, done).await;
            control.unregister(job_id);
        });
    }

    /// Cancel a job. Queued jobs transition directly; running jobs get a
    /// graceful signal, the grace period, then a force kill. Returns false
    /// for unknown or already-terminal jobs.
    pub async fn cancel(&self, job_id: JobId) -> Result<bool> {
        let Some(job) = self.store.get_job(job_id).await? else {
            return Ok(false);
        };
        match job.status {
            JobStatus::Queued => self.store.cancel_job(job_id).await,
            JobStatus::Running => self.cancel_running(job_id).await,
            _ => Ok(false),
        }
    }

    async fn cancel_running(&self, job_id: JobId) -> Result<bool> {
        let Some((pid, cancel, mut done)) = self.control.get(job_id) else {
            // Running in the store but not ours (e.g. stale row): settle the
            // store directly.
            return self.store.cancel_job(job_id).await;
        };

        cancel.store(true, Ordering::Relaxed);
        send_signal(pid, false);
        tracing::info!(job_id, pid, "sent graceful termination");

        let grace = Duration::from_secs(self.cfg.cancel_grace_secs);
        if !wait_done(&mut done, grace).await {
            tracing::warn!(job_id, pid, "grace period expired, force killing");
            send_signal(pid, true);
            // The supervisor still owns reconciliation; give it a moment.
            wait_done(&mut done, grace).await;
        }
        Ok(true)
    }
}

/// Wait until the supervisor reports settled state, bounded by `timeout`.
async fn wait_done(done: &mut tokio::sync::watch::Receiver<bool>, timeout: Duration) -> bool {
    if *done.borrow() {
        return true;
    }
    tokio::time::timeout(timeout, async {
        while done.changed().await.is_ok() {
            if *done.borrow() {
                return;
            }
        }
    })
    .await
    .is_ok()
}
