//! Running-job registry shared between the scheduler loop, the control
//! socket, and the cancel path.
//!
//! Each spawned worker is registered with its pid, a cancel flag, and a
//! done channel the supervisor completes after finalization. Cancellation
//! signals the process and waits on that channel.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use crate::store::JobId;

pub(crate) struct RunningHandle {
    pub pid: i64,
    pub cancel: Arc<AtomicBool>,
    pub done: watch::Receiver<bool>,
}

/// Registry of job id -> running worker process.
#[derive(Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<JobId, RunningHandle>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spawned worker. Returns the cancel flag (read by the
    /// supervisor at exit) and the done sender the supervisor completes.
    pub(crate) fn register(&self, job_id: JobId, pid: i64) -> (Arc<AtomicBool>, watch::Sender<bool>) {
        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = watch::channel(false);
        self.jobs.write().unwrap().insert(
            job_id,
            RunningHandle {
                pid,
                cancel: Arc::clone(&cancel),
                done: done_rx,
            },
        );
        (cancel, done_tx)
    }

    /// Unregister a job (supervisor calls this after finalization).
    pub(crate) fn unregister(&self, job_id: JobId) {
        self.jobs.write().unwrap().remove(&job_id);
    }

    pub(crate) fn get(&self, job_id: JobId) -> Option<(i64, Arc<AtomicBool>, watch::Receiver<bool>)> {
        self.jobs
            .read()
            .unwrap()
            .get(&job_id)
            .map(|h| (h.pid, Arc::clone(&h.cancel), h.done.clone()))
    }

}

/// Send a termination signal to a worker process.
#[cfg(unix)]
pub(crate) fn send_signal(pid: i64, force: bool) {
    let sig = if force { libc::SIGKILL } else { libc::SIGTERM };
    unsafe {
        libc::kill(pid as libc::pid_t, sig);
    }
}

#[cfg(not(unix))]
pub(crate) fn send_signal(pid: i64, _force: bool) {
    tracing::warn!(pid, "process signalling unsupported on this platform");
}

/// Default path for the control socket (same XDG state dir as the DB).
pub fn default_control_socket_path() -> anyhow::Result<PathBuf> {
    Ok(crate::logging::state_dir()?.join("control.sock"))
}
