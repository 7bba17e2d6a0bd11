//! Per-job and per-episode log files plus bounded retention.
//!
//! Layout under the XDG state dir: `logs/job_<id>.log` for the full worker
//! output and `logs/job_<id>_ep_<n>.log` while an episode is active. Each
//! file has exactly one writer, so no cross-task locking is needed.

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::store::JobId;

/// Default log directory (`~/.local/state/gdl/logs`).
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(crate::logging::state_dir()?.join("logs"))
}

pub fn job_log_path(log_dir: &Path, job_id: JobId) -> PathBuf {
    log_dir.join(format!("job_{job_id}.log"))
}

pub fn episode_log_path(log_dir: &Path, job_id: JobId, number: i64) -> PathBuf {
    log_dir.join(format!("job_{job_id}_ep_{number}.log"))
}

/// Append-only writer for one job's combined worker output.
pub struct JobLog {
    file: fs::File,
    path: PathBuf,
}

impl JobLog {
    /// Create the log file (truncating any stale one) and stamp the header.
    pub fn create(log_dir: &Path, job_id: JobId, command: &str) -> Result<Self> {
        fs::create_dir_all(log_dir)?;
        let path = job_log_path(log_dir, job_id);
        let mut file = fs::File::create(&path)?;
        writeln!(file, "Job {job_id} started at {}", crate::store::db::unix_timestamp())?;
        writeln!(file, "Command: {command}")?;
        writeln!(file, "{}", "-".repeat(80))?;
        file.flush()?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one output line. Flushed immediately so `watch` tails see it.
    pub fn append_line(&mut self, line: &str) {
        let _ = writeln!(self.file, "{line}");
        let _ = self.file.flush();
    }
}

/// Scoped writer for one episode's attributed output. Dropping it closes
/// the handle, so the tracker's final sweep can never leak descriptors.
pub struct EpisodeLog {
    file: fs::File,
    path: PathBuf,
}

impl EpisodeLog {
    pub fn create(log_dir: &Path, job_id: JobId, number: i64) -> Result<Self> {
        fs::create_dir_all(log_dir)?;
        let path = episode_log_path(log_dir, job_id, number);
        let file = fs::File::create(&path)?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_line(&mut self, line: &str) {
        let _ = writeln!(self.file, "{line}");
        let _ = self.file.flush();
    }
}

/// Delete the oldest job logs so at most `keep` remain. Episode logs share
/// the `job_<id>` prefix and are swept together with their job log.
pub fn rotate_logs(log_dir: &Path, keep: usize) -> Result<usize> {
    let mut job_logs: Vec<(std::time::SystemTime, PathBuf, String)> = Vec::new();
    let entries = match fs::read_dir(log_dir) {
        Ok(e) => e,
        Err(_) => return Ok(0),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Only whole-job logs count toward retention.
        if name.starts_with("job_") && name.ends_with(".log") && !name.contains("_ep_") {
            let mtime = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            let stem = name.trim_end_matches(".log").to_string();
            job_logs.push((mtime, path, stem));
        }
    }

    if job_logs.len() <= keep {
        return Ok(0);
    }

    job_logs.sort_by_key(|(mtime, _, _)| *mtime);
    let excess = job_logs.len() - keep;
    let mut removed = 0;
    for (_, path, stem) in job_logs.into_iter().take(excess) {
        if fs::remove_file(&path).is_ok() {
            removed += 1;
            tracing::info!("rotated old log file: {}", path.display());
        }
        // Matching per-episode logs (job_<id>_ep_<n>.log).
        if let Ok(entries) = fs::read_dir(log_dir) {
            for entry in entries.flatten() {
                let p = entry.path();
                if let Some(name) = p.file_name().and_then(|n| n.to_str()) {
                    if name.starts_with(&format!("{stem}_ep_")) && name.ends_with(".log") {
                        let _ = fs::remove_file(&p);
                    }
                }
            }
        }
    }
    Ok(removed)
}
