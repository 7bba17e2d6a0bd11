//! `gdl watch <id>` – live-update feed for one job.
//!
//! Polls the store once per second and prints status/episode deltas plus
//! any log lines appended since the last poll; exits when the job reaches a
//! terminal status.

use anyhow::Result;
use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use gdl_core::store::{EpisodeStatus, JobStore};

pub async fn run_watch(store: &JobStore, id: i64) -> Result<()> {
    let mut last_status: Option<String> = None;
    let mut episode_statuses: std::collections::HashMap<i64, EpisodeStatus> = Default::default();
    let mut log_pos: u64 = 0;

    loop {
        let Some(job) = store.get_job(id).await? else {
            anyhow::bail!("no such job: {id}");
        };

        let status_line = format!(
            "[job {}] {} / {} / {}%{}",
            id,
            job.status.as_str(),
            job.stage.as_str(),
            job.progress_percent,
            job.progress_text
                .as_deref()
                .map(|t| format!(" - {t}"))
                .unwrap_or_default()
        );
        if last_status.as_deref() != Some(&status_line) {
            println!("{status_line}");
            last_status = Some(status_line);
        }

        for ep in store.list_episodes(id).await? {
            let prev = episode_statuses.insert(ep.number, ep.status);
            if prev != Some(ep.status) {
                println!(
                    "[job {} ep {}] {}{}",
                    id,
                    ep.number,
                    ep.status.as_str(),
                    ep.error_message
                        .as_deref()
                        .map(|e| format!(" ({e})"))
                        .unwrap_or_default()
                );
            }
        }

        if let Some(log_file) = &job.log_file {
            log_pos = print_new_lines(log_file, log_pos);
        }

        if job.status.is_terminal() {
            println!("[job {id}] finished: {}", job.status.as_str());
            return Ok(());
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Print whatever the log gained since `pos`; returns the new position.
fn print_new_lines(path: &str, pos: u64) -> u64 {
    let Ok(mut file) = std::fs::File::open(path) else {
        return pos;
    };
    if file.seek(SeekFrom::Start(pos)).is_err() {
        return pos;
    }
    let mut buf = String::new();
    let Ok(read) = file.read_to_string(&mut buf) else {
        return pos;
    };
    for line in buf.lines() {
        println!("  | {line}");
    }
    pos + read as u64
}
