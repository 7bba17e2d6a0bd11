//! `gdl cancel <id>` – cancel a queued or running job.

use anyhow::Result;
use std::time::Duration;

use gdl_core::scheduler::default_control_socket_path;
use gdl_core::store::{JobStatus, JobStore};

use crate::cli::control_socket;

pub async fn run_cancel(store: &JobStore, id: i64) -> Result<()> {
    let Some(job) = store.get_job(id).await? else {
        anyhow::bail!("no such job: {id}");
    };

    match job.status {
        JobStatus::Queued => {
            // Never started: settle it directly in the store.
            if store.cancel_job(id).await? {
                println!("Canceled job {id}");
            } else {
                println!("Job {id} was no longer cancelable");
            }
        }
        JobStatus::Running => {
            // The running scheduler owns the worker process; relay the
            // cancel so it can terminate the process and reconcile.
            let path = default_control_socket_path()?;
            control_socket::send_cancel(&path, id)
                .await
                .map_err(|e| anyhow::anyhow!("cannot reach running scheduler: {e}"))?;

            // Give the scheduler the grace period plus kill time to settle.
            for _ in 0..40 {
                if let Some(job) = store.get_job(id).await? {
                    if job.status.is_terminal() {
                        println!("Canceled job {id}");
                        return Ok(());
                    }
                }
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
            println!("Cancel requested for job {id}; still settling");
        }
        _ => println!("Job {id} is already {}", job.status.as_str()),
    }
    Ok(())
}
