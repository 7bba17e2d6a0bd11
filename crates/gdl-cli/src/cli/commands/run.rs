//! `gdl run` – run the scheduler until interrupted.

use anyhow::Result;
use std::sync::Arc;

use gdl_core::config::GdlConfig;
use gdl_core::diag;
use gdl_core::scheduler::{default_control_socket_path, Scheduler};
use gdl_core::store::JobStore;

use crate::cli::control_socket;

pub async fn run_scheduler(store: JobStore, cfg: GdlConfig) -> Result<()> {
    // Rows stranded in `running` by a previous crash would hold concurrency
    // slots forever; settle them before scheduling.
    let recovered = store.recover_running_jobs().await?;
    if recovered > 0 {
        tracing::info!("settled {} stranded job(s) from a previous run", recovered);
    }

    let log_dir = diag::default_log_dir()?;
    let scheduler = Arc::new(Scheduler::new(store, cfg, log_dir));

    if let Ok(socket_path) = default_control_socket_path() {
        if control_socket::spawn_control_listener(Arc::clone(&scheduler), &socket_path).is_ok() {
            tracing::debug!(path = %socket_path.display(), "control socket listening");
        }
    }

    println!("Scheduler running; press Ctrl-C to stop.");
    let loop_scheduler = Arc::clone(&scheduler);
    tokio::select! {
        _ = loop_scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nStopping scheduler.");
        }
    }
    Ok(())
}
