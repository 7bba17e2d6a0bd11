//! Control socket: server (during `gdl run`) and client (for `gdl cancel`).
//! Protocol: one line per command: "cancel <id>".

use anyhow::Result;
use gdl_core::scheduler::Scheduler;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;

/// Spawns a task that listens on `path` and relays each "cancel <id>" line
/// to the scheduler (which owns the worker processes). Ignores malformed
/// lines.
pub fn spawn_control_listener(
    scheduler: Arc<Scheduler>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let handle = tokio::spawn(async move {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = std::fs::remove_file(&path);
        let listener = match UnixListener::bind(&path) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket bind: {}", e);
                return;
            }
        };
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let scheduler = Arc::clone(&scheduler);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            let line = line.trim();
                            if let Some(rest) = line.strip_prefix("cancel ") {
                                if let Ok(id) = rest.trim().parse::<i64>() {
                                    match scheduler.cancel(id).await {
                                        Ok(true) => tracing::info!(job_id = id, "cancel via socket"),
                                        Ok(false) => {
                                            tracing::debug!(job_id = id, "socket cancel: nothing to do")
                                        }
                                        Err(e) => {
                                            tracing::warn!(job_id = id, "socket cancel failed: {e:#}")
                                        }
                                    }
                                }
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends "cancel <job_id>\n" to the control socket.
pub async fn send_cancel(socket_path: &Path, job_id: i64) -> Result<()> {
    if !socket_path.exists() {
        anyhow::bail!("control socket not found at {}", socket_path.display());
    }
    let mut stream = tokio::net::UnixStream::connect(socket_path).await?;
    let msg = format!("cancel {}\n", job_id);
    tokio::io::AsyncWriteExt::write_all(&mut stream, msg.as_bytes()).await?;
    Ok(())
}
