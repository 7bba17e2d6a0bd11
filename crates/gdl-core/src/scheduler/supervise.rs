//! Worker supervision: stream output into the pipeline, finalize on exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::watch;

use crate::progress::ProgressTracker;
use crate::store::JobId;

/// Drive one worker process to completion.
///
/// Both output pipes feed the same tracker (the worker's episode tasks
/// interleave freely anyway). On exit the tracker reconciles episodes and
/// writes the job's terminal status; only then is the done channel
/// completed, so a waiting cancel sees fully settled state.
pub(crate) async fn supervise(
    job_id: JobId,
    mut child: Child,
    mut tracker: ProgressTracker,
    cancel: Arc<AtomicBool>,
    done: watch::Sender<bool>,
) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let mut out_lines = stdout.map(|s| BufReader::new(s).lines());
    let mut err_lines = stderr.map(|s| BufReader::new(s).lines());
    let mut out_open = out_lines.is_some();
    let mut err_open = err_lines.is_some();

    while out_open || err_open {
        tokio::select! {
            line = next_line(&mut out_lines), if out_open => match line {
                Some(l) => tracker.apply_line(&l).await,
                None => out_open = false,
            },
            line = next_line(&mut err_lines), if err_open => match line {
                Some(l) => tracker.apply_line(&l).await,
                None => err_open = false,
            },
        }
    }

    let exit_code = match child.wait().await {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::error!(job_id, "wait for worker: {e}");
            None
        }
    };

    let canceled = cancel.load(Ordering::Relaxed);
    match tracker.finish(exit_code, canceled).await {
        Ok(summary) => {
            tracing::info!(
                job_id,
                exit_code,
                canceled,
                forced_failures = summary.forced_failures,
                success = summary.success,
                "job finalized",
            );
        }
        Err(e) => tracing::error!(job_id, "finalize job: {e:#}"),
    }

    let _ = done.send(true);
}

async fn next_line(
    lines: &mut Option<tokio::io::Lines<BufReader<impl tokio::io::AsyncRead + Unpin>>>,
) -> Option<String> {
    match lines {
        Some(l) => l.next_line().await.ok().flatten(),
        None => None,
    }
}
