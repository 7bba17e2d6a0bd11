//! Bounded episode task pool.
//!
//! Episode tasks block for real (session polling, child processes), so the
//! pool uses OS worker threads pulling from a shared queue and reporting
//! results over a channel as they finish. A defect in one task becomes a
//! Failed outcome for that episode and nothing else.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};


/// One unit of work: an episode reference discovered by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeDescriptor {
    pub number: i64,
    pub title: String,
    /// Episode page reference handed to the resolver.
    pub url: String,
}

/// How an episode task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed { error: String },
}

/// Aggregate result of one pool run, in completion order.
#[derive(Debug)]
pub struct PoolResult {
    pub outcomes: Vec<(EpisodeDescriptor, TaskOutcome)>,
}

impl PoolResult {
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, TaskOutcome::Completed))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.completed()
    }
}

/// Run `task` once per episode with at most `max_workers` running at a time.
///
/// Episodes are submitted in episode-number order but complete in arbitrary
/// order; the caller must not assume otherwise. Errors and panics inside a
/// task are converted into `TaskOutcome::Failed` at the task boundary.
pub fn run_episode_pool<T>(
    episodes: Vec<EpisodeDescriptor>,
    max_workers: usize,
    task: T,
) -> PoolResult
where
    T: Fn(&EpisodeDescriptor) -> anyhow::Result<()> + Send + Sync,
{
    let count = episodes.len();
    if count == 0 {
        return PoolResult { outcomes: Vec::new() };
    }

    let mut ordered = episodes;
    ordered.sort_by_key(|e| e.number);

    let work: Arc<Mutex<VecDeque<EpisodeDescriptor>>> =
        Arc::new(Mutex::new(ordered.into_iter().collect()));
    let (tx, rx) = mpsc::channel();
    let task = &task;

    let num_workers = max_workers.max(1).min(count);
    std::thread::scope(|scope| {
        for _ in 0..num_workers {
            let work = Arc::clone(&work);
            let tx = tx.clone();
            scope.spawn(move || loop {
                let episode = match work.lock().unwrap().pop_front() {
                    Some(e) => e,
                    None => break,
                };
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    task(&episode)
                }));
                let outcome = match result {
                    Ok(Ok(())) => TaskOutcome::Completed,
                    Ok(Err(e)) => TaskOutcome::Failed {
                        error: format!("{e:#}"),
                    },
                    Err(panic) => TaskOutcome::Failed {
                        error: panic_message(&panic),
                    },
                };
                if let TaskOutcome::Failed { error } = &outcome {
                    tracing::warn!(episode = episode.number, "episode task failed: {error}");
                }
                let _ = tx.send((episode, outcome));
            });
        }
        drop(tx);
    });

    // All workers have exited the scope; drain whatever they reported.
    let outcomes: Vec<(EpisodeDescriptor, TaskOutcome)> = rx.into_iter().collect();
    PoolResult { outcomes }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}
