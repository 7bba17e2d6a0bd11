//! Job scheduler: admission, exactly-once dispatch, worker supervision.
//!
//! Cooperative polling, not events: a 2-second tick reads the store, claims
//! queued jobs up to the concurrency limit via the store's conditional
//! UPDATE, and spawns one worker process per claimed job. A supervisor task
//! per process streams its output into the progress pipeline and performs
//! the end-of-run reconciliation when it exits.

mod control;
mod run;
mod spawn;
mod supervise;

pub use control::{default_control_socket_path, JobControl};
pub use run::Scheduler;
