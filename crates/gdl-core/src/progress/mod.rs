//! Progress inference: reconstruct job/episode state from worker output.
//!
//! The worker process is not instrumented; the only signal is its combined
//! stdout/stderr. Lines are ANSI-stripped and matched against an ordered
//! rule table ([`rules`]); matches become store updates via the per-job
//! [`ProgressTracker`]. Lines that match nothing are a normal, silent
//! outcome; the per-line step never errors.

mod ansi;
pub mod rules;
mod tracker;

pub use ansi::strip_ansi;
pub use rules::{match_line, LineEvent};
pub use tracker::{map_download_percent, ProgressTracker, RunSummary};

#[cfg(test)]
mod tests;
