//! Automation-session surface consumed by the discovery engine.
//!
//! The real implementation wraps a browser-automation session; the engine
//! only ever navigates, reloads, and reads the passively observed traffic,
//! so tests drive it with canned snapshots.

use std::collections::HashMap;

/// One observed network exchange.
#[derive(Debug, Clone)]
pub struct TrafficEntry {
    pub url: String,
    /// Request headers to replay when fetching the resource ourselves.
    pub headers: HashMap<String, String>,
    /// Whether a response has been observed; entries without one are skipped.
    pub completed: bool,
}

impl TrafficEntry {
    pub fn completed(url: &str) -> Self {
        Self {
            url: url.to_string(),
            headers: HashMap::new(),
            completed: true,
        }
    }
}

/// A live page session with passive traffic observation.
///
/// Calls block; sessions are driven from the episode pool's worker threads.
pub trait PageSession: Send {
    fn navigate(&mut self, url: &str) -> anyhow::Result<()>;
    /// Force a reload to coax a stalled player into re-requesting its manifest.
    fn reload(&mut self) -> anyhow::Result<()>;
    /// Snapshot of all traffic observed so far (cumulative).
    fn traffic(&mut self) -> anyhow::Result<Vec<TrafficEntry>>;
}

/// Creates one isolated session per episode task. Each task owns and
/// disposes its session; nothing is shared between tasks except the
/// claimed-resource set.
pub trait SessionFactory: Send + Sync {
    type Session: PageSession;
    fn create(&self) -> anyhow::Result<Self::Session>;
}
