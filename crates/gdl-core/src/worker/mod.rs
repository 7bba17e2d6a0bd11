//! Worker-process side of a job.
//!
//! The scheduler spawns one worker process per claimed job; everything the
//! orchestrator learns about the run comes from the lines this module
//! prints. The printed phrasing is a protocol: it must stay in lockstep
//! with the rule table in [`crate::progress::rules`].
//!
//! Site-specific scraping and the actual video fetch are collaborators
//! behind traits ([`EpisodeSource`], [`StreamResolver`], [`MediaFetcher`]);
//! the built-in implementations cover direct links and the discovery-engine
//! path over any [`crate::discover::SessionFactory`].

mod console;
mod fetch_tool;
mod resolve;
mod run;
mod source;

pub use console::Console;
pub use fetch_tool::{MediaFetcher, YtDlpFetcher};
pub use resolve::{DirectResolver, DiscoveryResolver, ResolvedMedia, StreamResolver};
pub use run::{run_job, WorkerJob};
pub use source::{DirectSource, EpisodeSource, SeriesInfo};

#[cfg(test)]
mod tests;
