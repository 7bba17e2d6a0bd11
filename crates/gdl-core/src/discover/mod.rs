//! Per-episode resource discovery.
//!
//! The stream URL for an episode never appears in static markup; it shows up
//! in the page's network traffic once the player starts loading. The engine
//! polls a passive traffic snapshot under an attempt budget, classifies
//! entries into confirmed/candidate manifest tiers and caption candidates,
//! and resolves the final variant to hand to the fetch tool.

pub mod session;
mod engine;
mod fetch;
mod subtitles;
mod variants;

pub use engine::{DiscoveryEngine, DiscoveryError, DiscoveryOutcome, MediaResource, new_claimed_set, ClaimedSet};
pub use fetch::{CurlFetcher, ResourceFetcher};
pub use session::{PageSession, SessionFactory, TrafficEntry};
pub use variants::resolve_variant;

#[cfg(test)]
mod tests;
