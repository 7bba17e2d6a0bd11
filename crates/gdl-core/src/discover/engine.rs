//! The discovery loop: poll traffic, classify, adopt.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use crate::config::{DiscoveryConfig, SubtitleConfig};

use super::fetch::ResourceFetcher;
use super::session::PageSession;
use super::subtitles;

/// URLs already adopted by a sibling episode task within this worker run.
/// Shared, never global: created per run and passed into each task.
pub type ClaimedSet = Arc<Mutex<HashSet<String>>>;

pub fn new_claimed_set() -> ClaimedSet {
    Arc::new(Mutex::new(HashSet::new()))
}

/// A resolved resource plus the request headers needed to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResource {
    pub url: String,
    pub headers: HashMap<String, String>,
}

/// What discovery produced for one episode.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub primary: MediaResource,
    /// Chosen caption URL (non-interactive selection), if any.
    pub subtitle: Option<String>,
    /// Every language-matched caption candidate, for callers that prompt.
    pub subtitle_candidates: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Attempt budget exhausted without any primary resource.
    #[error("no stream found")]
    NoStreamFound,
    /// Captions were configured as required and the budget ran out without
    /// a language-matched candidate.
    #[error("no caption stream found")]
    NoCaptionsFound,
    /// The session itself failed (navigation, traffic read).
    #[error("session error: {0}")]
    Session(String),
}

/// Per-episode discovery engine. One instance per task; the claimed set is
/// the only state shared with siblings.
pub struct DiscoveryEngine<'a, F: ResourceFetcher> {
    budget: DiscoveryConfig,
    subtitles: SubtitleConfig,
    fetcher: &'a F,
    claimed: ClaimedSet,
}

impl<'a, F: ResourceFetcher> DiscoveryEngine<'a, F> {
    pub fn new(
        budget: DiscoveryConfig,
        subtitles: SubtitleConfig,
        fetcher: &'a F,
        claimed: ClaimedSet,
    ) -> Self {
        Self {
            budget,
            subtitles,
            fetcher,
            claimed,
        }
    }

    /// Run the polling loop against an already-navigated session.
    ///
    /// A confirmed primary (manifest URL carrying the top-level marker) wins
    /// the moment it is seen; a plausible candidate is remembered but only
    /// adopted once the attempt budget runs out without a confirmed match.
    /// Caption search never fails the episode: running out of budget without
    /// one is a soft outcome (`subtitle: None`).
    pub fn discover(&self, session: &mut dyn PageSession) -> Result<DiscoveryOutcome, DiscoveryError> {
        let mut confirmed: Option<MediaResource> = None;
        let mut candidate: Option<MediaResource> = None;
        let mut subtitle_candidates: Vec<String> = Vec::new();
        let mut repeat_sightings: usize = 0;
        let mut probed: HashSet<String> = HashSet::new();
        let mut subs_satisfied = self.subtitles.disabled;

        let mut attempt: u32 = 0;
        while attempt <= self.budget.attempt_cap && !(confirmed.is_some() && subs_satisfied) {
            let entries = session
                .traffic()
                .map_err(|e| DiscoveryError::Session(e.to_string()))?;

            for entry in entries.iter().filter(|e| e.completed) {
                let uri = entry.url.to_lowercase();

                if confirmed.is_none() && is_manifest(&uri) && !self.is_claimed(&uri) {
                    if uri.contains("master") {
                        tracing::debug!("confirmed manifest: {uri}");
                        confirmed = Some(MediaResource {
                            url: uri.clone(),
                            headers: entry.headers.clone(),
                        });
                    } else if candidate.is_none() {
                        tracing::debug!("candidate manifest: {uri}");
                        candidate = Some(MediaResource {
                            url: uri.clone(),
                            headers: entry.headers.clone(),
                        });
                    }
                }

                if !subs_satisfied && subtitles::looks_like_subtitle(&uri, &self.subtitles) {
                    if subtitle_candidates.contains(&uri) {
                        // Once every known caption has been re-seen the feed
                        // has stabilized; stop waiting for more.
                        repeat_sightings += 1;
                        if repeat_sightings >= subtitle_candidates.len() {
                            subs_satisfied = true;
                        }
                    } else if probed.insert(uri.clone())
                        && subtitles::probe_language(self.fetcher, entry, &self.subtitles.language)
                    {
                        subtitle_candidates.push(uri.clone());
                    }
                }
            }

            attempt += 1;
            if self.budget.refresh_attempts.contains(&attempt) {
                let _ = session.reload();
            }
            if !(confirmed.is_some() && subs_satisfied) && attempt <= self.budget.attempt_cap {
                std::thread::sleep(Duration::from_secs(self.budget.pass_delay_secs));
            }
        }

        // Budget exhausted without a confirmed manifest: fall back to the
        // first candidate seen.
        let primary = match confirmed.or(candidate) {
            Some(p) => p,
            None => return Err(DiscoveryError::NoStreamFound),
        };
        self.claim(&primary.url);

        if subtitle_candidates.is_empty() && !self.subtitles.disabled {
            // Missing captions are a soft outcome unless the caller insists.
            if self.subtitles.required {
                return Err(DiscoveryError::NoCaptionsFound);
            }
            tracing::warn!("no caption stream found for {}", primary.url);
        }

        let subtitle = subtitles::select_subtitle(&subtitle_candidates, &self.subtitles.language);

        Ok(DiscoveryOutcome {
            primary,
            subtitle,
            subtitle_candidates,
        })
    }

    fn is_claimed(&self, uri: &str) -> bool {
        self.claimed.lock().map(|s| s.contains(uri)).unwrap_or(false)
    }

    fn claim(&self, uri: &str) {
        if let Ok(mut s) = self.claimed.lock() {
            s.insert(uri.to_string());
        }
    }
}

/// Primary-resource classifier: manifest extension, not a preview track.
fn is_manifest(uri: &str) -> bool {
    uri.contains(".m3u8") && !uri.contains("thumbnail") && !uri.contains("iframe")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_classifier() {
        assert!(is_manifest("https://cdn/v/master.m3u8"));
        assert!(is_manifest("https://cdn/v/index-720.m3u8?tok=1"));
        assert!(!is_manifest("https://cdn/v/thumbnail.m3u8"));
        assert!(!is_manifest("https://cdn/v/iframe-index.m3u8"));
        assert!(!is_manifest("https://cdn/v/seg-1.ts"));
    }
}
