//! Stream resolution strategies for episode tasks.

use crate::discover::{
    resolve_variant, ClaimedSet, DiscoveryEngine, DiscoveryError, MediaResource, PageSession,
    ResourceFetcher, SessionFactory,
};
use crate::config::{DiscoveryConfig, SubtitleConfig};
use crate::pool::EpisodeDescriptor;

/// What an episode task needs to start fetching.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub video: MediaResource,
    pub subtitle: Option<String>,
}

/// Turns an episode page reference into fetchable resources.
pub trait StreamResolver: Send + Sync {
    fn resolve(&self, episode: &EpisodeDescriptor) -> Result<ResolvedMedia, DiscoveryError>;
}

/// Trivial resolver for links that are already fetchable (the external
/// downloader handles its own extraction). No session, no discovery.
pub struct DirectResolver;

impl StreamResolver for DirectResolver {
    fn resolve(&self, episode: &EpisodeDescriptor) -> Result<ResolvedMedia, DiscoveryError> {
        Ok(ResolvedMedia {
            video: MediaResource {
                url: episode.url.clone(),
                headers: Default::default(),
            },
            subtitle: None,
        })
    }
}

/// Discovery-engine resolver: one fresh automation session per episode,
/// disposed on every path (the session type's Drop is its cleanup).
pub struct DiscoveryResolver<SF, F> {
    sessions: SF,
    fetcher: F,
    budget: DiscoveryConfig,
    subtitles: SubtitleConfig,
    claimed: ClaimedSet,
}

impl<SF, F> DiscoveryResolver<SF, F>
where
    SF: SessionFactory,
    F: ResourceFetcher,
{
    pub fn new(
        sessions: SF,
        fetcher: F,
        budget: DiscoveryConfig,
        subtitles: SubtitleConfig,
        claimed: ClaimedSet,
    ) -> Self {
        Self {
            sessions,
            fetcher,
            budget,
            subtitles,
            claimed,
        }
    }
}

impl<SF, F> StreamResolver for DiscoveryResolver<SF, F>
where
    SF: SessionFactory,
    F: ResourceFetcher,
{
    fn resolve(&self, episode: &EpisodeDescriptor) -> Result<ResolvedMedia, DiscoveryError> {
        let mut session = self
            .sessions
            .create()
            .map_err(|e| DiscoveryError::Session(e.to_string()))?;
        session
            .navigate(&episode.url)
            .map_err(|e| DiscoveryError::Session(e.to_string()))?;

        let engine = DiscoveryEngine::new(
            self.budget.clone(),
            self.subtitles.clone(),
            &self.fetcher,
            self.claimed.clone(),
        );
        let outcome = engine.discover(&mut session)?;

        // The adopted manifest is usually a variant index; prefer the first
        // playable variant inside it.
        let video_url = resolve_variant(&self.fetcher, &outcome.primary.url, &outcome.primary.headers);

        Ok(ResolvedMedia {
            video: MediaResource {
                url: video_url,
                headers: outcome.primary.headers,
            },
            subtitle: outcome.subtitle,
        })
    }
}
