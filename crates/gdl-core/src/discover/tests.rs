//! Engine tests driven by canned traffic snapshots.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;

use crate::config::{DiscoveryConfig, SubtitleConfig};

use super::engine::{new_claimed_set, DiscoveryEngine, DiscoveryError};
use super::fetch::ResourceFetcher;
use super::session::{PageSession, TrafficEntry};

/// Session whose traffic snapshot grows per poll: pass N sees the union of
/// the first N+1 scripted batches (the last batch repeats once exhausted).
struct ScriptedSession {
    batches: Vec<Vec<TrafficEntry>>,
    polls: usize,
    reloads: usize,
}

impl ScriptedSession {
    fn new(batches: Vec<Vec<TrafficEntry>>) -> Self {
        Self {
            batches,
            polls: 0,
            reloads: 0,
        }
    }
}

impl PageSession for ScriptedSession {
    fn navigate(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.reloads += 1;
        Ok(())
    }

    fn traffic(&mut self) -> Result<Vec<TrafficEntry>> {
        let upto = (self.polls + 1).min(self.batches.len());
        self.polls += 1;
        Ok(self.batches[..upto].iter().flatten().cloned().collect())
    }
}

/// Fetcher returning a fixed body per URL (captions probe + variant scan).
#[derive(Default)]
struct MapFetcher {
    bodies: HashMap<String, String>,
}

impl MapFetcher {
    fn with(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }
}

impl ResourceFetcher for MapFetcher {
    fn fetch_text(
        &self,
        url: &str,
        _headers: &HashMap<String, String>,
        _timeout: Duration,
    ) -> Result<String> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no canned body for {url}"))
    }
}

fn budget(cap: u32) -> DiscoveryConfig {
    DiscoveryConfig {
        attempt_cap: cap,
        refresh_attempts: vec![2],
        pass_delay_secs: 0,
    }
}

fn no_subs() -> SubtitleConfig {
    SubtitleConfig {
        disabled: true,
        ..SubtitleConfig::default()
    }
}

const ENGLISH_BODY: &str = "WEBVTT\n\nThe quick brown fox jumps over the lazy dog. \
    This is an English subtitle track and the detector should have no trouble \
    recognizing the language of these sentences.\n";
const FRENCH_BODY: &str = "WEBVTT\n\nLe renard brun saute par-dessus le chien paresseux. \
    Ceci est une piste de sous-titres en langue française et le détecteur devrait \
    reconnaître la langue de ces phrases sans difficulté.\n";

#[test]
fn confirmed_manifest_wins_immediately() {
    let fetcher = MapFetcher::default();
    let engine = DiscoveryEngine::new(budget(60), no_subs(), &fetcher, new_claimed_set());
    let mut session = ScriptedSession::new(vec![vec![
        TrafficEntry::completed("https://cdn/v/master.m3u8"),
    ]]);

    let out = engine.discover(&mut session).unwrap();
    assert_eq!(out.primary.url, "https://cdn/v/master.m3u8");
    // One pass sufficed; the loop never reached the reload threshold.
    assert_eq!(session.reloads, 0);
    assert_eq!(session.polls, 1);
}

#[test]
fn later_confirmed_beats_earlier_candidate() {
    // A plausible candidate in pass 0, the confirmed manifest only ten
    // passes later: the confirmed one must be adopted, never the candidate.
    let fetcher = MapFetcher::default();
    let engine = DiscoveryEngine::new(budget(60), no_subs(), &fetcher, new_claimed_set());
    let mut batches = vec![vec![TrafficEntry::completed("https://cdn/v/index-720.m3u8")]];
    for _ in 0..9 {
        batches.push(vec![]);
    }
    batches.push(vec![TrafficEntry::completed("https://cdn/v/master.m3u8")]);
    let mut session = ScriptedSession::new(batches);

    let out = engine.discover(&mut session).unwrap();
    assert_eq!(out.primary.url, "https://cdn/v/master.m3u8");
}

#[test]
fn first_candidate_adopted_at_cap() {
    let fetcher = MapFetcher::default();
    let engine = DiscoveryEngine::new(budget(4), no_subs(), &fetcher, new_claimed_set());
    let mut session = ScriptedSession::new(vec![vec![
        TrafficEntry::completed("https://cdn/v/index-480.m3u8"),
        TrafficEntry::completed("https://cdn/v/index-720.m3u8"),
    ]]);

    let out = engine.discover(&mut session).unwrap();
    // First candidate seen, adopted only after the budget ran out.
    assert_eq!(out.primary.url, "https://cdn/v/index-480.m3u8");
    assert_eq!(session.polls, 5);
    assert_eq!(session.reloads, 1);
}

#[test]
fn claimed_resources_are_never_readopted() {
    let fetcher = MapFetcher::default();
    let claimed = new_claimed_set();
    let engine = DiscoveryEngine::new(budget(2), no_subs(), &fetcher, claimed.clone());

    let mut first = ScriptedSession::new(vec![vec![
        TrafficEntry::completed("https://cdn/v/master.m3u8"),
    ]]);
    let out = engine.discover(&mut first).unwrap();
    assert_eq!(out.primary.url, "https://cdn/v/master.m3u8");

    // A sibling task observing the same traffic must not steal the sibling's
    // stream; with nothing else on offer its discovery fails.
    let engine2 = DiscoveryEngine::new(budget(2), no_subs(), &fetcher, claimed);
    let mut second = ScriptedSession::new(vec![vec![
        TrafficEntry::completed("https://cdn/v/master.m3u8"),
    ]]);
    assert_eq!(
        engine2.discover(&mut second).unwrap_err(),
        DiscoveryError::NoStreamFound
    );
}

#[test]
fn no_traffic_means_no_stream_found() {
    let fetcher = MapFetcher::default();
    let engine = DiscoveryEngine::new(budget(3), no_subs(), &fetcher, new_claimed_set());
    let mut session = ScriptedSession::new(vec![vec![
        TrafficEntry::completed("https://cdn/v/seg-1.ts"),
        TrafficEntry::completed("https://cdn/v/thumbnail.m3u8"),
    ]]);

    let err = engine.discover(&mut session).unwrap_err();
    assert_eq!(err, DiscoveryError::NoStreamFound);
}

#[test]
fn single_language_matched_caption_selected_without_prompt() {
    let fetcher = MapFetcher::default()
        .with("https://cdn/c/track-a.vtt", FRENCH_BODY)
        .with("https://cdn/c/track-b.vtt", ENGLISH_BODY)
        .with("https://cdn/c/track-c.vtt", FRENCH_BODY);
    let engine = DiscoveryEngine::new(
        budget(3),
        SubtitleConfig::default(),
        &fetcher,
        new_claimed_set(),
    );
    let mut session = ScriptedSession::new(vec![vec![
        TrafficEntry::completed("https://cdn/v/master.m3u8"),
        TrafficEntry::completed("https://cdn/c/track-a.vtt"),
        TrafficEntry::completed("https://cdn/c/track-b.vtt"),
        TrafficEntry::completed("https://cdn/c/track-c.vtt"),
    ]]);

    let out = engine.discover(&mut session).unwrap();
    assert_eq!(out.subtitle.as_deref(), Some("https://cdn/c/track-b.vtt"));
    assert_eq!(out.subtitle_candidates, vec!["https://cdn/c/track-b.vtt".to_string()]);
}

#[test]
fn other_language_markers_skip_probe_entirely() {
    // The ger-marked URL never even gets fetched; a missing canned body
    // would otherwise error the probe.
    let fetcher = MapFetcher::default().with("https://cdn/c/track-en.vtt", ENGLISH_BODY);
    let engine = DiscoveryEngine::new(
        budget(3),
        SubtitleConfig::default(),
        &fetcher,
        new_claimed_set(),
    );
    let mut session = ScriptedSession::new(vec![vec![
        TrafficEntry::completed("https://cdn/v/master.m3u8"),
        TrafficEntry::completed("https://cdn/c/track-ger.vtt"),
        TrafficEntry::completed("https://cdn/c/track-en.vtt"),
    ]]);

    let out = engine.discover(&mut session).unwrap();
    assert_eq!(out.subtitle.as_deref(), Some("https://cdn/c/track-en.vtt"));
}

#[test]
fn required_captions_turn_missing_into_failure() {
    let fetcher = MapFetcher::default();
    let subtitles = SubtitleConfig {
        required: true,
        ..SubtitleConfig::default()
    };
    let engine = DiscoveryEngine::new(budget(2), subtitles, &fetcher, new_claimed_set());
    let mut session = ScriptedSession::new(vec![vec![
        TrafficEntry::completed("https://cdn/v/master.m3u8"),
    ]]);

    assert_eq!(
        engine.discover(&mut session).unwrap_err(),
        DiscoveryError::NoCaptionsFound
    );
}

#[test]
fn missing_captions_are_a_soft_outcome() {
    let fetcher = MapFetcher::default();
    let engine = DiscoveryEngine::new(
        budget(2),
        SubtitleConfig::default(),
        &fetcher,
        new_claimed_set(),
    );
    let mut session = ScriptedSession::new(vec![vec![
        TrafficEntry::completed("https://cdn/v/master.m3u8"),
    ]]);

    let out = engine.discover(&mut session).unwrap();
    assert_eq!(out.primary.url, "https://cdn/v/master.m3u8");
    assert!(out.subtitle.is_none());
    assert!(out.subtitle_candidates.is_empty());
}
