//! Caption-candidate classification and language probing.
//!
//! URL naming is unreliable, so a candidate that survives the URL filters is
//! additionally fetched and language-detected; only bodies whose detected
//! language equals the configured target count as found.

use std::time::Duration;

use crate::config::SubtitleConfig;

use super::fetch::ResourceFetcher;
use super::session::TrafficEntry;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// URL-level filter: caption extension, not a thumbnail track, and no
/// other-language marker.
pub(super) fn looks_like_subtitle(uri: &str, cfg: &SubtitleConfig) -> bool {
    uri.contains(".vtt")
        && !uri.contains("thumbnail")
        && !cfg.other_language_markers.iter().any(|m| uri.contains(m))
}

/// Fetch the candidate and check its detected language against the target.
/// Any fetch or detection failure disqualifies the candidate silently.
pub(super) fn probe_language<F: ResourceFetcher>(
    fetcher: &F,
    entry: &TrafficEntry,
    target: &str,
) -> bool {
    let Ok(body) = fetcher.fetch_text(&entry.url, &entry.headers, PROBE_TIMEOUT) else {
        return false;
    };
    match whatlang::detect_lang(&body) {
        Some(lang) => lang_matches(lang, target),
        None => false,
    }
}

/// Compare a detected language against the configured target. The config
/// uses two-letter codes ("en"); whatlang reports ISO 639-3 ("eng").
pub(super) fn lang_matches(lang: whatlang::Lang, target: &str) -> bool {
    let code = lang.code();
    code == target || code.starts_with(target) || lang.eng_name().to_lowercase().starts_with(target)
}

/// Pick one caption URL from the language-matched candidates: prefer a URL
/// that carries the target-language marker itself, otherwise the first seen.
/// Non-interactive contexts never prompt.
pub(super) fn select_subtitle(candidates: &[String], target: &str) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    candidates
        .iter()
        .find(|u| u.contains(target))
        .or_else(|| candidates.first())
        .cloned()
}
