//! Multi-variant manifest resolution.
//!
//! The adopted manifest is usually a multi-variant index rather than a
//! directly playable stream. Scan it for the first embedded entry that is
//! itself a manifest (and not an auxiliary iframe stream) and prefer that,
//! resolved against the index's own URL.

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use super::fetch::ResourceFetcher;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Returns the variant URL to fetch, or the original manifest URL when the
/// scan finds nothing (or the fetch fails; the original is still usable).
pub fn resolve_variant<F: ResourceFetcher>(
    fetcher: &F,
    manifest_url: &str,
    headers: &HashMap<String, String>,
) -> String {
    let body = match fetcher.fetch_text(manifest_url, headers, FETCH_TIMEOUT) {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!("variant scan fetch failed for {manifest_url}: {e}");
            return manifest_url.to_string();
        }
    };

    for line in body.lines() {
        let s = line.trim();
        if s.ends_with(".m3u8") && !s.contains("iframe") {
            if let Ok(base) = Url::parse(manifest_url) {
                if let Ok(joined) = base.join(s) {
                    return joined.to_string();
                }
            }
            return s.to_string();
        }
    }

    manifest_url.to_string()
}
