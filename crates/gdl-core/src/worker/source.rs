//! Episode listing collaborators.
//!
//! Discovering which episodes exist is site-specific scraping and lives
//! outside this crate; the worker only needs the trait. `DirectSource`
//! covers the degenerate case of a link that already points at a single
//! watchable page (or a direct media URL).

use anyhow::Result;

use crate::pool::EpisodeDescriptor;

/// Metadata for the series a job link points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesInfo {
    pub name: String,
    pub season: i64,
}

/// Lists the units of work behind a job link.
pub trait EpisodeSource: Send + Sync {
    fn series(&self, link: &str) -> Result<SeriesInfo>;
    /// Episodes within the requested inclusive range (None = unbounded).
    fn episodes(
        &self,
        link: &str,
        from: Option<i64>,
        to: Option<i64>,
    ) -> Result<Vec<EpisodeDescriptor>>;
}

/// Single-episode source: the link itself is the only unit of work.
pub struct DirectSource;

impl EpisodeSource for DirectSource {
    fn series(&self, link: &str) -> Result<SeriesInfo> {
        Ok(SeriesInfo {
            name: series_name_from_link(link),
            season: 1,
        })
    }

    fn episodes(
        &self,
        link: &str,
        _from: Option<i64>,
        _to: Option<i64>,
    ) -> Result<Vec<EpisodeDescriptor>> {
        let name = series_name_from_link(link);
        Ok(vec![EpisodeDescriptor {
            number: 1,
            title: name,
            url: link.to_string(),
        }])
    }
}

/// Best-effort human name from the last meaningful path segment.
fn series_name_from_link(link: &str) -> String {
    let stripped = link.split(['?', '#']).next().unwrap_or(link);
    let segment = stripped
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("download");
    let cleaned = sanitize_title(&segment.replace(['-', '_'], " "));
    if cleaned.trim().is_empty() {
        "download".to_string()
    } else {
        cleaned.trim().to_string()
    }
}

/// Strip characters that are unsafe in output filenames.
pub(super) fn sanitize_title(raw: &str) -> String {
    const BAD: &[char] = &[
        '-', '.', '/', '\\', '?', '%', '*', '<', '>', '|', '"', '[', ']', ':',
    ];
    raw.chars().filter(|c| !BAD.contains(c)).collect()
}
