//! The ordered pattern table.
//!
//! Each rule couples a regex to a constructor for a [`LineEvent`]. The table
//! is order-sensitive by design: it mirrors the priority in which worker and
//! downloader lines must be interpreted, and the first matching rule wins.
//! The phrasing is coupled to the worker's exact output; changing a printed
//! line means changing its rule and the tests together.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::store::StageData;

/// A recognized worker/downloader output line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// `Getting Episode <n> - <title> from <url>`
    EpisodeStarted { number: i64, title: String },
    /// `Episode <n>: Starting download...`
    DownloadStarted { number: i64 },
    /// `Episode <n>: Download completed!`
    DownloadCompleted { number: i64 },
    /// `Episode <n>: No m3u8 file found, skipping download`
    NoStreamFound { number: i64 },
    /// `Episode <n>: Stream found`
    StreamFound { number: i64 },
    /// `[download] Destination: <path>`; episode number recovered from the
    /// `sNNeNN` token in the filename when present.
    Destination { number: Option<i64>, subtitle: bool },
    /// `[download]  45.2% of ~ 123.45MiB at 1.23MiB/s ETA 00:45 (frag 12/100)`
    TransferProgress { data: StageData },
    /// `[Merger] Merging formats into "<path>"`
    Merging,
    /// `Episode <n>: Downloading subtitles...`
    SubtitlesStarted { number: i64 },
    /// `Episode <n>: No VTT stream found` (captions skipped for this episode)
    SubtitlesSkipped { number: i64 },
}

struct Rule {
    re: Regex,
    build: fn(&Captures) -> Option<LineEvent>,
}

fn num(caps: &Captures, i: usize) -> Option<i64> {
    caps.get(i)?.as_str().parse().ok()
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Rule {
                re: Regex::new(r"^Getting Episode (\d+) - (.*?) from (\S+)$").unwrap(),
                build: |c| {
                    Some(LineEvent::EpisodeStarted {
                        number: num(c, 1)?,
                        title: c.get(2)?.as_str().trim().to_string(),
                    })
                },
            },
            Rule {
                re: Regex::new(r"^Episode (\d+): Starting download\.\.\.").unwrap(),
                build: |c| Some(LineEvent::DownloadStarted { number: num(c, 1)? }),
            },
            Rule {
                re: Regex::new(r"^Episode (\d+): Download completed!").unwrap(),
                build: |c| Some(LineEvent::DownloadCompleted { number: num(c, 1)? }),
            },
            Rule {
                re: Regex::new(r"^Episode (\d+): No m3u8 file found, skipping download").unwrap(),
                build: |c| Some(LineEvent::NoStreamFound { number: num(c, 1)? }),
            },
            Rule {
                re: Regex::new(r"^Episode (\d+): Stream found").unwrap(),
                build: |c| Some(LineEvent::StreamFound { number: num(c, 1)? }),
            },
            Rule {
                re: Regex::new(r"^\[download\] Destination: (.+)$").unwrap(),
                build: |c| {
                    let path = c.get(1)?.as_str();
                    Some(LineEvent::Destination {
                        number: episode_number_from_path(path),
                        subtitle: path.trim_end().ends_with(".vtt"),
                    })
                },
            },
            Rule {
                re: Regex::new(
                    r"^\[download\]\s+([\d.]+)% of\s+~?\s*(\S+)(?: at\s+(\S+))?(?: ETA ([\d:]+|Unknown))?(?: \(frag (\d+/\d+)\))?",
                )
                .unwrap(),
                build: |c| {
                    Some(LineEvent::TransferProgress {
                        data: StageData {
                            percent: c.get(1)?.as_str().parse().ok(),
                            size: c.get(2).map(|m| m.as_str().to_string()),
                            speed: c.get(3).map(|m| m.as_str().to_string()),
                            eta: c.get(4).map(|m| m.as_str().to_string()),
                            fragment: c.get(5).map(|m| m.as_str().to_string()),
                        },
                    })
                },
            },
            Rule {
                re: Regex::new(r"^\[(?:Merger|ffmpeg)\] Merging formats into").unwrap(),
                build: |_| Some(LineEvent::Merging),
            },
            Rule {
                re: Regex::new(r"^Episode (\d+): Downloading subtitles\.\.\.").unwrap(),
                build: |c| Some(LineEvent::SubtitlesStarted { number: num(c, 1)? }),
            },
            Rule {
                re: Regex::new(r"^Episode (\d+): No VTT stream found").unwrap(),
                build: |c| Some(LineEvent::SubtitlesSkipped { number: num(c, 1)? }),
            },
        ]
    })
}

/// Match one ANSI-stripped line against the table. `None` is the normal
/// outcome for the many lines the table does not know.
pub fn match_line(line: &str) -> Option<LineEvent> {
    let line = line.trim_end();
    for rule in rules() {
        if let Some(caps) = rule.re.captures(line) {
            if let Some(event) = (rule.build)(&caps) {
                return Some(event);
            }
        }
    }
    None
}

/// Pull the episode number out of a `… - sNNeMM - …` output filename.
fn episode_number_from_path(path: &str) -> Option<i64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"s\d{2,}e(\d{2,})").expect("episode token regex"));
    re.captures(path)?.get(1)?.as_str().parse().ok()
}
