use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Per-episode stream discovery budgets (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Maximum number of passes over the observed traffic per episode.
    pub attempt_cap: u32,
    /// Attempt numbers at which the page is reloaded to re-trigger the player.
    pub refresh_attempts: Vec<u32>,
    /// Seconds to sleep between passes.
    pub pass_delay_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            attempt_cap: 60,
            refresh_attempts: vec![20, 40],
            pass_delay_secs: 1,
        }
    }
}

/// Subtitle selection parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    /// Target caption language (ISO 639-1).
    pub language: String,
    /// URL markers that identify captions in some other language.
    pub other_language_markers: Vec<String>,
    /// Skip caption discovery and download entirely.
    pub disabled: bool,
    /// Treat a missing caption stream as a hard failure instead of a soft
    /// warning.
    #[serde(default)]
    pub required: bool,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            other_language_markers: [
                "ita", "jpn", "pol", "por", "ara", "chi", "cze", "dan", "dut", "fin",
                "fre", "ger", "gre", "heb", "hun", "ind", "kor", "nob", "rum", "rus",
                "tha", "vie", "swe", "spa", "tur", "ces", "bul", "zho", "nld", "fra",
                "deu", "ell", "hin", "hrv", "msa", "may", "ron", "slk", "slo", "ukr",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            disabled: false,
            required: false,
        }
    }
}

/// Global configuration loaded from `~/.config/gdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GdlConfig {
    /// Maximum jobs running at once (each is its own worker process).
    pub max_concurrent_jobs: usize,
    /// Scheduler poll interval in seconds.
    pub poll_interval_secs: u64,
    /// Seconds to wait after a graceful termination signal before force-killing.
    pub cancel_grace_secs: u64,
    /// Concurrent episode tasks inside one worker process.
    pub episode_workers: usize,
    /// Directory downloads are written to.
    pub download_dir: PathBuf,
    /// Worker program to spawn per job (None = this executable's `worker` subcommand).
    #[serde(default)]
    pub worker_program: Option<PathBuf>,
    /// Number of job log files kept by the retention sweep.
    pub log_retention: usize,
    /// Optional discovery budgets; if missing, built-in defaults are used.
    #[serde(default)]
    pub discovery: Option<DiscoveryConfig>,
    /// Optional subtitle parameters; if missing, built-in defaults are used.
    #[serde(default)]
    pub subtitles: Option<SubtitleConfig>,
}

impl Default for GdlConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 3,
            poll_interval_secs: 2,
            cancel_grace_secs: 5,
            episode_workers: 3,
            download_dir: PathBuf::from("/downloads"),
            worker_program: None,
            log_retention: 100,
            discovery: None,
            subtitles: None,
        }
    }
}

impl GdlConfig {
    pub fn discovery(&self) -> DiscoveryConfig {
        self.discovery.clone().unwrap_or_default()
    }

    pub fn subtitles(&self) -> SubtitleConfig {
        self.subtitles.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("gdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: GdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = GdlConfig::default();
        assert_eq!(cfg.max_concurrent_jobs, 3);
        assert_eq!(cfg.poll_interval_secs, 2);
        assert_eq!(cfg.cancel_grace_secs, 5);
        assert_eq!(cfg.episode_workers, 3);
        assert_eq!(cfg.log_retention, 100);
    }

    #[test]
    fn default_discovery_budgets() {
        let d = GdlConfig::default().discovery();
        assert_eq!(d.attempt_cap, 60);
        assert_eq!(d.refresh_attempts, vec![20, 40]);
        assert_eq!(d.pass_delay_secs, 1);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = GdlConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: GdlConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_concurrent_jobs, cfg.max_concurrent_jobs);
        assert_eq!(parsed.poll_interval_secs, cfg.poll_interval_secs);
        assert_eq!(parsed.episode_workers, cfg.episode_workers);
        assert_eq!(parsed.download_dir, cfg.download_dir);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_concurrent_jobs = 1
            poll_interval_secs = 10
            cancel_grace_secs = 2
            episode_workers = 6
            download_dir = "/srv/media"
            log_retention = 20

            [discovery]
            attempt_cap = 5
            refresh_attempts = [2]
            pass_delay_secs = 0
        "#;
        let cfg: GdlConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent_jobs, 1);
        assert_eq!(cfg.episode_workers, 6);
        assert_eq!(cfg.download_dir, PathBuf::from("/srv/media"));
        let d = cfg.discovery();
        assert_eq!(d.attempt_cap, 5);
        assert_eq!(d.refresh_attempts, vec![2]);
        assert!(cfg.subtitles.is_none());
        assert_eq!(cfg.subtitles().language, "en");
    }

    #[test]
    fn subtitle_defaults_filter_other_languages() {
        let s = GdlConfig::default().subtitles();
        assert_eq!(s.language, "en");
        assert!(s.other_language_markers.iter().any(|m| m == "jpn"));
        assert!(!s.disabled);
    }
}
