//! External downloader invocation.
//!
//! The fetch tool is a text-oriented child process; its stdout is forwarded
//! line-by-line through the worker's console so the orchestrator's progress
//! pipeline sees `[download]` lines exactly as the tool printed them.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::discover::MediaResource;

use super::console::Console;

/// Fetches a resolved resource to a local file.
pub trait MediaFetcher: Send + Sync {
    fn fetch(&self, resource: &MediaResource, output: &Path, console: &Console) -> Result<()>;
}

/// yt-dlp-style external downloader.
pub struct YtDlpFetcher {
    program: PathBuf,
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
        }
    }
}

impl YtDlpFetcher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MediaFetcher for YtDlpFetcher {
    fn fetch(&self, resource: &MediaResource, output: &Path, console: &Console) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--newline")
            .arg("--no-warnings")
            .arg("--retries")
            .arg("10")
            .arg("--fragment-retries")
            .arg("10")
            .arg("--socket-timeout")
            .arg("60")
            .arg("-f")
            .arg("best")
            .arg("-o")
            .arg(output);
        for (k, v) in &resource.headers {
            cmd.arg("--add-header").arg(format!("{k}:{v}"));
        }
        cmd.arg(&resource.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawn {}", self.program.display()))?;

        // Forward stderr on a helper thread so neither pipe can fill up and
        // stall the child.
        let stderr_console = console.clone();
        let stderr = child.stderr.take();
        let stderr_thread = std::thread::spawn(move || {
            if let Some(stderr) = stderr {
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    stderr_console.line(&line);
                }
            }
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(|l| l.ok()) {
                console.line(&line);
            }
        }

        let status = child.wait().context("wait for fetch tool")?;
        let _ = stderr_thread.join();

        if !status.success() {
            anyhow::bail!(
                "fetch tool exited with {}",
                status.code().map_or_else(|| "signal".to_string(), |c| c.to_string())
            );
        }
        Ok(())
    }
}
