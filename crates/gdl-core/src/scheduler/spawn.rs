//! Worker command construction.

use anyhow::Result;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::GdlConfig;
use crate::request::validate_extra_args;
use crate::store::JobRecord;

/// Build the worker invocation for a claimed job.
///
/// Default program is this executable's own `worker` subcommand; deployments
/// can point `worker_program` at any tool that speaks the same output
/// protocol. Extra args were validated at admission but are re-validated
/// here so a hand-edited row can't smuggle anything in.
pub(crate) fn build_worker_command(cfg: &GdlConfig, job: &JobRecord) -> Result<(Command, String)> {
    let program: PathBuf = match &cfg.worker_program {
        Some(p) => p.clone(),
        None => std::env::current_exe()?,
    };

    let mut args: Vec<String> = vec![
        "worker".to_string(),
        "--link".to_string(),
        job.url.clone(),
        "--output-dir".to_string(),
        cfg.download_dir.display().to_string(),
        "--workers".to_string(),
        cfg.episode_workers.to_string(),
    ];
    if let Some(profile) = &job.profile {
        args.push("--profile".to_string());
        args.push(profile.clone());
    }
    if let Some(extra) = &job.extra_args {
        args.extend(validate_extra_args(extra)?);
    }

    let display = std::iter::once(program.display().to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");

    let mut cmd = Command::new(&program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    Ok((cmd, display))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JobStage, JobStatus};

    fn job(url: &str, profile: Option<&str>, extra: Option<&str>) -> JobRecord {
        JobRecord {
            id: 1,
            url: url.to_string(),
            profile: profile.map(str::to_string),
            extra_args: extra.map(str::to_string),
            status: JobStatus::Queued,
            stage: JobStage::Init,
            progress_percent: 0,
            progress_text: None,
            created_at: 0,
            started_at: None,
            finished_at: None,
            pid: None,
            log_file: None,
            error_message: None,
        }
    }

    #[test]
    fn command_line_carries_job_fields() {
        let mut cfg = GdlConfig::default();
        cfg.worker_program = Some(PathBuf::from("/usr/bin/gdl"));
        let (_, display) = build_worker_command(
            &cfg,
            &job("https://example.com/s", Some("hd"), Some("--ep-from 2 --ep-to 4")),
        )
        .unwrap();
        assert_eq!(
            display,
            "/usr/bin/gdl worker --link https://example.com/s --output-dir /downloads \
             --workers 3 --profile hd --ep-from 2 --ep-to 4"
        );
    }

    #[test]
    fn bad_extra_args_fail_spawn() {
        let mut cfg = GdlConfig::default();
        cfg.worker_program = Some(PathBuf::from("/usr/bin/gdl"));
        assert!(build_worker_command(&cfg, &job("https://x", None, Some("--exec rm"))).is_err());
    }
}
