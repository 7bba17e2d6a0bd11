//! `gdl show <id>` – one job with its episodes.

use anyhow::Result;
use gdl_core::store::JobStore;

pub async fn run_show(store: &JobStore, id: i64) -> Result<()> {
    let Some(job) = store.get_job(id).await? else {
        anyhow::bail!("no such job: {id}");
    };

    println!("Job {}: {}", job.id, job.url);
    println!(
        "  status: {}  stage: {}  progress: {}%",
        job.status.as_str(),
        job.stage.as_str(),
        job.progress_percent
    );
    if let Some(text) = &job.progress_text {
        println!("  {text}");
    }
    if let Some(err) = &job.error_message {
        println!("  error: {err}");
    }
    if let Some(log) = &job.log_file {
        println!("  log: {log}");
    }

    let episodes = store.list_episodes(id).await?;
    if episodes.is_empty() {
        println!("  (no episodes discovered yet)");
        return Ok(());
    }
    println!("  {:<4} {:<22} {:>4} TITLE", "EP", "STATUS", "PCT");
    for ep in episodes {
        println!(
            "  {:<4} {:<22} {:>3}% {}{}",
            ep.number,
            ep.status.as_str(),
            ep.progress_percent,
            ep.title.as_deref().unwrap_or("-"),
            ep.error_message
                .as_deref()
                .map(|e| format!("  [{e}]"))
                .unwrap_or_default()
        );
    }
    Ok(())
}
