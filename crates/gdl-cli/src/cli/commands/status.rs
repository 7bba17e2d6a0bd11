//! `gdl status` – show status of all jobs.

use anyhow::Result;
use gdl_core::store::JobStore;

pub async fn run_status(store: &JobStore) -> Result<()> {
    let jobs = store.list_jobs().await?;
    if jobs.is_empty() {
        println!("No jobs in database.");
        return Ok(());
    }
    println!(
        "{:<6} {:<10} {:<12} {:>4} {}",
        "ID", "STATUS", "STAGE", "PCT", "URL"
    );
    for j in jobs {
        println!(
            "{:<6} {:<10} {:<12} {:>3}% {}",
            j.id,
            j.status.as_str(),
            j.stage.as_str(),
            j.progress_percent,
            j.url
        );
    }
    Ok(())
}
