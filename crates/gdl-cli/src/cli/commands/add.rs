//! `gdl add <url>` – enqueue a new download job.

use anyhow::Result;
use gdl_core::request::JobRequest;
use gdl_core::store::JobStore;

pub async fn run_add(
    store: &JobStore,
    url: &str,
    profile: Option<&str>,
    extra_args: Option<&str>,
) -> Result<()> {
    // Admission validation happens here; a rejected request never creates a
    // job row.
    let request = JobRequest::new(url, profile, extra_args)?;
    let id = store.create_job(&request).await?;
    println!("Added job {id} for URL: {url}");
    Ok(())
}
