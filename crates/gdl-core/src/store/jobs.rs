//! Job row operations: create, read, claim, progress, finalize.

use anyhow::Result;
use sqlx::Row;

use crate::request::JobRequest;

use super::db::{unix_timestamp, JobStore};
use super::types::{JobId, JobRecord, JobStage, JobStatus};

fn job_from_row(row: &sqlx::sqlite::SqliteRow) -> JobRecord {
    let status: String = row.get("status");
    let stage: String = row.get("stage");
    JobRecord {
        id: row.get("id"),
        url: row.get("url"),
        profile: row.get("profile"),
        extra_args: row.get("extra_args"),
        status: JobStatus::from_str(&status),
        stage: JobStage::from_str(&stage),
        progress_percent: row.get("progress_percent"),
        progress_text: row.get("progress_text"),
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        finished_at: row.get("finished_at"),
        pid: row.get("pid"),
        log_file: row.get("log_file"),
        error_message: row.get("error_message"),
    }
}

impl JobStore {
    /// Insert a new queued job from a validated request.
    pub async fn create_job(&self, request: &JobRequest) -> Result<JobId> {
        let now = unix_timestamp();
        let id = sqlx::query(
            r#"
            INSERT INTO jobs (url, profile, extra_args, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&request.url)
        .bind(&request.profile)
        .bind(&request.extra_args)
        .bind(JobStatus::Queued.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// Fetch a single job row.
    pub async fn get_job(&self, id: JobId) -> Result<Option<JobRecord>> {
        let row = sqlx::query(r#"SELECT * FROM jobs WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(job_from_row))
    }

    /// List all jobs, newest first.
    pub async fn list_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(r#"SELECT * FROM jobs ORDER BY created_at DESC, id DESC"#)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(job_from_row).collect())
    }

    /// All queued or running jobs, oldest first (FIFO admission order).
    pub async fn active_jobs(&self) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM jobs
            WHERE status IN ('queued', 'running')
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(job_from_row).collect())
    }

    /// Atomically claim a queued job. The single conditional UPDATE is the
    /// only synchronization point between racing scheduler ticks: whichever
    /// tick's UPDATE lands first affects the row; everyone else sees zero
    /// rows affected and skips.
    pub async fn claim_job(&self, id: JobId) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'running',
                started_at = ?1
            WHERE id = ?2 AND status = 'queued'
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Record process details once a claimed job's worker has been spawned.
    pub async fn start_job(&self, id: JobId, pid: i64, log_file: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET pid = ?1,
                log_file = ?2,
                stage = ?3,
                progress_percent = MAX(progress_percent, ?4)
            WHERE id = ?5
            "#,
        )
        .bind(pid)
        .bind(log_file)
        .bind(JobStage::Init.as_str())
        .bind(JobStage::Init.percent())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Update stage/percent/text. `MAX()` keeps progress_percent monotonic
    /// within a run regardless of line ordering.
    pub async fn update_job_progress(
        &self,
        id: JobId,
        percent: i64,
        stage: Option<JobStage>,
        text: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET progress_percent = MAX(progress_percent, ?1),
                stage = COALESCE(?2, stage),
                progress_text = COALESCE(?3, progress_text)
            WHERE id = ?4
            "#,
        )
        .bind(percent)
        .bind(stage.map(JobStage::as_str))
        .bind(text)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Finalize a running job. Success forces percent 100 and stage Done;
    /// failure leaves progress where it stopped and records the error.
    pub async fn finish_job(
        &self,
        id: JobId,
        success: bool,
        error_message: Option<&str>,
    ) -> Result<()> {
        let now = unix_timestamp();
        if success {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'success',
                    stage = 'done',
                    progress_percent = 100,
                    finished_at = ?1,
                    error_message = NULL
                WHERE id = ?2 AND status = 'running'
                "#,
            )
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'failed',
                    finished_at = ?1,
                    error_message = ?2
                WHERE id = ?3 AND status = 'running'
                "#,
            )
            .bind(now)
            .bind(error_message)
            .bind(id)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Mark a job canceled. Allowed from Queued (never started) and Running
    /// (process terminated by the scheduler); terminal rows are untouched.
    /// Returns false when nothing was updated.
    pub async fn cancel_job(&self, id: JobId) -> Result<bool> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'canceled',
                finished_at = ?1
            WHERE id = ?2 AND status IN ('queued', 'running')
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Normalize any job left in `running` to `failed` (e.g. after a crash
    /// of the scheduler process). Call before scheduling so stale rows don't
    /// count against the concurrency limit forever.
    pub async fn recover_running_jobs(&self) -> Result<u64> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                finished_at = ?1,
                error_message = 'orphaned by scheduler restart'
            WHERE status = 'running'
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Permanently remove a job row and its episodes.
    pub async fn remove_job(&self, id: JobId) -> Result<()> {
        sqlx::query(r#"DELETE FROM episodes WHERE job_id = ?1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        sqlx::query(r#"DELETE FROM jobs WHERE id = ?1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
