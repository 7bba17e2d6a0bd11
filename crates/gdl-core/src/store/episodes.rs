//! Episode row operations: lazy creation, status advance, reconciliation.

use anyhow::Result;
use sqlx::Row;

use super::db::JobStore;
use super::types::{EpisodeRecord, EpisodeStatus, JobId, StageData};

fn episode_from_row(row: &sqlx::sqlite::SqliteRow) -> EpisodeRecord {
    let status: String = row.get("status");
    let stage_data: Option<String> = row.get("stage_data");
    EpisodeRecord {
        id: row.get("id"),
        job_id: row.get("job_id"),
        number: row.get("number"),
        title: row.get("title"),
        status: EpisodeStatus::from_str(&status),
        progress_percent: row.get("progress_percent"),
        stage_data: stage_data
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|s| serde_json::from_str(s).ok()),
        log_file: row.get("log_file"),
        error_message: row.get("error_message"),
    }
}

impl JobStore {
    /// Create an episode row the first time it is announced, or return the
    /// existing one. `UNIQUE (job_id, number)` makes the insert race-free.
    pub async fn upsert_episode(
        &self,
        job_id: JobId,
        number: i64,
        title: Option<&str>,
    ) -> Result<EpisodeRecord> {
        sqlx::query(
            r#"
            INSERT INTO episodes (job_id, number, title, status)
            VALUES (?1, ?2, ?3, 'pending')
            ON CONFLICT (job_id, number) DO UPDATE SET title = COALESCE(excluded.title, title)
            "#,
        )
        .bind(job_id)
        .bind(number)
        .bind(title)
        .execute(&self.pool)
        .await?;

        self.get_episode(job_id, number)
            .await?
            .ok_or_else(|| anyhow::anyhow!("episode {job_id}/{number} vanished after upsert"))
    }

    /// Fetch one episode by job and episode number.
    pub async fn get_episode(&self, job_id: JobId, number: i64) -> Result<Option<EpisodeRecord>> {
        let row = sqlx::query(r#"SELECT * FROM episodes WHERE job_id = ?1 AND number = ?2"#)
            .bind(job_id)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(episode_from_row))
    }

    /// All episodes of a job in episode-number order.
    pub async fn list_episodes(&self, job_id: JobId) -> Result<Vec<EpisodeRecord>> {
        let rows = sqlx::query(r#"SELECT * FROM episodes WHERE job_id = ?1 ORDER BY number ASC"#)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(episode_from_row).collect())
    }

    /// Advance an episode's status. The caller is expected to have checked
    /// `can_advance_to`; the WHERE guard additionally refuses to touch
    /// terminal rows so a late line can never resurrect a finished episode.
    pub async fn set_episode_status(
        &self,
        job_id: JobId,
        number: i64,
        status: EpisodeStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let percent: i64 = if status == EpisodeStatus::Complete { 100 } else { -1 };
        let r = sqlx::query(
            r#"
            UPDATE episodes
            SET status = ?1,
                error_message = COALESCE(?2, error_message),
                progress_percent = MAX(progress_percent, ?3)
            WHERE job_id = ?4 AND number = ?5 AND status NOT IN ('complete', 'failed')
            "#,
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(percent)
        .bind(job_id)
        .bind(number)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// Store transfer progress and the structured stage fields.
    pub async fn update_episode_progress(
        &self,
        job_id: JobId,
        number: i64,
        percent: i64,
        stage_data: &StageData,
    ) -> Result<()> {
        let json = serde_json::to_string(stage_data)?;
        sqlx::query(
            r#"
            UPDATE episodes
            SET progress_percent = MAX(progress_percent, ?1),
                stage_data = ?2
            WHERE job_id = ?3 AND number = ?4 AND status NOT IN ('complete', 'failed')
            "#,
        )
        .bind(percent)
        .bind(json)
        .bind(job_id)
        .bind(number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record the per-episode log file path.
    pub async fn set_episode_log_file(
        &self,
        job_id: JobId,
        number: i64,
        log_file: &str,
    ) -> Result<()> {
        sqlx::query(r#"UPDATE episodes SET log_file = ?1 WHERE job_id = ?2 AND number = ?3"#)
            .bind(log_file)
            .bind(job_id)
            .bind(number)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// End-of-run reconciliation: force every still-open episode of a job to
    /// Failed so no ambiguous state survives the worker process. Returns the
    /// number of episodes affected.
    pub async fn fail_unfinished_episodes(&self, job_id: JobId, reason: &str) -> Result<u64> {
        let r = sqlx::query(
            r#"
            UPDATE episodes
            SET status = 'failed',
                error_message = ?1
            WHERE job_id = ?2 AND status NOT IN ('complete', 'failed')
            "#,
        )
        .bind(reason)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }
}
