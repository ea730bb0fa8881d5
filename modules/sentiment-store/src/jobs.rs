use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use sentiment_common::{Job, JobStatus, SentimentResult};
use sentiment_engine::JobStore;

/// Job rows in `analysis_jobs`.
///
/// Every status change is a single guarded `UPDATE ... WHERE status = ANY(..)`
/// so an illegal transition matches no row instead of overwriting state.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    topic: String,
    status: String,
    max_tweets: i32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<Json<SentimentResult>>,
    error_message: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(Job {
            id: row.id,
            topic: row.topic,
            status: row.status.parse().map_err(|e: String| anyhow!(e))?,
            max_tweets: u32::try_from(row.max_tweets)?,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            result: row.result.map(|Json(r)| r),
            error_message: row.error_message,
        })
    }
}

/// Status names a job may hold right before moving to `next`.
fn from_statuses(next: JobStatus) -> Vec<String> {
    JobStatus::predecessors(next)
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analysis_jobs (id, topic, status, max_tweets, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(job.id)
        .bind(&job.topic)
        .bind(job.status.as_str())
        .bind(i32::try_from(job.max_tweets)?)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, topic, status, max_tweets, created_at, started_at,
                   completed_at, result, error_message
            FROM analysis_jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn mark_in_progress(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET status = 'in_progress',
                started_at = COALESCE(started_at, now())
            WHERE id = $1 AND status = ANY($2)
            "#,
        )
        .bind(id)
        .bind(from_statuses(JobStatus::InProgress))
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn mark_completed(&self, id: Uuid, result: &SentimentResult) -> Result<bool> {
        let done = sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET status = 'completed',
                result = $2,
                completed_at = now()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id)
        .bind(Json(result))
        .bind(from_statuses(JobStatus::Completed))
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<bool> {
        let done = sqlx::query(
            r#"
            UPDATE analysis_jobs
            SET status = 'failed',
                error_message = $2,
                completed_at = now()
            WHERE id = $1 AND status = ANY($3)
            "#,
        )
        .bind(id)
        .bind(error_message)
        .bind(from_statuses(JobStatus::Failed))
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() > 0)
    }
}
