use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use sentiment_common::{AnalysisTask, FailOutcome, TaskState};
use sentiment_engine::TaskQueue;

/// Task queue on `analysis_tasks`. Consumers claim rows with
/// `FOR UPDATE SKIP LOCKED`, so any number of workers can poll one table.
#[derive(Clone)]
pub struct PgTaskQueue {
    pool: PgPool,
}

impl PgTaskQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    job_id: Uuid,
    topic: String,
    max_tweets: i32,
    attempts: i32,
    max_attempts: i32,
    claim_id: Option<Uuid>,
}

impl TryFrom<TaskRow> for AnalysisTask {
    type Error = anyhow::Error;

    fn try_from(row: TaskRow) -> Result<Self> {
        Ok(AnalysisTask {
            id: row.id,
            job_id: row.job_id,
            topic: row.topic,
            max_tweets: u32::try_from(row.max_tweets)?,
            attempts: u32::try_from(row.attempts)?,
            max_attempts: u32::try_from(row.max_attempts)?,
            claim_id: row.claim_id,
        })
    }
}

#[async_trait]
impl TaskQueue for PgTaskQueue {
    async fn enqueue(&self, task: &AnalysisTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analysis_tasks (id, job_id, topic, max_tweets, state, attempts, max_attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(task.id)
        .bind(task.job_id)
        .bind(&task.topic)
        .bind(i32::try_from(task.max_tweets)?)
        .bind(TaskState::Queued.as_str())
        .bind(i32::try_from(task.attempts)?)
        .bind(i32::try_from(task.max_attempts)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<AnalysisTask>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            UPDATE analysis_tasks
            SET state = 'running',
                claimed_at = now(),
                claim_id = $1,
                attempts = attempts + 1
            WHERE id = (
                SELECT id
                FROM analysis_tasks
                WHERE state = 'queued'
                ORDER BY enqueued_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, job_id, topic, max_tweets, attempts, max_attempts, claim_id
            "#,
        )
        .bind(Uuid::new_v4())
        .fetch_optional(&self.pool)
        .await?;

        row.map(AnalysisTask::try_from).transpose()
    }

    async fn complete(&self, task: &AnalysisTask) -> Result<bool> {
        let done = sqlx::query(
            r#"
            UPDATE analysis_tasks
            SET state = 'done', claimed_at = NULL, claim_id = NULL, finished_at = now()
            WHERE id = $1 AND state = 'running' AND claim_id = $2
            "#,
        )
        .bind(task.id)
        .bind(task.claim_id)
        .execute(&self.pool)
        .await?;

        Ok(done.rows_affected() == 1)
    }

    async fn fail(&self, task: &AnalysisTask, error: &str) -> Result<FailOutcome> {
        let state = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE analysis_tasks
            SET state = CASE WHEN attempts < max_attempts THEN 'queued' ELSE 'failed' END,
                finished_at = CASE WHEN attempts < max_attempts THEN NULL ELSE now() END,
                claimed_at = NULL,
                claim_id = NULL,
                last_error = $3
            WHERE id = $1 AND state = 'running' AND claim_id = $2
            RETURNING state
            "#,
        )
        .bind(task.id)
        .bind(task.claim_id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match state {
            Some(state) if state == TaskState::Queued.as_str() => FailOutcome::Requeued,
            Some(_) => FailOutcome::Exhausted,
            None => FailOutcome::ClaimLost,
        })
    }

    async fn requeue_stale(&self, lease: Duration) -> Result<u64> {
        let requeued = sqlx::query_scalar::<_, i64>(
            r#"
            WITH stale AS (
                UPDATE analysis_tasks
                SET state = CASE WHEN attempts < max_attempts THEN 'queued' ELSE 'failed' END,
                    finished_at = CASE WHEN attempts < max_attempts THEN NULL ELSE now() END,
                    claimed_at = NULL,
                    claim_id = NULL,
                    last_error = 'lease expired'
                WHERE state = 'running'
                  AND claimed_at < now() - make_interval(secs => $1)
                RETURNING job_id, state
            ),
            abandoned AS (
                UPDATE analysis_jobs j
                SET status = 'failed',
                    error_message = 'Analysis abandoned: worker lease expired on the final attempt',
                    completed_at = now()
                FROM stale
                WHERE j.id = stale.job_id
                  AND stale.state = 'failed'
                  AND j.status IN ('pending', 'in_progress')
                RETURNING j.id
            )
            SELECT COUNT(*) FROM stale WHERE state = 'queued'
            "#,
        )
        .bind(lease.as_secs_f64())
        .fetch_one(&self.pool)
        .await?;

        Ok(requeued.max(0) as u64)
    }
}
