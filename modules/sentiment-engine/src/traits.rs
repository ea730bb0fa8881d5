// Trait boundaries for the analysis pipeline.
//
// PostFetcher, SentimentScorer, JobStore and TaskQueue each have one
// production implementation (Apify, Hugging Face, Postgres, Postgres) and one
// fake in `testing`, so the orchestrator, worker and API run in tests with no
// network and no database.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use sentiment_common::{AnalysisTask, FailOutcome, Job, Sentiment, SentimentResult, SourceItem};

// ---------------------------------------------------------------------------
// PostFetcher
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PostFetcher: Send + Sync {
    /// Recent posts about `topic`, cleaned, at most `max_items`.
    async fn search(&self, topic: &str, max_items: u32) -> Result<Vec<SourceItem>>;
}

// ---------------------------------------------------------------------------
// SentimentScorer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, text: &str) -> Result<Sentiment>;

    /// Score many texts. The output is index-aligned with `texts`; one bad
    /// text yields one `Err` entry, not a failed batch.
    async fn score_batch(&self, texts: &[String]) -> Vec<Result<Sentiment>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.score(text).await);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// JobStore
// ---------------------------------------------------------------------------

/// Job persistence. The `mark_*` methods apply a status transition only if it
/// is legal from the job's current status and return whether it was applied.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &Job) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>>;

    async fn mark_in_progress(&self, id: Uuid) -> Result<bool>;

    async fn mark_completed(&self, id: Uuid, result: &SentimentResult) -> Result<bool>;

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<bool>;
}

// ---------------------------------------------------------------------------
// TaskQueue
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: &AnalysisTask) -> Result<()>;

    /// Claim the oldest queued task, if any. A claimed task is invisible to
    /// other consumers until completed, failed, or requeued as stale. The
    /// returned task carries a fresh `claim_id`.
    async fn dequeue(&self) -> Result<Option<AnalysisTask>>;

    /// Mark a claimed task done. Returns `false` without touching the row if
    /// `task.claim_id` is no longer its current claim.
    async fn complete(&self, task: &AnalysisTask) -> Result<bool>;

    /// Record a failed attempt on a claimed task. A superseded claim is
    /// ignored and reported as `ClaimLost`.
    async fn fail(&self, task: &AnalysisTask, error: &str) -> Result<FailOutcome>;

    /// Return tasks claimed longer than `lease` ago to the queue. Stale tasks
    /// with no attempts left are failed, along with their job. Returns how
    /// many went back to the queue.
    async fn requeue_stale(&self, lease: Duration) -> Result<u64>;
}
