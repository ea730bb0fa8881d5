use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use sentiment_common::{
    AnalysisTask, JobStatus, ScoredItem, SentimentError, SentimentResult, SourceItem,
};

use crate::aggregate::aggregate;
use crate::traits::{JobStore, PostFetcher, SentimentScorer};

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// How one task run ended. Job-level failures are outcomes, not errors:
/// they are already recorded on the job and must not be retried.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(SentimentResult),
    Failed(String),
    /// The job was not in a state this run could act on.
    Skipped(JobStatus),
}

/// Runs one job: fetch, score, aggregate, persist.
pub struct Orchestrator {
    fetcher: Arc<dyn PostFetcher>,
    scorer: Arc<dyn SentimentScorer>,
    store: Arc<dyn JobStore>,
    batch_size: usize,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn PostFetcher>,
        scorer: Arc<dyn SentimentScorer>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        Self {
            fetcher,
            scorer,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Drive the task's job to a terminal status.
    ///
    /// Returns `Err` only for store failures (and unknown jobs), which the
    /// caller treats as retryable. Everything that goes wrong while fetching
    /// or scoring ends up on the job as `failed` with a message.
    pub async fn run(&self, task: &AnalysisTask) -> Result<RunOutcome> {
        let job = self
            .store
            .get(task.job_id)
            .await?
            .ok_or(SentimentError::NotFound(task.job_id))?;

        if job.status.is_terminal() {
            info!(job_id = %job.id, status = %job.status, "Job already finished, skipping");
            return Ok(RunOutcome::Skipped(job.status));
        }

        if !self.store.mark_in_progress(job.id).await? {
            warn!(job_id = %job.id, status = %job.status, "Job could not be moved to in_progress, skipping");
            return Ok(RunOutcome::Skipped(job.status));
        }

        info!(
            job_id = %job.id,
            topic = task.topic.as_str(),
            max_tweets = task.max_tweets,
            attempt = task.attempts,
            "Analysis started"
        );

        match self.analyze(&task.topic, task.max_tweets).await {
            Ok(result) => {
                if !self.store.mark_completed(job.id, &result).await? {
                    warn!(job_id = %job.id, "Result not recorded, job left in_progress by another writer");
                }
                info!(
                    job_id = %job.id,
                    positive = result.positive_percentage,
                    negative = result.negative_percentage,
                    neutral = result.neutral_percentage,
                    analyzed = result.analyzed_tweets,
                    total = result.total_tweets,
                    "Analysis completed"
                );
                Ok(RunOutcome::Completed(result))
            }
            Err(e) => {
                let message = e.to_string();
                warn!(job_id = %job.id, error = message.as_str(), "Analysis failed");
                self.store.mark_failed(job.id, &message).await?;
                Ok(RunOutcome::Failed(message))
            }
        }
    }

    /// Fetch, score and aggregate without touching the job store.
    pub async fn analyze(
        &self,
        topic: &str,
        max_tweets: u32,
    ) -> Result<SentimentResult, SentimentError> {
        let items = self
            .fetcher
            .search(topic, max_tweets)
            .await
            .map_err(|e| match e.downcast::<SentimentError>() {
                Ok(known) => known,
                Err(other) => SentimentError::Fetch(other.to_string()),
            })?;

        if items.is_empty() {
            return Err(SentimentError::NoPosts(topic.to_string()));
        }

        let total = items.len();
        let (scored, last_error) = self.score_all(items).await;
        if scored.is_empty() {
            return Err(SentimentError::Scoring {
                attempted: total,
                last_error: last_error.unwrap_or_else(|| "no scores returned".to_string()),
            });
        }
        if scored.len() < total {
            warn!(
                topic,
                total,
                analyzed = scored.len(),
                "Some posts could not be scored and were skipped"
            );
        }

        Ok(aggregate(total, &scored))
    }

    /// Score items batch by batch. Items whose scoring fails are dropped;
    /// the last failure message is returned alongside the survivors.
    async fn score_all(&self, items: Vec<SourceItem>) -> (Vec<ScoredItem>, Option<String>) {
        let mut scored = Vec::with_capacity(items.len());
        let mut last_error = None;

        for chunk in items.chunks(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(|i| i.text.clone()).collect();
            let mut results = self.scorer.score_batch(&texts).await;
            if results.len() != chunk.len() {
                warn!(
                    expected = chunk.len(),
                    got = results.len(),
                    "Scorer returned a misaligned batch"
                );
                results.resize_with(chunk.len(), || Err(anyhow!("no score returned for post")));
            }

            for (item, result) in chunk.iter().zip(results) {
                match result {
                    Ok(sentiment) => scored.push(ScoredItem {
                        item: item.clone(),
                        sentiment,
                    }),
                    Err(e) => {
                        warn!(item_id = item.id.as_str(), error = %e, "Scoring failed for post");
                        last_error = Some(e.to_string());
                    }
                }
            }
        }

        (scored, last_error)
    }
}
