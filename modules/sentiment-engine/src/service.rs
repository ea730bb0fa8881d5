use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use sentiment_common::{AnalysisLimits, AnalysisTask, Job, SentimentError};

use crate::traits::{JobStore, TaskQueue};

/// Submit and poll. Shared by the HTTP API and the scheduler.
pub struct AnalysisService {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn TaskQueue>,
    limits: AnalysisLimits,
}

impl AnalysisService {
    pub fn new(store: Arc<dyn JobStore>, queue: Arc<dyn TaskQueue>, limits: AnalysisLimits) -> Self {
        Self {
            store,
            queue,
            limits,
        }
    }

    pub fn limits(&self) -> &AnalysisLimits {
        &self.limits
    }

    /// Check a request and return the trimmed topic and effective post count.
    pub fn validate(
        &self,
        topic: &str,
        max_tweets: Option<i64>,
    ) -> Result<(String, u32), SentimentError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SentimentError::Validation("topic must not be empty".into()));
        }
        if topic.chars().count() > self.limits.max_topic_chars {
            return Err(SentimentError::Validation(format!(
                "topic must be at most {} characters",
                self.limits.max_topic_chars
            )));
        }

        let max_tweets = match max_tweets {
            None => self.limits.default_max_tweets,
            Some(n) if n >= 1 && n <= i64::from(self.limits.max_tweets) => n as u32,
            Some(_) => {
                return Err(SentimentError::Validation(format!(
                    "max_tweets must be between 1 and {}",
                    self.limits.max_tweets
                )))
            }
        };

        Ok((topic.to_string(), max_tweets))
    }

    /// Create a pending job and queue it for a worker.
    ///
    /// If the job row is written but the task cannot be queued, the job is
    /// marked failed so it never sits in `pending` forever.
    pub async fn submit(&self, topic: &str, max_tweets: Option<i64>) -> Result<Job, SentimentError> {
        let (topic, max_tweets) = self.validate(topic, max_tweets)?;
        let job = Job::new_pending(topic, max_tweets);

        self.store
            .create(&job)
            .await
            .map_err(|e| SentimentError::Database(e.to_string()))?;

        let task = AnalysisTask::for_job(&job, self.limits.task_max_attempts);
        if let Err(e) = self.queue.enqueue(&task).await {
            error!(job_id = %job.id, error = %e, "Failed to enqueue analysis task");
            let message = format!("Failed to enqueue analysis task: {e}");
            if let Err(mark_err) = self.store.mark_failed(job.id, &message).await {
                error!(job_id = %job.id, error = %mark_err, "Failed to mark job as failed");
            }
            return Err(SentimentError::Database(message));
        }

        info!(
            job_id = %job.id,
            topic = job.topic.as_str(),
            max_tweets = job.max_tweets,
            "Analysis job created"
        );
        Ok(job)
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, SentimentError> {
        self.store
            .get(id)
            .await
            .map_err(|e| SentimentError::Database(e.to_string()))?
            .ok_or(SentimentError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryJobStore, InMemoryTaskQueue};
    use sentiment_common::JobStatus;

    fn service_with(queue: InMemoryTaskQueue) -> (AnalysisService, Arc<InMemoryJobStore>, Arc<InMemoryTaskQueue>) {
        let store = Arc::new(InMemoryJobStore::new());
        let queue = Arc::new(queue);
        let service = AnalysisService::new(store.clone(), queue.clone(), AnalysisLimits::default());
        (service, store, queue)
    }

    #[test]
    fn validation_rules() {
        let (service, _, _) = service_with(InMemoryTaskQueue::new());

        assert_eq!(service.validate("  rust  ", None).unwrap(), ("rust".to_string(), 10));
        assert_eq!(service.validate("rust", Some(1000)).unwrap().1, 1000);
        assert_eq!(service.validate("x", Some(1)).unwrap().1, 1);

        assert!(service.validate("", None).is_err());
        assert!(service.validate("   ", None).is_err());
        assert!(service.validate(&"a".repeat(201), None).is_err());
        assert!(service.validate(&"a".repeat(200), None).is_ok());
        assert!(service.validate("rust", Some(0)).is_err());
        assert!(service.validate("rust", Some(-5)).is_err());
        assert!(service.validate("rust", Some(1001)).is_err());
    }

    #[test]
    fn topic_length_counts_characters_not_bytes() {
        let (service, _, _) = service_with(InMemoryTaskQueue::new());
        assert!(service.validate(&"é".repeat(200), None).is_ok());
    }

    #[tokio::test]
    async fn submit_creates_pending_job_and_task() {
        let (service, store, queue) = service_with(InMemoryTaskQueue::new());

        let job = service.submit("rust", Some(25)).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.max_tweets, 25);

        let stored = store.job(job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Pending);

        let tasks = queue.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].job_id, job.id);
        assert_eq!(tasks[0].max_attempts, 3);
    }

    #[tokio::test]
    async fn invalid_submit_writes_nothing() {
        let (service, store, queue) = service_with(InMemoryTaskQueue::new());
        let err = service.submit("", None).await.unwrap_err();
        assert!(matches!(err, SentimentError::Validation(_)));
        assert_eq!(store.len(), 0);
        assert!(queue.tasks().is_empty());
    }

    #[tokio::test]
    async fn enqueue_failure_marks_job_failed() {
        let (service, store, _) = service_with(InMemoryTaskQueue::rejecting());

        let err = service.submit("rust", None).await.unwrap_err();
        assert!(matches!(err, SentimentError::Database(_)));

        let jobs = store.jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert!(jobs[0].error_message.is_some());
        assert!(jobs[0].is_consistent());
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let (service, _, _) = service_with(InMemoryTaskQueue::new());
        let id = Uuid::new_v4();
        assert!(matches!(service.get(id).await, Err(SentimentError::NotFound(got)) if got == id));
    }
}
