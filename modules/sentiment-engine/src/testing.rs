// Test fakes for the analysis pipeline.
//
// One fake per trait boundary:
// - MockFetcher (PostFetcher): topic -> canned posts or error
// - FixedScorer (SentimentScorer): text -> canned sentiment or error
// - InMemoryJobStore (JobStore): HashMap of jobs, enforces status transitions
// - InMemoryTaskQueue (TaskQueue): Vec of task rows with queue states
//
// Plus `sample_items` for building fetch results.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use sentiment_common::{
    AnalysisTask, FailOutcome, Job, JobStatus, Sentiment, SentimentError, SentimentLabel,
    SentimentResult, SourceItem, TaskState,
};

use crate::traits::{JobStore, PostFetcher, SentimentScorer, TaskQueue};

/// `n` distinct posts with texts `"post number {i} about the topic"`.
pub fn sample_items(n: usize) -> Vec<SourceItem> {
    (0..n)
        .map(|i| SourceItem {
            id: format!("post-{i}"),
            text: format!("post number {i} about the topic"),
            author: Some(format!("user{i}")),
            created_at: Some(Utc::now()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

enum FetchResponse {
    Items(Vec<SourceItem>),
    Error(fn(String) -> SentimentError, String),
}

/// Topic-keyed fetcher. Returns `Err` for unregistered topics.
pub struct MockFetcher {
    responses: HashMap<String, FetchResponse>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn on_topic(mut self, topic: &str, items: Vec<SourceItem>) -> Self {
        self.responses
            .insert(topic.to_string(), FetchResponse::Items(items));
        self
    }

    pub fn failing(mut self, topic: &str, message: &str) -> Self {
        self.responses.insert(
            topic.to_string(),
            FetchResponse::Error(SentimentError::Fetch, message.to_string()),
        );
        self
    }

    pub fn rate_limited(mut self, topic: &str) -> Self {
        self.responses.insert(
            topic.to_string(),
            FetchResponse::Error(SentimentError::RateLimited, "429 Too Many Requests".to_string()),
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostFetcher for MockFetcher {
    async fn search(&self, topic: &str, max_items: u32) -> Result<Vec<SourceItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(topic) {
            Some(FetchResponse::Items(items)) => {
                Ok(items.iter().take(max_items as usize).cloned().collect())
            }
            Some(FetchResponse::Error(kind, message)) => Err(kind(message.clone()).into()),
            None => bail!("MockFetcher: no posts registered for {topic}"),
        }
    }
}

// ---------------------------------------------------------------------------
// FixedScorer
// ---------------------------------------------------------------------------

/// Text-keyed scorer. Unregistered texts get the default sentiment.
pub struct FixedScorer {
    default: Sentiment,
    by_text: HashMap<String, Sentiment>,
    failing: HashSet<String>,
    fail_all: bool,
    calls: AtomicUsize,
}

impl FixedScorer {
    pub fn new(default: Sentiment) -> Self {
        Self {
            default,
            by_text: HashMap::new(),
            failing: HashSet::new(),
            fail_all: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn neutral() -> Self {
        Self::new(Sentiment::new(SentimentLabel::Neutral, 0.6))
    }

    /// Assign `labels[i]` (confidence 0.9) to `items[i]`.
    pub fn labelling(items: &[SourceItem], labels: &[SentimentLabel]) -> Self {
        let mut scorer = Self::neutral();
        for (item, label) in items.iter().zip(labels) {
            scorer = scorer.on_text(&item.text, Sentiment::new(*label, 0.9));
        }
        scorer
    }

    pub fn on_text(mut self, text: &str, sentiment: Sentiment) -> Self {
        self.by_text.insert(text.to_string(), sentiment);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    pub fn failing_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Number of `score` calls, one per text.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SentimentScorer for FixedScorer {
    async fn score(&self, text: &str) -> Result<Sentiment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all || self.failing.contains(text) {
            bail!("FixedScorer: scoring failed for {text:?}");
        }
        Ok(self.by_text.get(text).copied().unwrap_or(self.default))
    }
}

// ---------------------------------------------------------------------------
// InMemoryJobStore
// ---------------------------------------------------------------------------

/// HashMap-backed job store. Applies only legal transitions and records each
/// status a job passes through.
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    history: Mutex<HashMap<Uuid, Vec<JobStatus>>>,
    fail_writes: AtomicUsize,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
            fail_writes: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` status updates return an error.
    pub fn fail_next_writes(&self, n: usize) {
        self.fail_writes.store(n, Ordering::SeqCst);
    }

    pub fn job(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().unwrap().get(&id).cloned()
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every status the job has held, in order.
    pub fn history(&self, id: Uuid) -> Vec<JobStatus> {
        self.history
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    fn transition(&self, id: Uuid, next: JobStatus, apply: impl FnOnce(&mut Job)) -> Result<bool> {
        let failing = self
            .fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            bail!("InMemoryJobStore: write failed");
        }
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(false);
        };
        if !job.status.can_transition_to(next) {
            return Ok(false);
        }
        job.status = next;
        apply(job);
        self.history.lock().unwrap().entry(id).or_default().push(next);
        Ok(true)
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            bail!("InMemoryJobStore: job {} already exists", job.id);
        }
        jobs.insert(job.id, job.clone());
        self.history
            .lock()
            .unwrap()
            .insert(job.id, vec![job.status]);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.job(id))
    }

    async fn mark_in_progress(&self, id: Uuid) -> Result<bool> {
        self.transition(id, JobStatus::InProgress, |job| {
            job.started_at.get_or_insert_with(Utc::now);
        })
    }

    async fn mark_completed(&self, id: Uuid, result: &SentimentResult) -> Result<bool> {
        let result = *result;
        self.transition(id, JobStatus::Completed, move |job| {
            job.result = Some(result);
            job.completed_at = Some(Utc::now());
        })
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> Result<bool> {
        self.transition(id, JobStatus::Failed, |job| {
            job.error_message = Some(error_message.to_string());
            job.completed_at = Some(Utc::now());
        })
    }
}

// ---------------------------------------------------------------------------
// InMemoryTaskQueue
// ---------------------------------------------------------------------------

struct TaskRow {
    task: AnalysisTask,
    state: TaskState,
    claimed_at: Option<Instant>,
    last_error: Option<String>,
}

impl TaskRow {
    fn holds_claim(&self, task: &AnalysisTask) -> bool {
        self.task.id == task.id
            && self.state == TaskState::Running
            && task.claim_id.is_some()
            && self.task.claim_id == task.claim_id
    }
}

/// FIFO queue with the same state machine as the Postgres queue. Unlike
/// the Postgres queue it cannot reach the job store, so stale tasks out of
/// attempts leave their job untouched.
pub struct InMemoryTaskQueue {
    rows: Mutex<Vec<TaskRow>>,
    reject_enqueue: bool,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            reject_enqueue: false,
        }
    }

    /// A queue whose `enqueue` always fails.
    pub fn rejecting() -> Self {
        Self {
            reject_enqueue: true,
            ..Self::new()
        }
    }

    /// All tasks ever enqueued, with current attempt counts.
    pub fn tasks(&self) -> Vec<AnalysisTask> {
        self.rows.lock().unwrap().iter().map(|r| r.task.clone()).collect()
    }

    pub fn state_of(&self, task_id: Uuid) -> Option<TaskState> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.task.id == task_id)
            .map(|r| r.state)
    }

    pub fn last_error(&self, task_id: Uuid) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.task.id == task_id)
            .and_then(|r| r.last_error.clone())
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: &AnalysisTask) -> Result<()> {
        if self.reject_enqueue {
            bail!("InMemoryTaskQueue: enqueue rejected");
        }
        self.rows.lock().unwrap().push(TaskRow {
            task: task.clone(),
            state: TaskState::Queued,
            claimed_at: None,
            last_error: None,
        });
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<AnalysisTask>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.state == TaskState::Queued) else {
            return Ok(None);
        };
        row.state = TaskState::Running;
        row.claimed_at = Some(Instant::now());
        row.task.attempts += 1;
        row.task.claim_id = Some(Uuid::new_v4());
        Ok(Some(row.task.clone()))
    }

    async fn complete(&self, task: &AnalysisTask) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.holds_claim(task)) else {
            return Ok(false);
        };
        row.state = TaskState::Done;
        row.claimed_at = None;
        row.task.claim_id = None;
        Ok(true)
    }

    async fn fail(&self, task: &AnalysisTask, error: &str) -> Result<FailOutcome> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.holds_claim(task)) else {
            return Ok(FailOutcome::ClaimLost);
        };
        row.last_error = Some(error.to_string());
        row.claimed_at = None;
        row.task.claim_id = None;
        if row.task.can_retry() {
            row.state = TaskState::Queued;
            Ok(FailOutcome::Requeued)
        } else {
            row.state = TaskState::Failed;
            Ok(FailOutcome::Exhausted)
        }
    }

    async fn requeue_stale(&self, lease: Duration) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut requeued = 0;
        for row in rows.iter_mut() {
            let stale = row.state == TaskState::Running
                && row.claimed_at.is_some_and(|at| at.elapsed() >= lease);
            if !stale {
                continue;
            }
            row.claimed_at = None;
            row.task.claim_id = None;
            row.last_error = Some("lease expired".to_string());
            if row.task.can_retry() {
                row.state = TaskState::Queued;
                requeued += 1;
            } else {
                row.state = TaskState::Failed;
            }
        }
        Ok(requeued)
    }
}
