use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Job lifecycle ---

/// Status of a sentiment analysis job. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Allowed forward moves. `InProgress -> InProgress` covers a retried task
    /// re-entering a job it already started.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Failed)
                | (InProgress, InProgress)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }

    /// Statuses a job may be in immediately before moving to `next`.
    pub fn predecessors(next: JobStatus) -> &'static [JobStatus] {
        match next {
            JobStatus::Pending => &[],
            JobStatus::InProgress => &[JobStatus::Pending, JobStatus::InProgress],
            JobStatus::Completed => &[JobStatus::InProgress],
            JobStatus::Failed => &[JobStatus::Pending, JobStatus::InProgress],
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("Invalid job status: {other}")),
        }
    }
}

/// Aggregated sentiment for one job. Field names are the public JSON contract.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentResult {
    pub positive_percentage: f64,
    pub negative_percentage: f64,
    pub neutral_percentage: f64,
    pub average_polarity: f64,
    /// Posts fetched from the source.
    pub total_tweets: u32,
    /// Posts that were scored successfully.
    pub analyzed_tweets: u32,
}

/// One sentiment analysis request and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub topic: String,
    pub status: JobStatus,
    pub max_tweets: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<SentimentResult>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn new_pending(topic: impl Into<String>, max_tweets: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            status: JobStatus::Pending,
            max_tweets,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
        }
    }

    /// Result present iff completed, error present iff failed, completion time iff terminal.
    pub fn is_consistent(&self) -> bool {
        (self.status == JobStatus::Completed) == self.result.is_some()
            && (self.status == JobStatus::Failed) == self.error_message.is_some()
            && self.status.is_terminal() == self.completed_at.is_some()
    }
}

// --- Posts and scores ---

/// A fetched, cleaned post. Lives only for the duration of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceItem {
    pub id: String,
    pub text: String,
    pub author: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Map a raw model label onto the three classes. Handles the word forms
    /// (`positive`, `POS`) and the `LABEL_n` indices of the cardiffnlp models
    /// (0 = negative, 1 = neutral, 2 = positive).
    pub fn from_model_label(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "positive" | "pos" | "label_2" => SentimentLabel::Positive,
            "negative" | "neg" | "label_0" => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }

    /// Sign used for polarity: +1, -1, or 0.
    pub fn sign(&self) -> f64 {
        match self {
            SentimentLabel::Positive => 1.0,
            SentimentLabel::Negative => -1.0,
            SentimentLabel::Neutral => 0.0,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Negative => write!(f, "negative"),
            SentimentLabel::Neutral => write!(f, "neutral"),
        }
    }
}

/// A model verdict for one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    pub label: SentimentLabel,
    /// Model confidence in `label`, 0..=1.
    pub confidence: f64,
}

impl Sentiment {
    pub fn new(label: SentimentLabel, confidence: f64) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Signed score in [-1, 1].
    pub fn polarity(&self) -> f64 {
        self.label.sign() * self.confidence
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item: SourceItem,
    pub sentiment: Sentiment,
}

// --- Queue ---

/// Queue message asking a worker to run one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub id: Uuid,
    pub job_id: Uuid,
    pub topic: String,
    pub max_tweets: u32,
    /// Claims so far, including the current one.
    pub attempts: u32,
    pub max_attempts: u32,
    /// Token for the current claim, set by `dequeue`. Completing or failing
    /// a task only takes effect while this is still the row's claim.
    #[serde(default)]
    pub claim_id: Option<Uuid>,
}

impl AnalysisTask {
    pub fn for_job(job: &Job, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job.id,
            topic: job.topic.clone(),
            max_tweets: job.max_tweets,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            claim_id: None,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}

/// Result of reporting a failed attempt on a claimed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Back in the queue for another attempt.
    Requeued,
    /// Out of attempts; the task is failed.
    Exhausted,
    /// The claim expired and was reaped, so the report was ignored.
    ClaimLost,
}

/// Queue-side state of a task row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Queued,
    Running,
    Done,
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Done => "done",
            TaskState::Failed => "failed",
        }
    }
}
