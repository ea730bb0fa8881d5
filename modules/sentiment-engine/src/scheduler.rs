use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info};

use sentiment_common::{Job, ScheduleConfig};

use crate::service::AnalysisService;
use crate::worker::sleep_unless_cancelled;

/// Periodically submits a fixed list of topics through the normal submit path.
pub struct Scheduler {
    service: Arc<AnalysisService>,
    config: ScheduleConfig,
}

impl Scheduler {
    pub fn new(service: Arc<AnalysisService>, config: ScheduleConfig) -> Self {
        Self { service, config }
    }

    /// Submit one job per configured topic. Failures are logged and skipped.
    pub async fn tick(&self) -> Vec<Job> {
        let max_tweets = self.config.max_tweets.min(self.service.limits().max_tweets);
        let mut submitted = Vec::with_capacity(self.config.topics.len());

        for topic in &self.config.topics {
            match self.service.submit(topic, Some(i64::from(max_tweets))).await {
                Ok(job) => submitted.push(job),
                Err(e) => error!(topic = topic.as_str(), error = %e, "Scheduled submission failed"),
            }
        }

        info!(
            submitted = submitted.len(),
            topics = self.config.topics.len(),
            "Scheduled analysis tick"
        );
        submitted
    }

    /// Tick immediately, then every interval, until `cancel` is set.
    pub async fn run(&self, cancel: Arc<AtomicBool>) {
        if self.config.topics.is_empty() {
            info!("Scheduler enabled with no topics, not starting");
            return;
        }
        info!(
            topics = ?self.config.topics,
            interval_minutes = self.config.interval.as_secs() / 60,
            "Starting scheduled analysis loop"
        );

        while !cancel.load(Ordering::Relaxed) {
            self.tick().await;
            sleep_unless_cancelled(self.config.interval, &cancel).await;
        }
    }
}
