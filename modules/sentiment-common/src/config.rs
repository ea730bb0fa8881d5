use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;

use crate::error::SentimentError;

pub const DEFAULT_SENTIMENT_MODEL: &str = "cardiffnlp/twitter-roberta-base-sentiment-latest";

/// Application configuration loaded from environment variables.
/// Built once at startup and sliced into per-component settings.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Web server
    pub api_host: String,
    pub api_port: u16,

    // Request limits
    pub max_tweets_per_analysis: u32,
    pub default_max_tweets: u32,

    // External services
    pub apify_api_key: String,
    pub huggingface_api_key: String,
    pub hf_inference_url: Option<String>,
    pub sentiment_model_name: String,
    pub scorer_batch_size: usize,
    pub fetch_max_retries: u32,
    pub fetch_retry_delay_secs: u64,

    // Task queue / worker
    pub task_max_attempts: u32,
    pub worker_concurrency: usize,
    pub worker_poll_interval_secs: u64,
    pub task_lease_secs: u64,

    // Scheduler
    pub scheduler_enabled: bool,
    pub scheduled_topics: Vec<String>,
    pub schedule_interval_minutes: u64,
    pub scheduled_max_tweets: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            database_max_connections: 10,
            api_host: "0.0.0.0".to_string(),
            api_port: 5000,
            max_tweets_per_analysis: 1000,
            default_max_tweets: 10,
            apify_api_key: String::new(),
            huggingface_api_key: String::new(),
            hf_inference_url: None,
            sentiment_model_name: DEFAULT_SENTIMENT_MODEL.to_string(),
            scorer_batch_size: 32,
            fetch_max_retries: 3,
            fetch_retry_delay_secs: 10,
            task_max_attempts: 3,
            worker_concurrency: 4,
            worker_poll_interval_secs: 5,
            task_lease_secs: 900,
            scheduler_enabled: false,
            scheduled_topics: Vec::new(),
            schedule_interval_minutes: 60,
            scheduled_max_tweets: 100,
        }
    }
}

impl Config {
    /// Config for the HTTP API. Needs the database but no provider keys.
    pub fn api_from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::shared_from_env()?;
        config.log_keys();
        Ok(config)
    }

    /// Config for worker processes. Provider keys are required.
    pub fn worker_from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::shared_from_env()?;
        config.apify_api_key = required_env("APIFY_API_KEY")?;
        config.huggingface_api_key = required_env("HUGGINGFACE_API_KEY")?;
        config.log_keys();
        Ok(config)
    }

    fn shared_from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            database_max_connections: parsed_env("DATABASE_MAX_CONNECTIONS", d.database_max_connections)?,
            api_host: env::var("API_HOST").unwrap_or(d.api_host),
            api_port: parsed_env("API_PORT", d.api_port)?,
            max_tweets_per_analysis: parsed_env("MAX_TWEETS_PER_ANALYSIS", d.max_tweets_per_analysis)?,
            default_max_tweets: parsed_env("DEFAULT_MAX_TWEETS", d.default_max_tweets)?,
            apify_api_key: env::var("APIFY_API_KEY").unwrap_or_default(),
            huggingface_api_key: env::var("HUGGINGFACE_API_KEY").unwrap_or_default(),
            hf_inference_url: env::var("HF_INFERENCE_URL").ok().filter(|s| !s.is_empty()),
            sentiment_model_name: env::var("SENTIMENT_MODEL_NAME").unwrap_or(d.sentiment_model_name),
            scorer_batch_size: parsed_env("SCORER_BATCH_SIZE", d.scorer_batch_size)?,
            fetch_max_retries: parsed_env("FETCH_MAX_RETRIES", d.fetch_max_retries)?,
            fetch_retry_delay_secs: parsed_env("FETCH_RETRY_DELAY_SECS", d.fetch_retry_delay_secs)?,
            task_max_attempts: parsed_env("TASK_MAX_ATTEMPTS", d.task_max_attempts)?,
            worker_concurrency: parsed_env("WORKER_CONCURRENCY", d.worker_concurrency)?,
            worker_poll_interval_secs: parsed_env("WORKER_POLL_INTERVAL_SECS", d.worker_poll_interval_secs)?,
            task_lease_secs: parsed_env("TASK_LEASE_SECS", d.task_lease_secs)?,
            scheduler_enabled: parsed_env("SCHEDULER_ENABLED", d.scheduler_enabled)?,
            scheduled_topics: parse_topics(&env::var("SCHEDULED_TOPICS").unwrap_or_default()),
            schedule_interval_minutes: parsed_env("SCHEDULE_INTERVAL_MINUTES", d.schedule_interval_minutes)?,
            scheduled_max_tweets: parsed_env("SCHEDULED_MAX_TWEETS", d.scheduled_max_tweets)?,
        })
    }

    pub fn limits(&self) -> AnalysisLimits {
        AnalysisLimits {
            max_tweets: self.max_tweets_per_analysis.max(1),
            default_max_tweets: self.default_max_tweets.clamp(1, self.max_tweets_per_analysis.max(1)),
            max_topic_chars: AnalysisLimits::MAX_TOPIC_CHARS,
            task_max_attempts: self.task_max_attempts.max(1),
        }
    }

    pub fn fetch_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.fetch_max_retries,
            delay: Duration::from_secs(self.fetch_retry_delay_secs),
        }
    }

    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            concurrency: self.worker_concurrency.max(1),
            poll_interval: Duration::from_secs(self.worker_poll_interval_secs.max(1)),
            lease: Duration::from_secs(self.task_lease_secs.max(1)),
        }
    }

    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            topics: self.scheduled_topics.clone(),
            interval: Duration::from_secs(self.schedule_interval_minutes.max(1) * 60),
            max_tweets: self.scheduled_max_tweets,
        }
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  APIFY_API_KEY: {}", preview(&self.apify_api_key));
        tracing::info!("  HUGGINGFACE_API_KEY: {}", preview(&self.huggingface_api_key));
        tracing::info!("  SENTIMENT_MODEL_NAME: {}", self.sentiment_model_name);
        tracing::info!("  MAX_TWEETS_PER_ANALYSIS: {}", self.max_tweets_per_analysis);
        tracing::info!(
            "  SCHEDULER: enabled={} topics={}",
            self.scheduler_enabled,
            self.scheduled_topics.len()
        );
    }
}

/// Input bounds enforced at submission.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisLimits {
    pub max_tweets: u32,
    pub default_max_tweets: u32,
    pub max_topic_chars: usize,
    pub task_max_attempts: u32,
}

impl AnalysisLimits {
    pub const MAX_TOPIC_CHARS: usize = 200;
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Config::default().limits()
    }
}

/// Fixed-delay retry for transient fetch failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval: Duration,
    /// A running task older than this is presumed orphaned and requeued.
    pub lease: Duration,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub topics: Vec<String>,
    pub interval: Duration,
    pub max_tweets: u32,
}

/// First few characters of a secret, for startup logs.
fn preview(val: &str) -> String {
    if val.is_empty() {
        return "<not set>".to_string();
    }
    let head: String = val.chars().take(5).collect();
    format!("{head}...({} chars)", val.chars().count())
}

fn required_env(key: &str) -> Result<String> {
    env::var(key)
        .map_err(|_| SentimentError::Config(format!("{key} environment variable is required")).into())
}

fn parsed_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| SentimentError::Config(format!("{key} has an invalid value: {raw} ({e})")).into()),
        _ => Ok(default),
    }
}

fn parse_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_split_and_trimmed() {
        assert_eq!(
            parse_topics(" rust , tokio,,  axum "),
            vec!["rust".to_string(), "tokio".to_string(), "axum".to_string()]
        );
        assert!(parse_topics("").is_empty());
    }

    #[test]
    fn limits_clamp_default_into_range() {
        let config = Config {
            max_tweets_per_analysis: 50,
            default_max_tweets: 500,
            task_max_attempts: 0,
            ..Config::default()
        };
        let limits = config.limits();
        assert_eq!(limits.max_tweets, 50);
        assert_eq!(limits.default_max_tweets, 50);
        assert_eq!(limits.task_max_attempts, 1);
    }

    #[test]
    fn slices_carry_durations() {
        let config = Config::default();
        assert_eq!(config.fetch_retry().delay, Duration::from_secs(10));
        assert_eq!(config.worker().lease, Duration::from_secs(900));
        assert_eq!(config.schedule().interval, Duration::from_secs(3600));
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        assert_eq!(preview(""), "<not set>");
        assert_eq!(preview("hf_abcdefgh"), "hf_ab...(11 chars)");
        assert_eq!(preview("ключ-секрет"), "ключ-...(11 chars)");
        assert_eq!(preview("éé"), "éé...(2 chars)");
    }

    #[test]
    fn env_errors_are_config_errors() {
        let err = required_env("SENTIMENT_CONFIG_TEST_MISSING").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SentimentError>(),
            Some(SentimentError::Config(msg)) if msg.contains("SENTIMENT_CONFIG_TEST_MISSING")
        ));

        env::set_var("SENTIMENT_CONFIG_TEST_BAD_PORT", "not-a-port");
        let err = parsed_env::<u16>("SENTIMENT_CONFIG_TEST_BAD_PORT", 5000).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SentimentError>(),
            Some(SentimentError::Config(msg)) if msg.contains("not-a-port")
        ));

        env::set_var("SENTIMENT_CONFIG_TEST_BLANK", "  ");
        assert_eq!(parsed_env::<u16>("SENTIMENT_CONFIG_TEST_BLANK", 5000).unwrap(), 5000);
    }
}
