use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SentimentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Analysis job not found: {0}")]
    NotFound(Uuid),

    #[error("Failed to fetch posts: {0}")]
    Fetch(String),

    #[error("Social media API rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("No posts found for topic: {0}")]
    NoPosts(String),

    #[error("Sentiment scoring failed for all {attempted} posts: {last_error}")]
    Scoring { attempted: usize, last_error: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
