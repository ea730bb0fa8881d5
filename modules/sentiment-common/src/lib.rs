pub mod config;
pub mod error;
pub mod types;

pub use config::{AnalysisLimits, Config, RetryPolicy, ScheduleConfig, WorkerConfig};
pub use error::SentimentError;
pub use types::*;
