pub mod aggregate;
pub mod clean;
pub mod fetcher;
pub mod orchestrator;
pub mod scheduler;
pub mod scorer;
pub mod service;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod worker;

pub use fetcher::ApifyPostFetcher;
pub use orchestrator::{Orchestrator, RunOutcome};
pub use scheduler::Scheduler;
pub use scorer::HuggingFaceScorer;
pub use service::AnalysisService;
pub use traits::{JobStore, PostFetcher, SentimentScorer, TaskQueue};
pub use worker::Worker;
