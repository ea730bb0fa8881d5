use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use apify_client::ApifyClient;
use huggingface_client::HuggingFaceClient;
use sentiment_common::Config;
use sentiment_engine::{
    AnalysisService, ApifyPostFetcher, HuggingFaceScorer, Orchestrator, Scheduler, Worker,
};
use sentiment_store::{PgJobStore, PgTaskQueue};

#[derive(Parser)]
#[command(name = "worker", about = "Sentiment analysis task worker")]
struct Cli {
    /// Concurrent task loops in this process
    #[arg(long, env = "WORKER_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Process everything currently queued, then exit
    #[arg(long)]
    once: bool,

    /// Run the topic scheduler in this process regardless of SCHEDULER_ENABLED
    #[arg(long)]
    scheduler: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = Config::worker_from_env()?;
    if let Some(concurrency) = cli.concurrency {
        config.worker_concurrency = concurrency;
    }

    let pool = sentiment_store::connect(&config.database_url, config.database_max_connections).await?;
    sentiment_store::migrate(&pool).await?;
    info!("Connected to database, migrations complete");

    let store = Arc::new(PgJobStore::new(pool.clone()));
    let queue = Arc::new(PgTaskQueue::new(pool));

    let apify = ApifyClient::new(config.apify_api_key.clone());
    let mut hf = HuggingFaceClient::new(config.huggingface_api_key.clone());
    if let Some(url) = &config.hf_inference_url {
        hf = hf.with_base_url(url.as_str());
    }

    let orchestrator = Orchestrator::new(
        Arc::new(ApifyPostFetcher::new(apify, config.fetch_retry())),
        Arc::new(HuggingFaceScorer::new(hf, config.sentiment_model_name.clone())),
        store.clone(),
    )
    .with_batch_size(config.scorer_batch_size);

    let worker = Arc::new(Worker::new(
        queue.clone(),
        orchestrator,
        store.clone(),
        config.worker(),
    ));

    if cli.once {
        let processed = worker.drain().await?;
        info!(processed, "Queue drained");
        return Ok(());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received, finishing in-flight tasks"),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
            cancel.store(true, Ordering::Relaxed);
        });
    }

    let scheduler_task = if config.scheduler_enabled || cli.scheduler {
        let service = Arc::new(AnalysisService::new(store, queue, config.limits()));
        let scheduler = Scheduler::new(service, config.schedule());
        let cancel = cancel.clone();
        Some(tokio::spawn(async move { scheduler.run(cancel).await }))
    } else {
        None
    };

    worker.run(cancel).await;

    if let Some(handle) = scheduler_task {
        if let Err(e) = handle.await {
            error!(error = %e, "Scheduler task panicked");
        }
    }

    info!("Worker exited");
    Ok(())
}
