use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sentiment_api::{router, AppState};
use sentiment_common::Config;
use sentiment_engine::AnalysisService;
use sentiment_store::{PgJobStore, PgTaskQueue};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::api_from_env()?;

    let pool = sentiment_store::connect(&config.database_url, config.database_max_connections).await?;
    sentiment_store::migrate(&pool).await?;
    info!("Connected to database, migrations complete");

    let service = Arc::new(AnalysisService::new(
        Arc::new(PgJobStore::new(pool.clone())),
        Arc::new(PgTaskQueue::new(pool)),
        config.limits(),
    ));
    let app = router(Arc::new(AppState { service }));

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("Sentiment analysis API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
