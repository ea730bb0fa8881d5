use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use sentiment_api::{router, AppState};
use sentiment_common::{AnalysisLimits, JobStatus, SentimentLabel, WorkerConfig};
use sentiment_engine::testing::{
    sample_items, FixedScorer, InMemoryJobStore, InMemoryTaskQueue, MockFetcher,
};
use sentiment_engine::{AnalysisService, Orchestrator, Worker};

use sentiment_common::SentimentLabel::{Negative as Neg, Neutral as Neu, Positive as Pos};

struct TestApp {
    app: Router,
    store: Arc<InMemoryJobStore>,
    queue: Arc<InMemoryTaskQueue>,
}

fn app_with(queue: InMemoryTaskQueue) -> TestApp {
    let store = Arc::new(InMemoryJobStore::new());
    let queue = Arc::new(queue);
    let service = Arc::new(AnalysisService::new(
        store.clone(),
        queue.clone(),
        AnalysisLimits::default(),
    ));
    TestApp {
        app: router(Arc::new(AppState { service })),
        store,
        queue,
    }
}

fn app() -> TestApp {
    app_with(InMemoryTaskQueue::new())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_and_liveness() {
    let t = app();

    let (status, body) = send(&t.app, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "sentiment-analysis-api"}));

    let (status, body) = send(&t.app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn submit_returns_pending_job_immediately() {
    let t = app();

    let (status, body) = send(
        &t.app,
        post_json("/api/v1/analyze", r#"{"topic": "rust", "max_tweets": 25}"#),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["message"], "Analysis job created successfully");

    let id: Uuid = body["job_id"].as_str().unwrap().parse().unwrap();
    let job = t.store.job(id).unwrap();
    assert_eq!(job.max_tweets, 25);
    assert_eq!(t.queue.tasks().len(), 1);
}

#[tokio::test]
async fn submit_defaults_max_tweets() {
    let t = app();
    let (status, body) = send(&t.app, post_json("/api/v1/analyze", r#"{"topic": "rust"}"#)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let id: Uuid = body["job_id"].as_str().unwrap().parse().unwrap();
    assert_eq!(t.store.job(id).unwrap().max_tweets, 10);
}

#[tokio::test]
async fn submit_rejects_bad_input() {
    let t = app();
    let cases = [
        "not json",
        "[1, 2]",
        r#"{}"#,
        r#"{"topic": 42}"#,
        r#"{"topic": ""}"#,
        r#"{"topic": "   "}"#,
        r#"{"topic": "rust", "max_tweets": 0}"#,
        r#"{"topic": "rust", "max_tweets": 1001}"#,
        r#"{"topic": "rust", "max_tweets": "ten"}"#,
        r#"{"topic": "rust", "max_tweets": 2.5}"#,
    ];
    for case in cases {
        let (status, body) = send(&t.app, post_json("/api/v1/analyze", case)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case}");
        assert!(body["error"].is_string(), "{case}");
    }

    let long = json!({ "topic": "a".repeat(201) }).to_string();
    let (status, _) = send(&t.app, post_json("/api/v1/analyze", &long)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(t.store.is_empty());
    assert!(t.queue.tasks().is_empty());
}

#[tokio::test]
async fn enqueue_failure_is_a_server_error_and_fails_the_job() {
    let t = app_with(InMemoryTaskQueue::rejecting());

    let (status, body) = send(&t.app, post_json("/api/v1/analyze", r#"{"topic": "rust"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to create analysis job");

    let jobs = t.store.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, JobStatus::Failed);
}

#[tokio::test]
async fn unknown_or_malformed_ids_are_not_found() {
    let t = app();

    let (status, body) = send(&t.app, get(&format!("/api/v1/results/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Analysis job not found"}));

    let (status, _) = send(&t.app, get("/api/v1/results/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&t.app, get("/api/v1/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Endpoint not found");
}

#[tokio::test]
async fn pending_job_polls_with_null_outcome() {
    let t = app();
    let (_, body) = send(&t.app, post_json("/api/v1/analyze", r#"{"topic": "rust"}"#)).await;
    let id = body["job_id"].as_str().unwrap().to_string();

    let (status, body) = send(&t.app, get(&format!("/api/v1/results/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job_id"], id.as_str());
    assert_eq!(body["status"], "pending");
    assert_eq!(body["topic"], "rust");
    assert!(body["completed_at"].is_null());
    assert!(body["error_message"].is_null());
    assert!(body.get("positive_percentage").is_none());
}

#[tokio::test]
async fn end_to_end_submit_process_poll() {
    let t = app();
    let items = sample_items(10);
    let labels: [SentimentLabel; 10] = [Pos, Pos, Pos, Pos, Pos, Pos, Neg, Neg, Neu, Neu];

    let orchestrator = Orchestrator::new(
        Arc::new(MockFetcher::new().on_topic("test", items.clone())),
        Arc::new(FixedScorer::labelling(&items, &labels)),
        t.store.clone(),
    );
    let worker = Worker::new(
        t.queue.clone(),
        orchestrator,
        t.store.clone(),
        WorkerConfig {
            concurrency: 1,
            poll_interval: std::time::Duration::from_millis(10),
            lease: std::time::Duration::from_secs(60),
        },
    );

    let (status, body) = send(
        &t.app,
        post_json("/api/v1/analyze", r#"{"topic": "test", "max_tweets": 10}"#),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = body["job_id"].as_str().unwrap().to_string();

    assert_eq!(worker.drain().await.unwrap(), 1);

    let (status, body) = send(&t.app, get(&format!("/api/v1/results/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["positive_percentage"], 60.0);
    assert_eq!(body["negative_percentage"], 20.0);
    assert_eq!(body["neutral_percentage"], 20.0);
    assert_eq!(body["total_tweets"], 10);
    assert_eq!(body["analyzed_tweets"], 10);
    assert!(body["completed_at"].is_string());
    assert!(body["error_message"].is_null());
}

#[tokio::test]
async fn end_to_end_failed_job_reports_error() {
    let t = app();
    let orchestrator = Orchestrator::new(
        Arc::new(MockFetcher::new().on_topic("nothing", vec![])),
        Arc::new(FixedScorer::neutral()),
        t.store.clone(),
    );
    let worker = Worker::new(
        t.queue.clone(),
        orchestrator,
        t.store.clone(),
        WorkerConfig {
            concurrency: 1,
            poll_interval: std::time::Duration::from_millis(10),
            lease: std::time::Duration::from_secs(60),
        },
    );

    let (_, body) = send(&t.app, post_json("/api/v1/analyze", r#"{"topic": "nothing"}"#)).await;
    let id = body["job_id"].as_str().unwrap().to_string();
    worker.drain().await.unwrap();

    let (_, body) = send(&t.app, get(&format!("/api/v1/results/{id}"))).await;
    assert_eq!(body["status"], "failed");
    assert_eq!(body["error_message"], "No posts found for topic: nothing");
    assert!(body.get("positive_percentage").is_none());
}
