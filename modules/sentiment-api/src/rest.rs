use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use sentiment_common::{Job, JobStatus, SentimentError, SentimentResult};

use crate::AppState;

/// Poll response. Result fields appear at the top level once the job completes.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub topic: String,
    pub max_tweets: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    #[serde(flatten)]
    pub result: Option<SentimentResult>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            topic: job.topic,
            max_tweets: job.max_tweets,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
            result: job.result,
        }
    }
}

fn bad_request(message: &str, details: Option<Value>) -> Response {
    let mut body = json!({ "error": message });
    if let Some(details) = details {
        body["details"] = details;
    }
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn job_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Analysis job not found"})),
    )
        .into_response()
}

/// Map a service error to a response. `context` is the 500 message.
fn error_response(err: SentimentError, context: &str) -> Response {
    match err {
        SentimentError::Validation(msg) => {
            bad_request("Invalid request data", Some(json!({ "message": msg })))
        }
        SentimentError::NotFound(_) => job_not_found(),
        other => {
            error!(error = %other, "{context}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": context})),
            )
                .into_response()
        }
    }
}

pub async fn api_analyze(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return bad_request(
                "Request body must be valid JSON",
                Some(json!({ "message": rejection.body_text() })),
            )
        }
    };

    let Some(fields) = body.as_object() else {
        return bad_request("Request body must be a JSON object", None);
    };

    let topic = match fields.get("topic") {
        Some(Value::String(topic)) => topic.as_str(),
        _ => {
            return bad_request(
                "Invalid request data",
                Some(json!({ "topic": "topic is required and must be a string" })),
            )
        }
    };

    let max_tweets = match fields.get("max_tweets") {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_i64() {
            Some(n) => Some(n),
            None => {
                return bad_request(
                    "Invalid request data",
                    Some(json!({ "max_tweets": "max_tweets must be an integer" })),
                )
            }
        },
    };

    match state.service.submit(topic, max_tweets).await {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "job_id": job.id,
                "status": job.status,
                "message": "Analysis job created successfully",
            })),
        )
            .into_response(),
        Err(e) => error_response(e, "Failed to create analysis job"),
    }
}

pub async fn api_results(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    let Ok(id) = Uuid::parse_str(&job_id) else {
        return job_not_found();
    };

    match state.service.get(id).await {
        Ok(job) => Json(JobResponse::from(job)).into_response(),
        Err(e) => error_response(e, "Failed to retrieve job results"),
    }
}

pub async fn api_health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "sentiment-analysis-api",
    }))
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Endpoint not found"})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new_pending("rust", 10)
    }

    #[test]
    fn pending_job_has_null_outcome_fields() {
        let value = serde_json::to_value(JobResponse::from(job())).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["topic"], "rust");
        assert_eq!(value["max_tweets"], 10);
        assert!(value["completed_at"].is_null());
        assert!(value["error_message"].is_null());
        assert!(value.get("positive_percentage").is_none());
    }

    #[test]
    fn completed_job_flattens_result() {
        let mut job = job();
        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        job.result = Some(SentimentResult {
            positive_percentage: 60.0,
            negative_percentage: 20.0,
            neutral_percentage: 20.0,
            average_polarity: 0.38,
            total_tweets: 10,
            analyzed_tweets: 10,
        });

        let value = serde_json::to_value(JobResponse::from(job)).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["positive_percentage"], 60.0);
        assert_eq!(value["analyzed_tweets"], 10);
        assert!(value.get("result").is_none());
    }
}
