pub mod error;
pub mod types;

pub use error::{ApifyError, Result};
pub use types::{RunData, Tweet, TweetAuthor, TweetSearchInput};

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use types::ApiResponse;

const BASE_URL: &str = "https://api.apify.com/v2";

/// Actor ID for apidojo/tweet-scraper.
const TWEET_SCRAPER: &str = "61RPP7dywgiy0JPD0";

/// Longest `waitForFinish` the API honours per poll.
const MAX_POLL_SECS: u64 = 60;

/// Give up on a run after this long. Stays under the worker's task lease.
const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);

#[derive(Clone)]
pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    max_wait: Duration,
}

impl ApifyClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    /// Point the client at a different API root (mock servers, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound on how long `wait_for_run` polls before giving up.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Start an actor run with the given input. Returns immediately with run metadata.
    pub async fn start_run<I: Serialize + ?Sized>(&self, actor_id: &str, input: &I) -> Result<RunData> {
        let url = format!("{}/acts/{}/runs", self.base_url, actor_id);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(input)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let api_resp: ApiResponse<RunData> = resp.json().await?;
        Ok(api_resp.data)
    }

    /// Poll until a run completes, long-polling with `waitForFinish`. Fails
    /// with `RunTimedOut` once `max_wait` has passed.
    pub async fn wait_for_run(&self, run_id: &str) -> Result<RunData> {
        let started = Instant::now();
        loop {
            let wait_secs = self
                .max_wait
                .saturating_sub(started.elapsed())
                .as_secs()
                .min(MAX_POLL_SECS);
            let url = format!(
                "{}/actor-runs/{}?waitForFinish={}",
                self.base_url, run_id, wait_secs
            );
            let resp = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ApifyError::Api {
                    status: status.as_u16(),
                    message: body,
                });
            }

            let api_resp: ApiResponse<RunData> = resp.json().await?;
            match api_resp.data.status.as_str() {
                "SUCCEEDED" => return Ok(api_resp.data),
                "FAILED" | "ABORTED" | "TIMED-OUT" => {
                    return Err(ApifyError::RunFailed(api_resp.data.status));
                }
                _ if started.elapsed() >= self.max_wait => {
                    return Err(ApifyError::RunTimedOut {
                        run_id: run_id.to_string(),
                        waited_secs: self.max_wait.as_secs(),
                    });
                }
                _ => {
                    tracing::debug!(run_id, status = %api_resp.data.status, "Run still in progress");
                }
            }
        }
    }

    /// Fetch dataset items from a completed run.
    pub async fn get_dataset_items<T: DeserializeOwned>(&self, dataset_id: &str) -> Result<Vec<T>> {
        let url = format!("{}/datasets/{}/items?format=json", self.base_url, dataset_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApifyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let items: Vec<T> = resp.json().await?;
        Ok(items)
    }

    /// Search recent English tweets matching `query` end-to-end: start run, poll, fetch results.
    pub async fn search_tweets(&self, query: &str, max_items: u32) -> Result<Vec<Tweet>> {
        tracing::info!(query, max_items, "Starting X/Twitter keyword search");

        let input = TweetSearchInput::latest(query, max_items);
        let run = self.start_run(TWEET_SCRAPER, &input).await?;
        tracing::info!(run_id = %run.id, "Apify run started, polling for completion");

        let completed = self.wait_for_run(&run.id).await?;
        tracing::info!(
            run_id = %completed.id,
            dataset_id = %completed.default_dataset_id,
            "Run completed, fetching results"
        );

        let mut tweets: Vec<Tweet> = self
            .get_dataset_items(&completed.default_dataset_id)
            .await?;
        // The actor can overshoot maxItems by a page.
        tweets.truncate(max_items as usize);
        tracing::info!(count = tweets.len(), "Fetched tweets");

        Ok(tweets)
    }
}
