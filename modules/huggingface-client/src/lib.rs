pub mod error;
pub mod types;

pub use error::{HfError, Result};
pub use types::{ClassifyParameters, ClassifyRequest, LabelScore};

use std::time::Duration;

use types::{ClassifyOptions, ClassifyResponse};

const BASE_URL: &str = "https://api-inference.huggingface.co";

/// Cold models can take a while to load when `wait_for_model` is set.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct HuggingFaceClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl HuggingFaceClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Classify a single text. Returns the model's full label distribution.
    pub async fn classify(&self, model: &str, text: &str) -> Result<Vec<LabelScore>> {
        let mut out = self.classify_batch(model, &[text.to_string()]).await?;
        out.pop().ok_or(HfError::ShapeMismatch {
            expected: 1,
            got: 0,
        })
    }

    /// Classify a batch of texts in one request. The outer vector is index-aligned with `texts`.
    pub async fn classify_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<LabelScore>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/models/{}", self.base_url, model);
        let body = ClassifyRequest {
            inputs: texts,
            parameters: ClassifyParameters::default(),
            options: ClassifyOptions {
                wait_for_model: true,
            },
        };

        tracing::debug!(model, batch = texts.len(), "Hugging Face classification request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 503 {
            let body = resp.text().await.unwrap_or_default();
            return Err(HfError::ModelLoading(body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HfError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: ClassifyResponse = resp.json().await?;
        let distributions = parsed.into_batch();
        if distributions.len() != texts.len() {
            return Err(HfError::ShapeMismatch {
                expected: texts.len(),
                got: distributions.len(),
            });
        }

        Ok(distributions)
    }
}
