use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use huggingface_client::{HuggingFaceClient, LabelScore};
use tracing::warn;

use sentiment_common::{Sentiment, SentimentLabel};

use crate::clean::is_scorable;
use crate::traits::SentimentScorer;

/// Confidence assigned to texts too short to send to the model.
const SHORT_TEXT_CONFIDENCE: f64 = 0.5;

/// Parallel single-text requests after a failed batch.
const FALLBACK_CONCURRENCY: usize = 4;

/// Scores text with a Hugging Face text-classification model.
pub struct HuggingFaceScorer {
    client: HuggingFaceClient,
    model: String,
}

impl HuggingFaceScorer {
    pub fn new(client: HuggingFaceClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SentimentScorer for HuggingFaceScorer {
    async fn score(&self, text: &str) -> Result<Sentiment> {
        if !is_scorable(text) {
            return Ok(short_text_sentiment());
        }
        let distribution = self.client.classify(&self.model, text).await?;
        to_sentiment(&distribution)
    }

    /// One request for the whole batch. Short texts never reach the model.
    /// If the batch request fails, every text is retried on its own.
    async fn score_batch(&self, texts: &[String]) -> Vec<Result<Sentiment>> {
        let mut out: Vec<Option<Result<Sentiment>>> = Vec::with_capacity(texts.len());
        let mut pending_idx = Vec::new();
        let mut pending = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if is_scorable(text) {
                out.push(None);
                pending_idx.push(i);
                pending.push(text.clone());
            } else {
                out.push(Some(Ok(short_text_sentiment())));
            }
        }

        if !pending.is_empty() {
            let batch = self.client.classify_batch(&self.model, &pending).await;
            match batch {
                Ok(distributions) => {
                    for (i, dist) in pending_idx.iter().zip(distributions.iter()) {
                        out[*i] = Some(to_sentiment(dist));
                    }
                }
                Err(e) => {
                    warn!(error = %e, batch = pending.len(), "Batch scoring failed, falling back to single requests");
                    let owned: Vec<(usize, String)> = pending_idx.into_iter().zip(pending).collect();
                    let singles: Vec<(usize, Result<Sentiment>)> = stream::iter(owned)
                        .map(|(i, text): (usize, String)| async move { (i, self.score(&text).await) })
                        .buffer_unordered(FALLBACK_CONCURRENCY)
                        .collect()
                        .await;
                    for (i, result) in singles {
                        out[i] = Some(result);
                    }
                }
            }
        }

        out.into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(anyhow!("no score returned for text"))))
            .collect()
    }
}

fn short_text_sentiment() -> Sentiment {
    Sentiment::new(SentimentLabel::Neutral, SHORT_TEXT_CONFIDENCE)
}

fn to_sentiment(distribution: &[LabelScore]) -> Result<Sentiment> {
    let top = LabelScore::top(distribution).ok_or_else(|| anyhow!("model returned no labels"))?;
    Ok(Sentiment::new(
        SentimentLabel::from_model_label(&top.label),
        top.score,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dist(pairs: &[(&str, f64)]) -> Vec<LabelScore> {
        pairs
            .iter()
            .map(|(label, score)| LabelScore {
                label: label.to_string(),
                score: *score,
            })
            .collect()
    }

    #[test]
    fn top_label_becomes_sentiment() {
        let s = to_sentiment(&dist(&[("negative", 0.1), ("positive", 0.85), ("neutral", 0.05)])).unwrap();
        assert_eq!(s.label, SentimentLabel::Positive);
        assert!((s.confidence - 0.85).abs() < 1e-9);

        let s = to_sentiment(&dist(&[("LABEL_0", 0.7), ("LABEL_2", 0.2)])).unwrap();
        assert_eq!(s.label, SentimentLabel::Negative);

        assert!(to_sentiment(&[]).is_err());
    }

    async fn scorer_for(server: &MockServer) -> HuggingFaceScorer {
        let client = HuggingFaceClient::new("hf_test".into()).with_base_url(server.uri());
        HuggingFaceScorer::new(client, "test/model")
    }

    #[tokio::test]
    async fn short_text_skips_the_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let scorer = scorer_for(&server).await;
        let s = scorer.score("ok").await.unwrap();
        assert_eq!(s.label, SentimentLabel::Neutral);
        assert_eq!(s.confidence, 0.5);
    }

    #[tokio::test]
    async fn batch_is_index_aligned_around_short_texts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test/model"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                [{"label": "positive", "score": 0.9}, {"label": "negative", "score": 0.1}],
                [{"label": "negative", "score": 0.8}, {"label": "positive", "score": 0.2}]
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let scorer = scorer_for(&server).await;
        let texts = vec![
            "great stuff here".to_string(),
            "hm".to_string(),
            "awful stuff here".to_string(),
        ];
        let out = scorer.score_batch(&texts).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap().label, SentimentLabel::Positive);
        assert_eq!(out[1].as_ref().unwrap().label, SentimentLabel::Neutral);
        assert_eq!(out[2].as_ref().unwrap().label, SentimentLabel::Negative);
    }

    #[tokio::test]
    async fn failed_batch_falls_back_to_single_requests() {
        let server = MockServer::start().await;
        // Every request fails, so the batch call plus one retry per text.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad input"))
            .expect(3)
            .mount(&server)
            .await;

        let scorer = scorer_for(&server).await;
        let texts = vec!["first text".to_string(), "second text".to_string()];
        let out = scorer.score_batch(&texts).await;
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.is_err()));
    }

    #[tokio::test]
    async fn fallback_results_land_at_their_own_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"inputs": ["first text", "second text"]})))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"inputs": ["first text"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                [{"label": "negative", "score": 0.7}]
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"inputs": ["second text"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                [{"label": "positive", "score": 0.8}]
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let scorer = scorer_for(&server).await;
        let texts = vec!["first text".to_string(), "ok".to_string(), "second text".to_string()];
        let out = scorer.score_batch(&texts).await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].as_ref().unwrap().label, SentimentLabel::Negative);
        assert_eq!(out[1].as_ref().unwrap().label, SentimentLabel::Neutral);
        assert_eq!(out[2].as_ref().unwrap().label, SentimentLabel::Positive);
    }
}
