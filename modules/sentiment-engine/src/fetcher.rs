use std::collections::HashSet;

use anyhow::Result;
use apify_client::{ApifyClient, ApifyError, Tweet};
use async_trait::async_trait;
use tracing::{info, warn};

use sentiment_common::{RetryPolicy, SentimentError, SourceItem};

use crate::clean::{clean_post_text, is_substantive, search_query};
use crate::traits::PostFetcher;

/// Fetches posts through the Apify tweet scraper.
pub struct ApifyPostFetcher {
    client: ApifyClient,
    retry: RetryPolicy,
}

impl ApifyPostFetcher {
    pub fn new(client: ApifyClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Run the search, retrying transient failures after a fixed delay.
    async fn search_with_retry(&self, query: &str, max_items: u32) -> Result<Vec<Tweet>, ApifyError> {
        let mut attempt = 0;
        loop {
            match self.client.search_tweets(query, max_items).await {
                Ok(tweets) => return Ok(tweets),
                Err(e) if e.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_secs = self.retry.delay.as_secs(),
                        "Post search failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl PostFetcher for ApifyPostFetcher {
    async fn search(&self, topic: &str, max_items: u32) -> Result<Vec<SourceItem>> {
        let Some(query) = search_query(topic) else {
            return Err(SentimentError::Validation(format!(
                "topic {topic:?} has no searchable words"
            ))
            .into());
        };

        let tweets = self
            .search_with_retry(&query, max_items)
            .await
            .map_err(|e| {
                if e.is_rate_limited() {
                    SentimentError::RateLimited(e.to_string())
                } else {
                    SentimentError::Fetch(e.to_string())
                }
            })?;

        let fetched = tweets.len();
        let items = tweets_to_items(tweets);
        info!(topic, fetched, kept = items.len(), "Posts fetched");
        Ok(items)
    }
}

/// Clean tweets into source items, dropping empty, too-short, and duplicate posts.
pub(crate) fn tweets_to_items(tweets: Vec<Tweet>) -> Vec<SourceItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(tweets.len());

    for (idx, tweet) in tweets.into_iter().enumerate() {
        let Some(raw) = tweet.content() else {
            continue;
        };
        let text = clean_post_text(raw);
        if !is_substantive(&text) {
            continue;
        }

        let id = tweet.id.clone().unwrap_or_else(|| format!("item-{idx}"));
        if !seen.insert(id.clone()) {
            continue;
        }

        items.push(SourceItem {
            id,
            text,
            author: tweet.author.as_ref().and_then(|a| a.user_name.clone()),
            created_at: tweet.created_at_utc(),
        });
    }

    items
}
