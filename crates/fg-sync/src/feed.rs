#![allow(async_fn_in_trait)]

use std::time::Duration;

use fg_common::killmail::{FeedEnvelope, FeedPackage};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_FEED_URL: &str = "https://redisq.zkillboard.com/listen.php";
pub const DEFAULT_QUEUE_ID: &str = "fittin.gs";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed answered with status {0}")]
    Status(u16),
    #[error("feed body does not decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of killmail notifications. `Ok(None)` means the queue is drained
/// for now.
pub trait FeedSource {
    async fn next_package(&self) -> Result<Option<FeedPackage>, FeedError>;
}

/// Long-poll client for the zKillboard RedisQ endpoint.
#[derive(Debug, Clone)]
pub struct RedisQClient {
    http: reqwest::Client,
    url: String,
    queue_id: String,
}

impl RedisQClient {
    pub fn new(url: &str, queue_id: &str, timeout: Duration) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fittings/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            queue_id: queue_id.to_string(),
        })
    }
}

impl FeedSource for RedisQClient {
    async fn next_package(&self) -> Result<Option<FeedPackage>, FeedError> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("queueID", self.queue_id.as_str()), ("ttw", "1")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let envelope: FeedEnvelope = serde_json::from_slice(&body)?;
        debug!(has_package = envelope.package.is_some(), "feed polled");
        Ok(envelope.package)
    }
}
