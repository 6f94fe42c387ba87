#![allow(async_fn_in_trait)]

use std::time::Duration;

use fg_common::killmail::Killmail;
use thiserror::Error;

pub const DEFAULT_ESI_BASE_URL: &str = "https://esi.evetech.net/latest";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("detail request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("detail lookup answered with status {0}")]
    Status(u16),
    #[error("killmail document does not decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Resolves a (killmail id, hash) pair to the full killmail document.
pub trait DetailLookup {
    async fn fetch(&self, id: i64, hash: &str) -> Result<Killmail, LookupError>;
}

#[derive(Debug, Clone)]
pub struct EsiClient {
    http: reqwest::Client,
    base_url: String,
}

impl EsiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fittings/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn killmail_url(&self, id: i64, hash: &str) -> String {
        format!("{}/killmails/{id}/{hash}/", self.base_url)
    }
}

impl DetailLookup for EsiClient {
    async fn fetch(&self, id: i64, hash: &str) -> Result<Killmail, LookupError> {
        let response = self.http.get(self.killmail_url(id, hash)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
