//! Paginated pool fetcher
//!
//! Walks `?per_page=N&page=P` starting at page 1 until the reported page
//! count is reached, or until a short page when the server omits
//! `result_info.total_pages`. Every request of one fetch races the same
//! cancellation signal.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Pool, PoolsResponse};
use crate::cancel::CancelSignal;
use crate::config::ApiConfig;
use crate::credentials::Credentials;

/// Safety ceiling for servers that never report a short page
pub const MAX_PAGES: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status}: {body}")]
    Transport { status: u16, body: String },
    #[error("API error: {0}")]
    Api(String),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Pagination did not terminate after {0} pages")]
    TooManyPages(u32),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

/// Anything that can produce the complete pool list for an account
#[async_trait]
pub trait PoolSource: Send + Sync {
    async fn fetch_all_pools(
        &self,
        credentials: &Credentials,
        cancel: &CancelSignal,
    ) -> Result<Vec<Pool>, FetchError>;
}

/// HTTP implementation of [`PoolSource`] backed by reqwest
#[derive(Clone)]
pub struct PoolFetcher {
    client: reqwest::Client,
    base_url: String,
    per_page: u32,
}

impl PoolFetcher {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("lbwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            per_page: config.per_page.max(1),
        })
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    fn pools_url(&self, account_id: &str) -> String {
        format!("{}/accounts/{}/load_balancers/pools", self.base_url, account_id)
    }

    /// Fetch a single page
    async fn fetch_page(
        &self,
        credentials: &Credentials,
        page: u32,
    ) -> Result<PoolsResponse, FetchError> {
        let response = self
            .client
            .get(self.pools_url(credentials.account_id()))
            .query(&[("per_page", self.per_page), ("page", page)])
            .bearer_auth(credentials.token())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PoolsResponse = serde_json::from_str(&body)?;
        if !parsed.success {
            return Err(FetchError::Api(parsed.error_summary()));
        }

        Ok(parsed)
    }
}

#[async_trait]
impl PoolSource for PoolFetcher {
    async fn fetch_all_pools(
        &self,
        credentials: &Credentials,
        cancel: &CancelSignal,
    ) -> Result<Vec<Pool>, FetchError> {
        let mut pools = Vec::new();
        let mut page = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                result = self.fetch_page(credentials, page) => result?,
            };

            let total_pages = response.result_info.as_ref().and_then(|info| info.total_pages);
            let items = response.result.unwrap_or_default();
            let received = items.len();
            pools.extend(items);

            debug!(page, received, ?total_pages, "Fetched pools page");

            let done = match total_pages {
                Some(total) => page >= total,
                None => received < self.per_page as usize,
            };
            if done {
                break;
            }
            if page >= MAX_PAGES {
                return Err(FetchError::TooManyPages(page));
            }
            page += 1;
        }

        info!(pools = pools.len(), pages = page, "Pool list fetched");
        Ok(pools)
    }
}
