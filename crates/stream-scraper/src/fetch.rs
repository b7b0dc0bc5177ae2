//! Plain HTTP page fetching for the static scraping path.

use crate::error::{Result, ScrapeError};
use anyhow::Context;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Fetches HTML pages with a browser-like user agent
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    /// Create a new fetcher
    pub fn new(timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// GET a page and return its body as text
    ///
    /// Non-success statuses are errors carrying the response body.
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml,*/*;q=0.8")
            .send()
            .await
            .map_err(|source| ScrapeError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response.text().await.map_err(|e| ScrapeError::UnexpectedShape {
            url: url.to_string(),
            reason: format!("failed to read body: {e}"),
        })
    }
}
