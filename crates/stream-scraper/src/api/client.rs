//! Upstream metadata API client.

use super::types::{DataResponse, EpisodeDetail};
use crate::error::{Result, ScrapeError};
use anyhow::Context;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Client for the upstream anime metadata API
#[derive(Clone)]
pub struct UpstreamClient {
    /// HTTP client
    client: Client,
    /// Base URL for the API
    base_url: Url,
}

impl UpstreamClient {
    /// Create a new upstream client
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid upstream base URL: {}", base_url))?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Build an endpoint URL from path segments (each segment is percent-encoded)
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ScrapeError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET an endpoint and unwrap its `data` field
    async fn get_data(&self, segments: &[&str]) -> Result<Value> {
        let url = self.endpoint(segments)?;
        let url_str = url.to_string();

        debug!(url = %url_str, "Making API request");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ScrapeError::Transport {
                url: url_str.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            warn!(url = %url_str, status = %status, error = %message, "Request failed");

            return Err(ScrapeError::Status {
                url: url_str,
                status: status.as_u16(),
                message,
            });
        }

        let body: DataResponse<Value> =
            response
                .json()
                .await
                .map_err(|e| ScrapeError::UnexpectedShape {
                    url: url_str.clone(),
                    reason: format!("failed to parse response: {e}"),
                })?;

        if body.data.is_null() {
            return Err(ScrapeError::UnexpectedShape {
                url: url_str,
                reason: "response has no data".to_string(),
            });
        }

        debug!(url = %url_str, "Request successful");
        Ok(body.data)
    }

    /// Fetch anime details by slug
    pub async fn anime(&self, slug: &str) -> Result<Value> {
        info!(slug = %slug, "Fetching anime details");
        self.get_data(&["anime", slug]).await
    }

    /// Fetch raw episode metadata by slug
    pub async fn episode(&self, slug: &str) -> Result<Value> {
        info!(slug = %slug, "Fetching episode details");
        self.get_data(&["episode", slug]).await
    }

    /// Search anime by keyword
    pub async fn search(&self, query: &str) -> Result<Value> {
        info!(query = %query, "Searching anime");
        self.get_data(&["search", query]).await
    }

    /// Fetch an episode and locate the page to scrape for links
    pub async fn episode_detail(&self, slug: &str) -> Result<EpisodeDetail> {
        let raw = self.episode(slug).await?;
        EpisodeDetail::from_payload(raw).ok_or_else(|| ScrapeError::UnexpectedShape {
            url: self
                .endpoint(&["episode", slug])
                .map(|u| u.to_string())
                .unwrap_or_else(|_| slug.to_string()),
            reason: "episode has no page URL".to_string(),
        })
    }
}
