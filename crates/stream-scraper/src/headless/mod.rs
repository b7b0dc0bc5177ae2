//! Headless browser fallback.
//!
//! Some players only reveal their media once JavaScript has run, and some
//! download links only appear after a gateway page's countdown. Both are
//! handled by loading the page in a real browser and inspecting the DOM and
//! the network traffic it produced.
//!
//! Every failure on this path (launch, navigation, timeout, evaluation) is
//! logged and reported as "nothing found".

pub mod capture;
pub mod gateway;
pub mod normalize;
pub mod session;
pub mod stream;

pub use gateway::{find_gateway_link, GatewaySnapshot};
pub use normalize::HostPatterns;
pub use session::{BrowserContext, BrowserSession};
pub use stream::{choose_stream, StreamSnapshot};

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::network::{
    self, Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use shared::config::HeadlessConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Kind of stream found by the headless extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Hls,
    Mp4,
}

/// A stream URL and its kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(rename = "type")]
    pub kind: StreamKind,
    pub url: String,
}

impl ExtractionResult {
    /// HLS when the URL mentions `.m3u8`, MP4 otherwise
    pub fn classify(url: impl Into<String>) -> Self {
        let url = url.into();
        if url.contains(".m3u8") {
            Self::hls(url)
        } else {
            Self::mp4(url)
        }
    }

    pub fn hls(url: impl Into<String>) -> Self {
        Self {
            kind: StreamKind::Hls,
            url: url.into(),
        }
    }

    pub fn mp4(url: impl Into<String>) -> Self {
        Self {
            kind: StreamKind::Mp4,
            url: url.into(),
        }
    }
}

/// Runs stream and gateway extraction on a shared browser session
pub struct HeadlessExtractor {
    session: Arc<BrowserSession>,
    config: HeadlessConfig,
    patterns: HostPatterns,
}

impl HeadlessExtractor {
    pub fn new(session: Arc<BrowserSession>, config: HeadlessConfig) -> Result<Self> {
        let patterns = HostPatterns::new(&config.target_host)
            .with_context(|| format!("Invalid target host '{}'", config.target_host))?;
        Ok(Self {
            session,
            config,
            patterns,
        })
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    /// Load a player page and recover its HLS or MP4 stream
    pub async fn extract_stream(&self, url: &str) -> Option<ExtractionResult> {
        let context = match self.session.open_context().await {
            Ok(context) => context,
            Err(e) => {
                warn!(url = %url, error = %e, "Headless browser unavailable");
                return None;
            }
        };

        let outcome = stream::run(context.page(), url, &self.config).await;
        context.close().await;

        match outcome {
            Ok(Some(result)) => {
                info!(url = %url, stream = %result.url, kind = ?result.kind, "Extracted stream");
                Some(result)
            }
            Ok(None) => {
                info!(url = %url, "No stream found on page");
                None
            }
            Err(e) => {
                warn!(url = %url, error = %format!("{e:#}"), "Stream extraction failed");
                None
            }
        }
    }

    /// Load a gateway page and recover the canonical download-host link
    pub async fn extract_gateway_link(&self, url: &str) -> Option<String> {
        let context = match self.session.open_context().await {
            Ok(context) => context,
            Err(e) => {
                warn!(url = %url, error = %e, "Headless browser unavailable");
                return None;
            }
        };

        let outcome = gateway::run(context.page(), url, &self.config, &self.patterns).await;
        context.close().await;

        match outcome {
            Ok(Some(link)) => {
                info!(url = %url, link = %link, "Resolved gateway link");
                Some(link)
            }
            Ok(None) => {
                info!(url = %url, host = self.patterns.host(), "No host link on gateway page");
                None
            }
            Err(e) => {
                warn!(url = %url, error = %format!("{e:#}"), "Gateway resolution failed");
                None
            }
        }
    }
}

/// Aborts a spawned listener when dropped
pub(crate) struct AbortOnDrop(pub(crate) JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Desktop identity and request headers for a fresh page
pub(crate) async fn prepare_page(page: &Page, user_agent: &str, referer: &str) -> Result<()> {
    page.execute(network::EnableParams::default())
        .await
        .context("Failed to enable network domain")?;
    page.execute(SetUserAgentOverrideParams::new(user_agent))
        .await
        .context("Failed to set user agent")?;
    page.execute(SetExtraHttpHeadersParams::new(Headers::new(
        serde_json::json!({ "Referer": referer, "Accept": ACCEPT }),
    )))
    .await
    .context("Failed to set request headers")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            ExtractionResult::classify("https://cdn.example/a/master.m3u8?x=1").kind,
            StreamKind::Hls
        );
        assert_eq!(
            ExtractionResult::classify("https://cdn.example/a.mp4").kind,
            StreamKind::Mp4
        );
        // Unknown extensions are reported as mp4
        assert_eq!(
            ExtractionResult::classify("https://cdn.example/play?id=1").kind,
            StreamKind::Mp4
        );
    }

    #[test]
    fn test_result_serializes_with_type_key() {
        let json = serde_json::to_value(ExtractionResult::hls("https://cdn.example/x.m3u8")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "hls", "url": "https://cdn.example/x.m3u8" })
        );
    }

    #[test]
    fn test_host_text_is_escaped() {
        let config = HeadlessConfig {
            target_host: "pixel(drain".to_string(),
            ..HeadlessConfig::default()
        };
        // regex::escape makes any host text a valid pattern
        let session = Arc::new(BrowserSession::new(None, 1));
        assert!(HeadlessExtractor::new(session, config).is_ok());
    }

    #[tokio::test]
    async fn test_extract_after_shutdown_is_soft_miss() {
        let session = Arc::new(BrowserSession::new(None, 1));
        session.shutdown().await;
        let extractor = HeadlessExtractor::new(Arc::clone(&session), HeadlessConfig::default()).unwrap();

        assert!(extractor.extract_stream("https://player.example/e/1").await.is_none());
        assert!(extractor
            .extract_gateway_link("https://gateway.example/go/1")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_extraction_frees_context_slot() {
        let session = Arc::new(BrowserSession::new(Some("/nonexistent/chrome".to_string()), 1));
        let extractor = HeadlessExtractor::new(Arc::clone(&session), HeadlessConfig::default()).unwrap();

        for _ in 0..2 {
            let found = tokio::time::timeout(
                std::time::Duration::from_secs(5),
                extractor.extract_stream("https://player.example/e/1"),
            )
            .await
            .unwrap();
            assert!(found.is_none());
            assert_eq!(session.available_contexts(), 1);
        }
    }
}
