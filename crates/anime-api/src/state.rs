//! Shared handler state.

use crate::rate_limiter::RateLimiter;
use anyhow::{Context, Result};
use shared::{Config, HistoryStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stream_scraper::{
    BrowserSession, EmbedResolver, EpisodeScraper, HeadlessExtractor, PageFetcher, UpstreamClient,
};

/// Everything a handler can reach, cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub scraper: EpisodeScraper,
    pub resolver: EmbedResolver,
    /// Present only when the headless fallback is enabled
    pub headless: Option<Arc<HeadlessExtractor>>,
    pub history: Arc<Mutex<HistoryStore>>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    /// Build clients and extractors from configuration
    ///
    /// The browser is not launched here; the session starts on first use.
    pub fn new(config: Config, history: HistoryStore) -> Result<Self> {
        let upstream = UpstreamClient::new(
            &config.upstream.base_url,
            Duration::from_secs(config.upstream.timeout_secs),
            &config.upstream.user_agent,
        )
        .context("Failed to create upstream client")?;

        let fetcher = PageFetcher::new(
            Duration::from_secs(config.scraper.timeout_secs),
            &config.scraper.user_agent,
        )
        .context("Failed to create page fetcher")?;

        let headless = if config.headless.enabled {
            let session = Arc::new(BrowserSession::new(
                config.headless.executable.clone(),
                config.headless.max_contexts,
            ));
            let extractor = HeadlessExtractor::new(session, config.headless.clone())
                .context("Failed to create headless extractor")?;
            Some(Arc::new(extractor))
        } else {
            None
        };

        let rate_limiter = config
            .rate_limit
            .enabled
            .then(|| Arc::new(RateLimiter::new(config.rate_limit.requests_per_minute)));

        Ok(Self {
            config: Arc::new(config),
            scraper: EpisodeScraper::new(upstream, fetcher.clone()),
            resolver: EmbedResolver::new(fetcher),
            headless,
            history: Arc::new(Mutex::new(history)),
            rate_limiter,
        })
    }

    /// The shared browser session, if headless extraction is enabled
    pub fn browser_session(&self) -> Option<&Arc<BrowserSession>> {
        self.headless.as_deref().map(HeadlessExtractor::session)
    }
}
