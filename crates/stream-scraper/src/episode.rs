//! Episode scraping orchestrator.
//!
//! Coordinates the static path for one episode: ask the upstream API where
//! the episode page lives, fetch that page, and run the link extractor over
//! it.

use crate::api::UpstreamClient;
use crate::error::{Result, ScrapeError};
use crate::fetch::PageFetcher;
use crate::links::{extract_links, VideoLink};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Serialize;
use tracing::info;
use url::Url;

static IFRAMES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe[src]").expect("static selector must parse"));

/// Links scraped from one episode page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeLinks {
    pub slug: String,
    pub title: Option<String>,
    pub page_url: String,
    pub links: Vec<VideoLink>,
    /// Page a browser should load when the static links come up empty
    #[serde(skip)]
    pub player_url: String,
}

/// Static scraping coordinator
#[derive(Clone)]
pub struct EpisodeScraper {
    upstream: UpstreamClient,
    fetcher: PageFetcher,
}

impl EpisodeScraper {
    pub fn new(upstream: UpstreamClient, fetcher: PageFetcher) -> Self {
        Self { upstream, fetcher }
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    /// Scrape every candidate video link for an episode
    ///
    /// Upstream and page fetch failures are errors; a page without links is
    /// an empty list. Page fetch failures are wrapped in
    /// [`ScrapeError::EpisodePage`].
    pub async fn scrape_episode(&self, slug: &str) -> Result<EpisodeLinks> {
        let detail = self.upstream.episode_detail(slug).await?;
        let html = self
            .fetcher
            .fetch_html(&detail.page_url)
            .await
            .map_err(|e| ScrapeError::EpisodePage(Box::new(e)))?;

        let links = extract_links(&html);
        let player_url = player_url(&html, &detail.page_url);

        info!(
            slug = %slug,
            page = %detail.page_url,
            links = links.len(),
            "Scraped episode page"
        );

        Ok(EpisodeLinks {
            slug: slug.to_string(),
            title: detail.title,
            page_url: detail.page_url,
            links,
            player_url,
        })
    }
}

/// First iframe on the page resolved against `page_url`, or the page itself
pub fn player_url(html: &str, page_url: &str) -> String {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    document
        .select(&IFRAMES)
        .filter_map(|iframe| iframe.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty() && !src.starts_with("about:"))
        .find_map(|src| match &base {
            Some(base) => base.join(src).ok().map(String::from),
            None => Url::parse(src).ok().map(String::from),
        })
        .unwrap_or_else(|| page_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_player_url_resolves_relative_iframe() {
        let html = r#"
            <iframe src="about:blank"></iframe>
            <iframe src="//player.example/v/42"></iframe>
        "#;
        assert_eq!(
            player_url(html, "https://anime.example/episode/ep-1/"),
            "https://player.example/v/42"
        );
    }

    #[test]
    fn test_player_url_falls_back_to_page() {
        assert_eq!(
            player_url("<p>nothing</p>", "https://anime.example/episode/ep-1/"),
            "https://anime.example/episode/ep-1/"
        );
    }

    #[tokio::test]
    async fn test_scrape_episode() {
        let server = MockServer::start().await;
        let page_url = format!("{}/episode/ep-1/", server.uri());

        Mock::given(method("GET"))
            .and(path("/api/episode/ep-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "title": "Episode 1", "url": page_url }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/episode/ep-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="download"><a href="https://mega.nz/file/abc">720p MEGA</a></div>
                   <iframe src="https://player.example/embed/1"></iframe>"#,
            ))
            .mount(&server)
            .await;

        let scraper = EpisodeScraper::new(
            UpstreamClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5), "ua")
                .unwrap(),
            PageFetcher::new(Duration::from_secs(5), "ua").unwrap(),
        );

        let episode = scraper.scrape_episode("ep-1").await.unwrap();
        assert_eq!(episode.title.as_deref(), Some("Episode 1"));
        assert_eq!(episode.page_url, page_url);
        assert_eq!(episode.links.len(), 2);
        assert_eq!(episode.links[0].provider, "MEGA");
        assert_eq!(episode.links[0].quality, "720p");
        assert_eq!(episode.player_url, "https://player.example/embed/1");
    }

    #[tokio::test]
    async fn test_scrape_episode_page_failure_is_error() {
        let server = MockServer::start().await;
        let page_url = format!("{}/episode/gone/", server.uri());

        Mock::given(method("GET"))
            .and(path("/api/episode/gone"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "url": page_url } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/episode/gone/"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let scraper = EpisodeScraper::new(
            UpstreamClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5), "ua")
                .unwrap(),
            PageFetcher::new(Duration::from_secs(5), "ua").unwrap(),
        );

        let err = scraper.scrape_episode("gone").await.unwrap_err();
        assert!(err.to_string().contains("maintenance"));
    }

    #[tokio::test]
    async fn test_scrape_episode_missing_page_is_not_not_found() {
        let server = MockServer::start().await;
        let page_url = format!("{}/episode/moved/", server.uri());

        Mock::given(method("GET"))
            .and(path("/api/episode/moved"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "url": page_url } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/episode/moved/"))
            .respond_with(ResponseTemplate::new(404).set_body_string("page removed"))
            .mount(&server)
            .await;

        let scraper = EpisodeScraper::new(
            UpstreamClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5), "ua")
                .unwrap(),
            PageFetcher::new(Duration::from_secs(5), "ua").unwrap(),
        );

        let err = scraper.scrape_episode("moved").await.unwrap_err();
        assert!(matches!(err, ScrapeError::EpisodePage(_)));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("page removed"));
    }
}
