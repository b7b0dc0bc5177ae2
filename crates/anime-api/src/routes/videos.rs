//! Video link scraping and stream resolution.

use super::{required, success, Success};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stream_scraper::{ExtractionResult, HeadlessExtractor, LinkType, StreamKind, VideoLink};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct VideosParams {
    #[serde(default)]
    headless: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Videos {
    slug: String,
    title: Option<String>,
    page_url: String,
    count: usize,
    links: Vec<VideoLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    #[serde(default)]
    embed_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolved {
    embed_url: String,
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Serialize)]
pub struct Stream {
    result: ExtractionResult,
}

#[derive(Debug, Serialize)]
pub struct Gateway {
    url: String,
}

/// `GET /api/videos/{slug}[?headless=true]`
///
/// Scrapes the episode page for links. With `headless=true`, an empty result
/// falls back to loading the page's player in the browser.
pub async fn videos(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    params: Result<Query<VideosParams>, QueryRejection>,
) -> AppResult<Json<Success<Videos>>> {
    let Query(params) = params?;
    let slug = required(&slug, "slug")?;

    let episode = state
        .scraper
        .scrape_episode(slug)
        .await
        .map_err(|e| AppError::upstream("Failed to scrape episode", e))?;

    let mut links = episode.links;
    if links.is_empty() && params.headless {
        if let Some(headless) = &state.headless {
            info!(slug = %slug, player = %episode.player_url, "No static links, trying headless");
            if let Some(found) = headless.extract_stream(&episode.player_url).await {
                links.push(headless_link(found));
            }
        }
    }

    if links.is_empty() {
        return Err(AppError::not_found("No video links found"));
    }

    Ok(success(Videos {
        slug: episode.slug,
        title: episode.title,
        page_url: episode.page_url,
        count: links.len(),
        links,
    }))
}

/// `POST /api/resolve {"embedUrl"}`
pub async fn resolve(
    State(state): State<AppState>,
    body: Result<Json<ResolveRequest>, JsonRejection>,
) -> AppResult<Json<Success<Resolved>>> {
    let Json(body) = body?;
    let embed_url = required(&body.embed_url, "embedUrl")?;

    let url = state
        .resolver
        .resolve_direct_stream(embed_url)
        .await
        .ok_or_else(|| AppError::not_found("No direct stream found"))?;

    Ok(success(Resolved {
        embed_url: embed_url.to_string(),
        url,
    }))
}

/// `POST /api/stream {"url"}`
pub async fn stream(
    State(state): State<AppState>,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> AppResult<Json<Success<Stream>>> {
    let Json(body) = body?;
    let url = required(&body.url, "url")?;
    let headless = headless(&state)?;

    let result = headless
        .extract_stream(url)
        .await
        .ok_or_else(|| AppError::not_found("No stream found"))?;

    Ok(success(Stream { result }))
}

/// `POST /api/gateway {"url"}`
pub async fn gateway(
    State(state): State<AppState>,
    body: Result<Json<UrlRequest>, JsonRejection>,
) -> AppResult<Json<Success<Gateway>>> {
    let Json(body) = body?;
    let url = required(&body.url, "url")?;
    let headless = headless(&state)?;

    let url = headless
        .extract_gateway_link(url)
        .await
        .ok_or_else(|| AppError::not_found("No download link found"))?;

    Ok(success(Gateway { url }))
}

fn headless(state: &AppState) -> AppResult<&Arc<HeadlessExtractor>> {
    state
        .headless
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Headless extraction is disabled"))
}

/// Present a headless hit the way the script scan labels the same URL
fn headless_link(found: ExtractionResult) -> VideoLink {
    let (quality, link_type) = match found.kind {
        StreamKind::Hls => ("hls", LinkType::Stream),
        StreamKind::Mp4 => ("direct", LinkType::Direct),
    };
    VideoLink {
        url: found.url,
        quality: quality.to_string(),
        provider: "Headless".to_string(),
        link_type,
        display_text: "Headless".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_episode(server: &MockServer, slug: &str, html: &str) {
        let page_url = format!("{}/page/{slug}/", server.uri());
        Mock::given(method("GET"))
            .and(path(format!("/api/episode/{slug}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "title": "Episode 1", "url": page_url }
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/page/{slug}/")))
            .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_videos_lists_links() {
        let server = MockServer::start().await;
        mount_episode(
            &server,
            "ep-1",
            r#"<div class="download">
                 <a href="https://drive.google.com/file/d/1">480p</a>
                 <a href="https://unknown-host.example/f/1">720p</a>
               </div>
               <script>var v = "https://cdn.example/ep1.m3u8";</script>"#,
        )
        .await;

        let (status, body) = send(
            state(&format!("{}/api", server.uri())),
            get("/api/videos/ep-1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["count"], 2);
        assert_eq!(body["links"][0]["provider"], "Google Drive");
        assert_eq!(body["links"][0]["type"], "download");
        assert_eq!(body["links"][1]["type"], "stream");
        assert_eq!(body["links"][1]["displayText"], "HLS Stream");
    }

    #[tokio::test]
    async fn test_videos_without_links_is_404() {
        let server = MockServer::start().await;
        mount_episode(&server, "empty", "<p>coming soon</p>").await;

        // Headless requested but disabled: still a plain miss
        let (status, body) = send(
            state(&format!("{}/api", server.uri())),
            get("/api/videos/empty?headless=true"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "No video links found");
    }

    #[tokio::test]
    async fn test_videos_upstream_failure_is_500() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database offline"))
            .mount(&server)
            .await;

        let (status, body) = send(
            state(&format!("{}/api", server.uri())),
            get("/api/videos/ep-1"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("database offline"));
    }

    #[tokio::test]
    async fn test_resolve() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/embed/7"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<video><source src="https://cdn.example/7.mp4"></video>"#,
            ))
            .mount(&server)
            .await;

        let embed_url = format!("{}/embed/7", server.uri());
        let (status, body) = send(
            state("http://127.0.0.1:9/api"),
            post_json("/api/resolve", json!({ "embedUrl": embed_url })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "https://cdn.example/7.mp4");
        assert_eq!(body["embedUrl"], embed_url);
    }

    #[tokio::test]
    async fn test_resolve_miss_and_missing_input() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>no player</p>"))
            .mount(&server)
            .await;

        let (status, _) = send(
            state("http://127.0.0.1:9/api"),
            post_json("/api/resolve", json!({ "embedUrl": format!("{}/e", server.uri()) })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            state("http://127.0.0.1:9/api"),
            post_json("/api/resolve", json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "embedUrl is required");
    }

    #[tokio::test]
    async fn test_headless_routes_unavailable_when_disabled() {
        let (status, body) = send(
            state("http://127.0.0.1:9/api"),
            post_json("/api/stream", json!({ "url": "https://player.example/e/1" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");

        let (status, _) = send(
            state("http://127.0.0.1:9/api"),
            post_json("/api/gateway", json!({ "url": "https://gateway.example/go/1" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_stream_validates_before_availability() {
        let (status, _) = send(
            state("http://127.0.0.1:9/api"),
            post_json("/api/stream", json!({ "url": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_videos_missing_page_is_500() {
        let server = MockServer::start().await;
        let page_url = format!("{}/page/moved/", server.uri());
        Mock::given(method("GET"))
            .and(path("/api/episode/moved"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": { "url": page_url } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page/moved/"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;

        let (status, body) = send(
            state(&format!("{}/api", server.uri())),
            get("/api/videos/moved"),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to scrape episode");
        assert!(body["error"].as_str().unwrap().contains("gone"));
    }

    #[tokio::test]
    async fn test_videos_unknown_episode_is_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/episode/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such episode"))
            .mount(&server)
            .await;

        let (status, _) = send(
            state(&format!("{}/api", server.uri())),
            get("/api/videos/nope"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_headless_link_shape() {
        let link = headless_link(ExtractionResult::hls("https://cdn.example/x.m3u8"));
        assert_eq!(link.quality, "hls");
        assert_eq!(link.provider, "Headless");
        assert_eq!(link.link_type, LinkType::Stream);

        let link = headless_link(ExtractionResult::mp4("https://cdn.example/x.mp4"));
        assert_eq!(link.quality, "direct");
        assert_eq!(link.link_type, LinkType::Direct);
    }
}
