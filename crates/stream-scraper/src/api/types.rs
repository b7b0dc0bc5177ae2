//! Upstream metadata API response types.
//!
//! The upstream wraps every payload in a `data` field. Payloads are relayed
//! to clients mostly untouched, so they are kept as raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope around every upstream payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Keys under which an episode payload may carry its page URL
const PAGE_URL_KEYS: [&str; 5] = ["url", "link", "episodeUrl", "episode_url", "pageUrl"];

/// Episode metadata with the page that holds its players and downloads
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeDetail {
    pub title: Option<String>,
    pub page_url: String,
    pub raw: Value,
}

impl EpisodeDetail {
    /// Pull the page URL out of an episode payload
    ///
    /// Returns `None` when no known key holds an absolute http(s) URL.
    pub fn from_payload(raw: Value) -> Option<Self> {
        let page_url = PAGE_URL_KEYS
            .iter()
            .filter_map(|key| raw.get(*key).and_then(Value::as_str))
            .find(|url| url.starts_with("http://") || url.starts_with("https://"))?
            .to_string();

        let title = raw
            .get("title")
            .or_else(|| raw.get("episode"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self {
            title,
            page_url,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_episode_detail_from_url_key() {
        let detail = EpisodeDetail::from_payload(json!({
            "title": "Episode 1",
            "url": "https://anime.example/episode/ep-1/"
        }))
        .unwrap();
        assert_eq!(detail.page_url, "https://anime.example/episode/ep-1/");
        assert_eq!(detail.title.as_deref(), Some("Episode 1"));
    }

    #[test]
    fn test_episode_detail_skips_relative_urls() {
        let detail = EpisodeDetail::from_payload(json!({
            "url": "/episode/ep-1",
            "episodeUrl": "https://anime.example/episode/ep-1/"
        }))
        .unwrap();
        assert_eq!(detail.page_url, "https://anime.example/episode/ep-1/");
    }

    #[test]
    fn test_episode_detail_missing_url() {
        assert!(EpisodeDetail::from_payload(json!({ "title": "Episode 1" })).is_none());
        assert!(EpisodeDetail::from_payload(json!(["not", "an", "object"])).is_none());
    }
}
