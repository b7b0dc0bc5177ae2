//! Video link extraction from episode pages.
//!
//! Four independent heuristics run over the same document and their results
//! are merged, then deduplicated by URL:
//! 1. Anchors inside download sections that point at a known file host
//! 2. Embedded player iframes
//! 3. Mirror/stream/play buttons
//! 4. MP4 and M3U8 URLs found in inline scripts
//!
//! Extraction is pure: it never performs I/O and never fails. Malformed
//! markup only means fewer links.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// How a link was found and how it should be consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Download,
    Iframe,
    Stream,
    Direct,
}

/// A candidate video link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoLink {
    pub url: String,
    /// "unknown", a resolution such as "720p", "stream", "direct" or "hls"
    pub quality: String,
    pub provider: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
    pub display_text: String,
}

/// A file host accepted in download sections
struct FileHost {
    label: &'static str,
    domains: &'static [&'static str],
}

/// Allow-list of download hosts, in match priority order
const FILE_HOSTS: &[FileHost] = &[
    FileHost { label: "Google Drive", domains: &["drive.google.com"] },
    FileHost { label: "MEGA", domains: &["mega.nz", "mega.co.nz"] },
    FileHost { label: "MediaFire", domains: &["mediafire.com"] },
    FileHost { label: "StreamSB", domains: &["streamsb.net", "streamsb.com", "sbembed.com"] },
    FileHost { label: "MP4Upload", domains: &["mp4upload.com"] },
    FileHost { label: "YourUpload", domains: &["yourupload.com"] },
    FileHost { label: "Fembed", domains: &["fembed.com"] },
    FileHost { label: "Streamlare", domains: &["streamlare.com"] },
    FileHost { label: "Zippyshare", domains: &["zippyshare.com"] },
    FileHost { label: "Racaty", domains: &["racaty.net", "racaty.io"] },
];

const IFRAME_KEYWORDS: [&str; 3] = ["stream", "embed", "player"];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static DOWNLOAD_SECTIONS: Lazy<Selector> =
    Lazy::new(|| selector(".download, .download-eps, .download-links, .dlbox, #download"));
static ANCHORS: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static IFRAMES: Lazy<Selector> = Lazy::new(|| selector("iframe[src]"));
static STREAM_BUTTONS: Lazy<Selector> = Lazy::new(|| {
    selector(".mirrorstream a, .mirror a, .mirror-stream a, a.stream, .btn-stream, .stream-btn, .play-btn, button[data-src]")
});
static SCRIPTS: Lazy<Selector> = Lazy::new(|| selector("script"));

static QUALITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3,4}p?").expect("valid regex"));
static SCRIPT_MP4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)https?://[^\s"']+\.mp4"#).expect("valid regex"));
static SCRIPT_M3U8: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)https?://[^\s"']+\.m3u8"#).expect("valid regex"));

/// Extract every candidate video link from a page
///
/// Links are returned in first-seen order; when a URL is found more than
/// once, the entry from the latest heuristic wins but keeps the original
/// position.
pub fn extract_links(html: &str) -> Vec<VideoLink> {
    let document = Html::parse_document(html);

    let mut links = Vec::new();
    links.extend(download_links(&document));
    links.extend(iframe_links(&document));
    links.extend(stream_button_links(&document));
    links.extend(script_links(&document));

    dedup_by_url(links)
}

fn download_links(document: &Html) -> Vec<VideoLink> {
    let mut links = Vec::new();

    for section in document.select(&DOWNLOAD_SECTIONS) {
        for anchor in section.select(&ANCHORS) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(provider) = file_host_label(href) else {
                continue;
            };

            let text = visible_text(&anchor);
            let quality = QUALITY
                .find(&text)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string());

            links.push(VideoLink {
                url: href.to_string(),
                quality,
                provider: provider.to_string(),
                link_type: LinkType::Download,
                display_text: text,
            });
        }
    }

    links
}

fn iframe_links(document: &Html) -> Vec<VideoLink> {
    document
        .select(&IFRAMES)
        .filter_map(|iframe| iframe.value().attr("src"))
        .filter(|src| IFRAME_KEYWORDS.iter().any(|k| src.contains(k)))
        .map(|src| VideoLink {
            url: src.to_string(),
            quality: "stream".to_string(),
            provider: "embed".to_string(),
            link_type: LinkType::Iframe,
            display_text: "Embedded Player".to_string(),
        })
        .collect()
}

fn stream_button_links(document: &Html) -> Vec<VideoLink> {
    let mut links = Vec::new();

    for button in document.select(&STREAM_BUTTONS) {
        let element = button.value();
        let Some(target) = element.attr("href").or_else(|| element.attr("data-src")) else {
            continue;
        };
        if !is_absolute(target) {
            continue;
        }

        let text = visible_text(&button);
        let provider = if text.is_empty() {
            "Stream".to_string()
        } else {
            text.clone()
        };

        links.push(VideoLink {
            url: target.to_string(),
            quality: "stream".to_string(),
            provider,
            link_type: LinkType::Stream,
            display_text: text,
        });
    }

    links
}

fn script_links(document: &Html) -> Vec<VideoLink> {
    let mut links = Vec::new();

    for script in document.select(&SCRIPTS) {
        let body: String = script.text().collect();

        for m in SCRIPT_MP4.find_iter(&body) {
            links.push(VideoLink {
                url: m.as_str().to_string(),
                quality: "direct".to_string(),
                provider: "Direct MP4".to_string(),
                link_type: LinkType::Direct,
                display_text: "Direct MP4".to_string(),
            });
        }

        for m in SCRIPT_M3U8.find_iter(&body) {
            links.push(VideoLink {
                url: m.as_str().to_string(),
                quality: "hls".to_string(),
                provider: "HLS Stream".to_string(),
                link_type: LinkType::Stream,
                display_text: "HLS Stream".to_string(),
            });
        }
    }

    links
}

/// Keep one link per URL: the last one seen, at the first one's position
pub fn dedup_by_url(links: Vec<VideoLink>) -> Vec<VideoLink> {
    let mut unique: IndexMap<String, VideoLink> = IndexMap::with_capacity(links.len());
    for link in links {
        unique.insert(link.url.clone(), link);
    }
    unique.into_values().collect()
}

/// Provider label for an allow-listed download host
fn file_host_label(href: &str) -> Option<&'static str> {
    let url = Url::parse(href).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();

    FILE_HOSTS
        .iter()
        .find(|fh| {
            fh.domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{d}")))
        })
        .map(|fh| fh.label)
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Element text with whitespace collapsed
fn visible_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
