//! Direct stream resolution for embed pages.
//!
//! An embed page either exposes its media in a `<video>` element or hands a
//! URL to a player script. Lookup order, first hit wins:
//! 1. `<video><source src>`
//! 2. `<video data-src>`, then `<video src>`
//! 3. a `source`/`src`/`file` assignment in a script whose value holds `.mp4`,
//!    then the same for `.m3u8`

use crate::fetch::PageFetcher;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

static VIDEO_SOURCE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("video source[src]").expect("static selector must parse"));
static VIDEO: Lazy<Selector> =
    Lazy::new(|| Selector::parse("video").expect("static selector must parse"));
static SCRIPTS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("static selector must parse"));

static ASSIGNED_MP4: Lazy<Regex> = Lazy::new(|| assignment_pattern(r"\.mp4"));
static ASSIGNED_M3U8: Lazy<Regex> = Lazy::new(|| assignment_pattern(r"\.m3u8"));

/// `source: "..."`, `'file' = '...'`, `src:"..."` where the value contains `ext`
fn assignment_pattern(ext: &str) -> Regex {
    Regex::new(&format!(
        r#"(?i)["']?(?:source|src|file)["']?\s*[:=]\s*["']([^"']*{ext}[^"']*)["']"#
    ))
    .expect("valid regex")
}

/// Resolves embed pages to a single direct media URL
#[derive(Clone)]
pub struct EmbedResolver {
    fetcher: PageFetcher,
}

impl EmbedResolver {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch an embed page and find its direct stream
    ///
    /// A failed fetch is logged and reported as "not found" rather than as an
    /// error.
    pub async fn resolve_direct_stream(&self, embed_url: &str) -> Option<String> {
        let html = match self.fetcher.fetch_html(embed_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %embed_url, error = %e, "Failed to fetch embed page");
                return None;
            }
        };

        let found = find_direct_stream(&html);
        match &found {
            Some(url) => info!(embed = %embed_url, stream = %url, "Resolved direct stream"),
            None => debug!(embed = %embed_url, "No direct stream in embed page"),
        }
        found
    }
}

/// Find a direct media URL in an embed page
pub fn find_direct_stream(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    if let Some(src) = document
        .select(&VIDEO_SOURCE)
        .find_map(|source| non_empty(source.value().attr("src")))
    {
        return Some(src);
    }

    if let Some(video) = document.select(&VIDEO).next() {
        let element = video.value();
        if let Some(src) =
            non_empty(element.attr("data-src")).or_else(|| non_empty(element.attr("src")))
        {
            return Some(src);
        }
    }

    let scripts: Vec<String> = document
        .select(&SCRIPTS)
        .map(|script| script.text().collect())
        .collect();

    [&*ASSIGNED_MP4, &*ASSIGNED_M3U8].iter().find_map(|pattern| {
        scripts.iter().find_map(|body| {
            pattern
                .captures(body)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
