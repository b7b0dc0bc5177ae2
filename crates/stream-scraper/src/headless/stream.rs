//! Stream URL recovery from JavaScript players.

use super::capture::{wait_for_network_idle, ActivityClock, CapturedRequests};
use super::{prepare_page, AbortOnDrop, ExtractionResult};
use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::fetch::{self, ContinueRequestParams, EventRequestPaused};
use chromiumoxide::cdp::browser_protocol::network::ResourceType;
use chromiumoxide::Page;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use shared::config::HeadlessConfig;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Video element source and inline script bodies after the page settled
const SNAPSHOT_JS: &str = r#"(() => {
    const video = document.querySelector('video');
    let videoSrc = null;
    if (video) {
        videoSrc = video.currentSrc || video.src || null;
        if (!videoSrc) {
            const source = video.querySelector('source');
            if (source && source.src) videoSrc = source.src;
        }
    }
    const scripts = Array.from(document.querySelectorAll('script'))
        .map(s => s.textContent || '')
        .filter(t => t.length > 0);
    return { videoSrc, scripts };
})()"#;

static QUOTED_M3U8: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'](https?://[^"'\s]*\.m3u8[^"'\s]*)["']"#).expect("valid regex"));
static QUOTED_MP4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'](https?://[^"'\s]*\.mp4[^"'\s]*)["']"#).expect("valid regex"));

/// DOM state read from the page
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub video_src: Option<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
}

/// Load `url` and recover its stream
pub(super) async fn run(
    page: &Page,
    url: &str,
    config: &HeadlessConfig,
) -> Result<Option<ExtractionResult>> {
    prepare_page(page, &config.user_agent, &config.stream_referer).await?;

    let captured = Arc::new(Mutex::new(CapturedRequests::new()));
    let clock = Arc::new(ActivityClock::new());

    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .context("Failed to listen for paused requests")?;
    let _listener = AbortOnDrop(tokio::spawn({
        let page = page.clone();
        let captured = Arc::clone(&captured);
        let clock = Arc::clone(&clock);
        async move {
            while let Some(event) = paused.next().await {
                clock.touch();
                let is_media = event.resource_type == ResourceType::Media;
                if let Ok(mut captured) = captured.lock() {
                    if captured.record(&event.request.url, is_media) {
                        debug!(url = %event.request.url, "Captured media request");
                    }
                }
                // Every request goes through unmodified
                if let Err(e) = page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                {
                    debug!(error = %e, "Failed to continue request");
                }
            }
        }
    }));

    page.execute(fetch::EnableParams::default())
        .await
        .context("Failed to enable request interception")?;

    tokio::time::timeout(config.stream_timeout(), async {
        page.goto(url).await.context("Navigation failed")?;
        wait_for_network_idle(&clock, config.idle_quiet()).await;
        Ok::<_, anyhow::Error>(())
    })
    .await
    .context("Timed out loading player page")??;

    tokio::time::sleep(config.settle_delay()).await;

    let snapshot: StreamSnapshot = page
        .evaluate(SNAPSHOT_JS)
        .await
        .context("Failed to inspect page")?
        .into_value()
        .context("Unexpected page snapshot")?;

    let captured = captured
        .lock()
        .map_err(|_| anyhow::anyhow!("Capture state poisoned"))?;
    debug!(
        captured = captured.len(),
        scripts = snapshot.scripts.len(),
        has_video = snapshot.video_src.is_some(),
        "Page settled"
    );

    Ok(choose_stream(&snapshot, &captured))
}

/// Pick the stream: DOM/script findings first, then captured requests
pub fn choose_stream(
    snapshot: &StreamSnapshot,
    captured: &CapturedRequests,
) -> Option<ExtractionResult> {
    if let Some(url) = page_stream(snapshot) {
        return Some(ExtractionResult::classify(url));
    }

    captured
        .first_containing("m3u8")
        .map(ExtractionResult::hls)
        .or_else(|| captured.first_containing("mp4").map(ExtractionResult::mp4))
}

/// Stream URL visible in the page itself
fn page_stream(snapshot: &StreamSnapshot) -> Option<String> {
    let video = snapshot
        .video_src
        .as_deref()
        .map(str::trim)
        .filter(|src| !src.is_empty() && !src.starts_with("blob:"));
    if let Some(src) = video {
        return Some(src.to_string());
    }

    [&*QUOTED_M3U8, &*QUOTED_MP4].iter().find_map(|pattern| {
        snapshot.scripts.iter().find_map(|body| {
            pattern
                .captures(body)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
    })
}
