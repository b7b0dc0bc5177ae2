//! Download-host link recovery from gateway pages.
//!
//! Gateway pages sit between an episode and its download host, usually behind
//! a countdown or a click-through. The first source to mention the host wins:
//! 1. the page's own URL, when it already redirected onto the host
//! 2. an anchor whose href mentions the host
//! 3. an inline click handler mentioning the host
//! 4. an absolute host URL in a script body
//! 5. the last network response from the host
//!
//! Whatever is found is canonicalized with [`HostPatterns::normalize`].

use super::capture::{wait_for_network_idle, ActivityClock};
use super::normalize::HostPatterns;
use super::{prepare_page, AbortOnDrop};
use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::network::{EventRequestWillBeSent, EventResponseReceived};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::Deserialize;
use shared::config::HeadlessConfig;
use std::sync::{Arc, Mutex};
use tracing::debug;
use url::Url;

const SNAPSHOT_JS: &str = r#"(() => ({
    anchors: Array.from(document.querySelectorAll('a[href]')).map(a => a.href),
    onclicks: Array.from(document.querySelectorAll('[onclick]'))
        .map(e => e.getAttribute('onclick') || ''),
    scripts: Array.from(document.querySelectorAll('script'))
        .map(s => s.textContent || '')
        .filter(t => t.length > 0),
}))()"#;

/// Link-bearing parts of a gateway page
#[derive(Debug, Default, Deserialize)]
pub struct GatewaySnapshot {
    #[serde(default)]
    pub anchors: Vec<String>,
    #[serde(default)]
    pub onclicks: Vec<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
}

/// Load a gateway page and recover the download-host link
pub(super) async fn run(
    page: &Page,
    url: &str,
    config: &HeadlessConfig,
    patterns: &HostPatterns,
) -> Result<Option<String>> {
    prepare_page(page, &config.user_agent, &config.gateway_referer).await?;

    let clock = Arc::new(ActivityClock::new());
    let last_host_response: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

    let mut requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .context("Failed to listen for requests")?;
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .context("Failed to listen for responses")?;

    let _requests = AbortOnDrop(tokio::spawn({
        let clock = Arc::clone(&clock);
        async move {
            while requests.next().await.is_some() {
                clock.touch();
            }
        }
    }));
    let _responses = AbortOnDrop(tokio::spawn({
        let clock = Arc::clone(&clock);
        let last = Arc::clone(&last_host_response);
        let patterns = patterns.clone();
        async move {
            while let Some(event) = responses.next().await {
                clock.touch();
                let response_url = &event.response.url;
                if patterns.mentions_host(response_url) {
                    if let Ok(mut last) = last.lock() {
                        *last = Some(response_url.clone());
                    }
                }
            }
        }
    }));

    tokio::time::timeout(config.gateway_timeout(), async {
        page.goto(url).await.context("Navigation failed")?;
        wait_for_network_idle(&clock, config.idle_quiet()).await;
        Ok::<_, anyhow::Error>(())
    })
    .await
    .context("Timed out loading gateway page")??;

    tokio::time::sleep(config.settle_delay()).await;

    let current_url = page.url().await.context("Failed to read page URL")?;
    let snapshot: GatewaySnapshot = page
        .evaluate(SNAPSHOT_JS)
        .await
        .context("Failed to inspect page")?
        .into_value()
        .context("Unexpected page snapshot")?;
    let observed = last_host_response.lock().ok().and_then(|last| last.clone());

    debug!(
        current = current_url.as_deref().unwrap_or(""),
        anchors = snapshot.anchors.len(),
        onclicks = snapshot.onclicks.len(),
        scripts = snapshot.scripts.len(),
        observed = observed.is_some(),
        "Gateway page settled"
    );

    Ok(find_gateway_link(
        current_url.as_deref(),
        &snapshot,
        observed.as_deref(),
        patterns,
    ))
}

/// Pick and canonicalize the download-host link
pub fn find_gateway_link(
    current_url: Option<&str>,
    snapshot: &GatewaySnapshot,
    observed_response: Option<&str>,
    patterns: &HostPatterns,
) -> Option<String> {
    let on_host = current_url
        .filter(|url| is_on_host(url, patterns.host()))
        .map(str::to_string);

    let found = on_host
        .or_else(|| {
            snapshot
                .anchors
                .iter()
                .find(|href| patterns.mentions_host(href))
                .cloned()
        })
        .or_else(|| {
            snapshot
                .onclicks
                .iter()
                .filter(|handler| patterns.mentions_host(handler))
                .find_map(|handler| patterns.onclick_target(handler))
        })
        .or_else(|| {
            snapshot
                .scripts
                .iter()
                .find_map(|body| patterns.first_absolute(body))
        })
        .or_else(|| {
            observed_response
                .filter(|url| patterns.mentions_host(url))
                .map(str::to_string)
        })?;

    Some(patterns.normalize(&found))
}

/// Whether `url` is served from `host` or one of its subdomains
fn is_on_host(url: &str, host: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
        .map(|h| h == host || h.ends_with(&format!(".{host}")))
        .unwrap_or(false)
}
