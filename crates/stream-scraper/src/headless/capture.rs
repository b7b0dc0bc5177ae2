//! Bookkeeping shared between a page's event listeners and its extractor.

use indexmap::IndexSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Media requests observed while a page loads, in order of first sight
#[derive(Debug, Default)]
pub struct CapturedRequests {
    urls: IndexSet<String>,
}

impl CapturedRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request if it looks like media
    ///
    /// Returns whether the URL was kept.
    pub fn record(&mut self, url: &str, is_media_resource: bool) -> bool {
        if is_media_resource || url.contains(".m3u8") || url.contains(".mp4") {
            self.urls.insert(url.to_string());
            true
        } else {
            false
        }
    }

    /// First captured URL containing `needle`
    pub fn first_containing(&self, needle: &str) -> Option<&str> {
        self.urls
            .iter()
            .map(String::as_str)
            .find(|url| url.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Time of the most recent network activity on a page
#[derive(Debug)]
pub struct ActivityClock {
    last: Mutex<Instant>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
        }
    }
}

impl ActivityClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark activity now
    pub fn touch(&self) {
        if let Ok(mut last) = self.last.lock() {
            *last = Instant::now();
        }
    }

    /// Time since the last activity
    pub fn quiet_for(&self) -> Duration {
        self.last
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }
}

/// Wait until the network has been quiet for `quiet`, two checks in a row
///
/// Never returns while activity keeps arriving; callers bound it with a
/// timeout.
pub async fn wait_for_network_idle(clock: &ActivityClock, quiet: Duration) {
    let mut quiet_checks = 0;
    while quiet_checks < 2 {
        tokio::time::sleep(quiet).await;
        if clock.quiet_for() >= quiet {
            quiet_checks += 1;
        } else {
            quiet_checks = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_filters_and_orders() {
        let mut captured = CapturedRequests::new();

        assert!(!captured.record("https://site.example/app.js", false));
        assert!(captured.record("https://cdn.example/seg/index.m3u8?t=1", false));
        assert!(captured.record("https://cdn.example/blob-stream", true));
        assert!(captured.record("https://cdn.example/ep.mp4", false));
        // Duplicates keep their first position
        captured.record("https://cdn.example/seg/index.m3u8?t=1", false);

        assert_eq!(captured.len(), 3);
        assert_eq!(
            captured.first_containing("m3u8"),
            Some("https://cdn.example/seg/index.m3u8?t=1")
        );
        assert_eq!(captured.first_containing("mp4"), Some("https://cdn.example/ep.mp4"));
        assert_eq!(captured.first_containing("webm"), None);
    }

    #[tokio::test]
    async fn test_idle_wait_returns_when_quiet() {
        let clock = ActivityClock::new();
        let quiet = Duration::from_millis(20);

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            wait_for_network_idle(&clock, quiet),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_idle_wait_blocks_while_busy() {
        let clock = Arc::new(ActivityClock::new());
        let quiet = Duration::from_millis(50);

        let busy = {
            let clock = Arc::clone(&clock);
            tokio::spawn(async move {
                loop {
                    clock.touch();
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
        };

        let result = tokio::time::timeout(
            Duration::from_millis(300),
            wait_for_network_idle(&clock, quiet),
        )
        .await;
        busy.abort();
        assert!(result.is_err());
    }
}
