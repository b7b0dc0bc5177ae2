//! Shared headless browser session.
//!
//! One Chrome process serves every extraction. It is launched on first use
//! and closed by [`BrowserSession::shutdown`]. Each extraction gets its own
//! browser context (an isolated profile with its own cookies and cache), and
//! the number of open contexts is capped by a semaphore.

use anyhow::{anyhow, Context, Result};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Running {
    browser: Arc<Browser>,
    handler: JoinHandle<()>,
}

/// Cap on concurrently open browser contexts
#[derive(Debug, Clone)]
struct ContextSlots {
    semaphore: Arc<Semaphore>,
}

/// Held for as long as a context is open; dropping it frees the slot
#[derive(Debug)]
struct ContextSlot {
    _permit: OwnedSemaphorePermit,
}

impl ContextSlots {
    fn new(max: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max.max(1))),
        }
    }

    /// Wait for a free slot; fails once the slots are closed
    async fn acquire(&self) -> Result<ContextSlot> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .context("Browser session is shut down")?;
        Ok(ContextSlot { _permit: permit })
    }

    fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    fn close(&self) {
        self.semaphore.close();
    }
}

/// Lazily launched browser shared across requests
pub struct BrowserSession {
    executable: Option<String>,
    running: Mutex<Option<Running>>,
    slots: ContextSlots,
}

impl BrowserSession {
    /// Create a session; nothing is launched until the first context is opened
    pub fn new(executable: Option<String>, max_contexts: usize) -> Self {
        Self {
            executable,
            running: Mutex::new(None),
            slots: ContextSlots::new(max_contexts),
        }
    }

    /// Contexts that could be opened right now without waiting
    pub fn available_contexts(&self) -> usize {
        self.slots.available()
    }

    /// Whether the browser process has been launched
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Get the browser, launching it if needed
    async fn browser(&self) -> Result<Arc<Browser>> {
        let mut running = self.running.lock().await;
        if let Some(running) = running.as_ref() {
            return Ok(Arc::clone(&running.browser));
        }

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--mute-audio")
            .arg("--autoplay-policy=no-user-gesture-required");
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {e}"))?;

        info!("Launching headless browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "Browser handler error");
                }
            }
        });

        let browser = Arc::new(browser);
        *running = Some(Running {
            browser: Arc::clone(&browser),
            handler,
        });

        Ok(browser)
    }

    /// Open an isolated browser context with one blank page
    ///
    /// Waits for a free slot when `max_contexts` contexts are already open.
    pub async fn open_context(&self) -> Result<BrowserContext> {
        let slot = self.slots.acquire().await?;

        let browser = self.browser().await?;

        let created = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("Failed to create browser context")?;
        let context_id = created.result.browser_context_id.clone();

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(|e| anyhow!("Failed to build target params: {e}"))?;

        let page = match browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                dispose(&browser, context_id).await;
                return Err(e).context("Failed to open page");
            }
        };

        debug!(context = ?context_id, "Opened browser context");

        Ok(BrowserContext {
            browser,
            context_id,
            page,
            _slot: slot,
        })
    }

    /// Close the browser process
    ///
    /// Safe to call more than once. Contexts still in flight fail and report
    /// no result.
    pub async fn shutdown(&self) {
        self.slots.close();

        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        info!("Shutting down headless browser");
        match Arc::try_unwrap(running.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    warn!(error = %e, "Failed to close browser cleanly");
                }
                if let Err(e) = browser.wait().await {
                    warn!(error = %e, "Failed to wait for browser exit");
                }
            }
            Err(shared) => {
                // Still referenced by an in-flight context; dropping the last
                // reference kills the process.
                warn!("Browser still in use at shutdown");
                drop(shared);
            }
        }
        running.handler.abort();
    }
}

/// One isolated browsing context and its page
pub struct BrowserContext {
    browser: Arc<Browser>,
    context_id: BrowserContextId,
    page: Page,
    _slot: ContextSlot,
}

impl BrowserContext {
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Close the page and dispose of the context, freeing its slot
    pub async fn close(self) {
        if let Err(e) = self.page.close().await {
            debug!(error = %e, "Failed to close page");
        }
        dispose(&self.browser, self.context_id).await;
    }
}

async fn dispose(browser: &Browser, context_id: BrowserContextId) {
    if let Err(e) = browser
        .execute(DisposeBrowserContextParams::new(context_id))
        .await
    {
        warn!(error = %e, "Failed to dispose browser context");
    }
}
