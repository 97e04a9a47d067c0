//! Shared headless-browser lifecycle.
//!
//! One [`BrowserManager`] owns at most one Chromium process. Requests borrow
//! it to open their own pages; the process lives until [`BrowserManager::close`]
//! or the shutdown hook fires.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::handler::viewport::Viewport;
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use sitesense_shared::{BrowserConfig, Result, SiteSenseError, WaitStrategy};

use crate::robots::RobotsPolicy;
use crate::{FetchedPage, PageFetcher};

/// Network-idle settle window: resource count must stay flat this long.
const IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Poll interval while waiting on document/network state.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A running browser plus the task driving its CDP connection.
struct ActiveBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// A page opened by the manager, carrying its default operation timeout.
pub struct ManagedPage {
    page: Page,
    timeout: Duration,
}

impl ManagedPage {
    /// The underlying CDP page.
    pub fn inner(&self) -> &Page {
        &self.page
    }

    /// Default timeout applied to navigation and reads on this page.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Owner of the shared browser process.
pub struct BrowserManager {
    config: BrowserConfig,
    robots: RobotsPolicy,
    /// Read-locked to open pages, write-locked to launch or tear down.
    active: RwLock<Option<ActiveBrowser>>,
    initialized: AtomicBool,
}

impl BrowserManager {
    /// Create a manager; the browser is not launched until first use.
    pub fn new(config: BrowserConfig, robots: RobotsPolicy) -> Self {
        Self {
            config,
            robots,
            active: RwLock::new(None),
            initialized: AtomicBool::new(false),
        }
    }

    /// Whether a browser process is currently running.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Launch the shared browser if it is not running yet.
    ///
    /// Concurrent callers serialize on the write lock, so at most one
    /// process is ever launched.
    #[instrument(skip_all)]
    pub async fn init(&self) -> Result<()> {
        if self.active.read().await.is_some() {
            return Ok(());
        }
        let mut active = self.active.write().await;
        if active.is_some() {
            return Ok(());
        }

        let cdp_config = self.cdp_config()?;
        info!(
            headless = self.config.headless,
            locale = %self.config.locale,
            "launching headless browser"
        );

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| SiteSenseError::BrowserInit(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        *active = Some(ActiveBrowser { browser, handler });
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn cdp_config(&self) -> Result<CdpBrowserConfig> {
        let mut builder = CdpBrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg(format!("--lang={}", self.config.locale))
            .arg(format!("--user-agent={}", self.config.user_agent))
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .viewport(Viewport {
                width: self.config.viewport_width,
                height: self.config.viewport_height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .request_timeout(self.config.navigation_timeout());

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.config.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(SiteSenseError::BrowserInit)
    }

    /// Open a fresh blank page, launching the browser first if needed.
    pub async fn new_page(&self) -> Result<ManagedPage> {
        self.init().await?;

        let timeout = self.config.navigation_timeout();
        let active = self.active.read().await;
        let Some(active) = active.as_ref() else {
            return Err(SiteSenseError::BrowserInit(
                "browser closed while opening a page".into(),
            ));
        };

        let page = tokio::time::timeout(timeout, active.browser.new_page("about:blank"))
            .await
            .map_err(|_| SiteSenseError::navigation("about:blank", "timed out opening page"))?
            .map_err(|e| SiteSenseError::navigation("about:blank", e.to_string()))?;

        Ok(ManagedPage { page, timeout })
    }

    /// Navigate `page` to `url` and wait according to `wait`.
    ///
    /// No retries: a timeout or network failure surfaces as a navigation error.
    #[instrument(skip(self, page), fields(url = %url, ?wait))]
    pub async fn goto(
        &self,
        page: &ManagedPage,
        url: &Url,
        wait: WaitStrategy,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let timeout = timeout.unwrap_or(page.timeout);
        let navigation = async {
            match wait {
                WaitStrategy::Load => {
                    page.page.goto(url.as_str()).await?;
                }
                WaitStrategy::DomContentLoaded => {
                    page.page.execute(NavigateParams::new(url.as_str())).await?;
                    wait_for_dom_ready(&page.page).await?;
                }
                WaitStrategy::NetworkIdle => {
                    page.page.goto(url.as_str()).await?;
                    wait_for_network_idle(&page.page).await?;
                }
            }
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SiteSenseError::navigation(url.as_str(), e.to_string())),
            Err(_) => Err(SiteSenseError::navigation(
                url.as_str(),
                format!("timed out after {}s", timeout.as_secs()),
            )),
        }
    }

    /// Close a page, ignoring errors (e.g. the page is already gone).
    pub async fn close_page(&self, page: ManagedPage) {
        if let Err(e) = page.page.close().await {
            debug!(error = %e, "page close failed (ignored)");
        }
    }

    /// Tear down the browser. Safe to call repeatedly; a later `init` relaunches.
    #[instrument(skip_all)]
    pub async fn close(&self) {
        let mut active = self.active.write().await;
        if let Some(mut running) = active.take() {
            info!("closing headless browser");
            if let Err(e) = running.browser.close().await {
                warn!(error = %e, "browser close failed");
            }
            if let Err(e) = running.browser.wait().await {
                warn!(error = %e, "browser process wait failed");
            }
            running.handler.abort();
        }
        self.initialized.store(false, Ordering::SeqCst);
    }

    /// Close the browser when the host process receives SIGINT or SIGTERM.
    pub fn install_shutdown_hook(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            manager.close().await;
        })
    }

    async fn render(&self, page: &ManagedPage, url: &Url) -> Result<FetchedPage> {
        self.goto(page, url, self.config.wait_strategy, None).await?;

        let html = tokio::time::timeout(page.timeout, page.page.content())
            .await
            .map_err(|_| SiteSenseError::navigation(url.as_str(), "timed out reading content"))?
            .map_err(|e| SiteSenseError::navigation(url.as_str(), e.to_string()))?;

        let final_url = match page.page.url().await {
            Ok(Some(current)) => Url::parse(&current).unwrap_or_else(|_| url.clone()),
            _ => url.clone(),
        };

        Ok(FetchedPage {
            requested_url: url.clone(),
            final_url,
            html,
            status: None,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserManager {
    async fn prepare(&self) -> Result<()> {
        self.init().await
    }

    fn is_ready(&self) -> bool {
        self.is_initialized()
    }

    async fn robots_allowed(&self, url: &Url) -> bool {
        self.robots.is_allowed(url).await
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        let page = self.new_page().await?;
        // Closes the page in the background if this future is dropped mid-render.
        let orphan = page.page.clone();
        let guard = CloseOnDrop::new(move || spawn_close(orphan));
        let result = self.render(&page, url).await;
        guard.disarm();
        self.close_page(page).await;
        result
    }
}

/// Runs a release action on drop unless disarmed first.
struct CloseOnDrop<F: FnOnce()> {
    release: Option<F>,
}

impl<F: FnOnce()> CloseOnDrop<F> {
    fn new(release: F) -> Self {
        Self {
            release: Some(release),
        }
    }

    fn disarm(mut self) {
        self.release = None;
    }
}

impl<F: FnOnce()> Drop for CloseOnDrop<F> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

fn spawn_close(page: Page) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            debug!("fetch cancelled, closing page in background");
            handle.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!(error = %e, "background page close failed (ignored)");
                }
            });
        }
        Err(_) => warn!("fetch cancelled outside a runtime, page left open"),
    }
}

async fn wait_for_dom_ready(page: &Page) -> std::result::Result<(), chromiumoxide::error::CdpError> {
    loop {
        let state: String = page
            .evaluate("document.readyState")
            .await?
            .into_value()
            .unwrap_or_default();
        if state == "interactive" || state == "complete" {
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

async fn wait_for_network_idle(
    page: &Page,
) -> std::result::Result<(), chromiumoxide::error::CdpError> {
    let mut last_count = u64::MAX;
    let mut stable_for = Duration::ZERO;

    while stable_for < IDLE_WINDOW {
        let count: u64 = page
            .evaluate("performance.getEntriesByType('resource').length")
            .await?
            .into_value()
            .unwrap_or(0);
        if count == last_count {
            stable_for += POLL_INTERVAL;
        } else {
            stable_for = Duration::ZERO;
            last_count = count;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    Ok(())
}

/// Resolves on the first SIGINT (Ctrl-C) or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
