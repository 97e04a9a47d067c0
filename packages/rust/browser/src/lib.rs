//! Page acquisition: the shared headless browser, a static HTTP fetcher,
//! and the robots.txt gate both consult.
//!
//! This crate provides:
//! - [`BrowserManager`]: one shared Chromium process, one page per request
//! - [`HttpFetcher`]: plain HTTP GET for pages that need no rendering
//! - [`RobotsPolicy`]: blanket-disallow robots.txt check
//! - [`PageFetcher`]: the seam the crawler and orchestrator depend on

pub mod http;
pub mod manager;
pub mod robots;

use async_trait::async_trait;
use url::Url;

use sitesense_shared::Result;

pub use http::{HttpFetcher, USER_AGENT, build_client};
pub use manager::{BrowserManager, ManagedPage, shutdown_signal};
pub use robots::{RobotsPolicy, robots_url};

/// Raw HTML obtained for one URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL that was asked for.
    pub requested_url: Url,
    /// URL after redirects.
    pub final_url: Url,
    /// Document HTML (rendered DOM for the browser fetcher).
    pub html: String,
    /// HTTP status when known.
    pub status: Option<u16>,
}

/// Something that can turn a URL into HTML.
///
/// Implementations must release any per-request resources (pages, sockets)
/// before `fetch` returns, whether it succeeds or not.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Ready any shared resources. Idempotent.
    async fn prepare(&self) -> Result<()>;

    /// Whether shared resources are currently up. Fetchers with nothing
    /// to start are always ready.
    fn is_ready(&self) -> bool {
        true
    }

    /// Whether the site's robots.txt permits scraping `url`.
    async fn robots_allowed(&self, url: &Url) -> bool;

    /// Fetch `url` and return its HTML.
    async fn fetch(&self, url: &Url) -> Result<FetchedPage>;
}
