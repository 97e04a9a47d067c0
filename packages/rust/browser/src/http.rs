//! Static (non-rendering) page fetcher over plain HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use sitesense_shared::{Result, SiteSenseError};

use crate::robots::RobotsPolicy;
use crate::{FetchedPage, PageFetcher};

/// User-Agent string for static fetches and robots.txt lookups.
pub const USER_AGENT: &str = concat!("SiteSense/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by static fetches and robots.txt checks.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
        .map_err(|e| SiteSenseError::Network(format!("failed to build HTTP client: {e}")))
}

/// Fetches raw HTML without executing scripts.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    robots: RobotsPolicy,
}

impl HttpFetcher {
    pub fn new(client: Client, robots: RobotsPolicy) -> Self {
        Self { client, robots }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn prepare(&self) -> Result<()> {
        Ok(())
    }

    async fn robots_allowed(&self, url: &Url) -> bool {
        self.robots.is_allowed(url).await
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        debug!("fetching page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| SiteSenseError::navigation(url.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SiteSenseError::navigation(
                url.as_str(),
                format!("HTTP {status}"),
            ));
        }

        let final_url = response.url().clone();
        let html = response.text().await.map_err(|e| {
            SiteSenseError::navigation(url.as_str(), format!("body read failed: {e}"))
        })?;

        Ok(FetchedPage {
            requested_url: url.clone(),
            final_url,
            html,
            status: Some(status.as_u16()),
        })
    }
}
