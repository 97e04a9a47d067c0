//! Minimal robots.txt gate.
//!
//! Only a blanket `Disallow: /` for all agents blocks a site. Per-agent
//! groups, path-level rules, and `Crawl-delay` are ignored.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, instrument, warn};
use url::Url;

use sitesense_shared::{CrawlPoliciesConfig, Result, SiteSenseError};

/// Timeout for the robots.txt request itself.
const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Decides whether a site may be scraped based on its robots.txt.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    client: Client,
    enabled: bool,
    fail_open: bool,
}

impl RobotsPolicy {
    /// Build a policy from the crawl policy config, sharing `client`.
    pub fn new(client: Client, policies: &CrawlPoliciesConfig) -> Self {
        Self {
            client,
            enabled: policies.respect_robots_txt,
            fail_open: policies.robots_fail_open,
        }
    }

    /// Whether an ambiguous robots.txt state (5xx, network error) allows access.
    pub fn fails_open(&self) -> bool {
        self.fail_open
    }

    /// Check `{origin}/robots.txt` for `url`.
    ///
    /// A missing file (4xx) always allows. Server errors, network failures,
    /// and unreadable bodies allow only when the policy fails open.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn is_allowed(&self, url: &Url) -> bool {
        if !self.enabled {
            return true;
        }

        let robots_url = match robots_url(url) {
            Ok(u) => u,
            Err(e) => {
                debug!(error = %e, "cannot derive robots.txt location");
                return self.fail_open;
            }
        };

        let response = match self
            .client
            .get(robots_url.as_str())
            .timeout(ROBOTS_TIMEOUT)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(%robots_url, error = %e, fail_open = self.fail_open, "robots.txt fetch failed");
                return self.fail_open;
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let allowed = status.is_client_error() || self.fail_open;
            debug!(%robots_url, %status, allowed, "robots.txt not available");
            return allowed;
        }

        match response.text().await {
            Ok(body) => {
                let allowed = !blanket_disallow(&body);
                if !allowed {
                    info!(%robots_url, "robots.txt disallows all agents");
                }
                allowed
            }
            Err(e) => {
                warn!(%robots_url, error = %e, "robots.txt body unreadable");
                self.fail_open
            }
        }
    }
}

/// `{scheme}://{host}[:port]/robots.txt` for the given page URL.
pub fn robots_url(url: &Url) -> Result<Url> {
    if url.host_str().is_none() {
        return Err(SiteSenseError::validation(format!("URL has no host: {url}")));
    }
    url.join("/robots.txt")
        .map_err(|e| SiteSenseError::validation(format!("{url}: {e}")))
}

/// True when the wildcard group (or rules before any group) contains `Disallow: /`.
pub(crate) fn blanket_disallow(body: &str) -> bool {
    // None = before any User-agent line.
    let mut group_is_wildcard: Option<bool> = None;
    let mut last_was_agent = false;

    for raw in body.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                let wildcard = value == "*";
                group_is_wildcard = Some(if last_was_agent {
                    group_is_wildcard.unwrap_or(false) || wildcard
                } else {
                    wildcard
                });
                last_was_agent = true;
            }
            "disallow" => {
                last_was_agent = false;
                if value == "/" && group_is_wildcard.unwrap_or(true) {
                    return true;
                }
            }
            _ => last_was_agent = false,
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(fail_open: bool) -> RobotsPolicy {
        let policies = CrawlPoliciesConfig {
            robots_fail_open: fail_open,
            ..Default::default()
        };
        RobotsPolicy::new(Client::new(), &policies)
    }

    #[test]
    fn detects_blanket_disallow() {
        assert!(blanket_disallow("User-agent: *\nDisallow: /\n"));
        assert!(blanket_disallow("Disallow: /"));
        assert!(blanket_disallow("user-agent: *\ndisallow: /   # everything"));
    }

    #[test]
    fn ignores_path_and_agent_specific_rules() {
        assert!(!blanket_disallow("User-agent: *\nDisallow: /admin\n"));
        assert!(!blanket_disallow("User-agent: BadBot\nDisallow: /\n"));
        assert!(!blanket_disallow("User-agent: *\nDisallow:\n"));
        assert!(!blanket_disallow(""));
    }

    #[test]
    fn shared_group_with_wildcard_counts() {
        let body = "User-agent: BadBot\nUser-agent: *\nDisallow: /\n";
        assert!(blanket_disallow(body));
    }

    #[test]
    fn robots_url_uses_origin() {
        let url = Url::parse("http://localhost:3000/shop/item?id=1#top").unwrap();
        assert_eq!(
            robots_url(&url).unwrap().as_str(),
            "http://localhost:3000/robots.txt"
        );
    }

    #[tokio::test]
    async fn missing_or_failing_robots_allows() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/robots.txt"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        assert!(policy(true).is_allowed(&url).await);
        // A missing file is not ambiguous: allowed even when failing closed.
        assert!(policy(false).is_allowed(&url).await);
    }

    #[tokio::test]
    async fn server_error_follows_fail_mode() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/robots.txt"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        assert!(policy(true).is_allowed(&url).await);
        assert!(!policy(false).is_allowed(&url).await);
    }

    #[tokio::test]
    async fn unreachable_robots_follows_fail_mode() {
        // Nothing listens on port 1, so the connection itself is refused.
        let url = Url::parse("http://127.0.0.1:1/catalog").unwrap();
        assert!(policy(true).is_allowed(&url).await);
        assert!(!policy(false).is_allowed(&url).await);
    }

    #[tokio::test]
    async fn blanket_disallow_denies() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::path("/robots.txt"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/products", server.uri())).unwrap();
        assert!(!policy(true).is_allowed(&url).await);
    }

    #[tokio::test]
    async fn disabled_policy_skips_fetch() {
        let policies = CrawlPoliciesConfig {
            respect_robots_txt: false,
            ..Default::default()
        };
        let policy = RobotsPolicy::new(Client::new(), &policies);
        // Unroutable host: would fail if a request were attempted with fail-closed.
        let url = Url::parse("http://127.0.0.1:1/").unwrap();
        assert!(policy.is_allowed(&url).await);
    }
}
