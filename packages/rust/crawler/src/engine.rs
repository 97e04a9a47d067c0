//! Bounded breadth-first crawl over a single host.
//!
//! The crawl is strictly sequential: one fetch at a time with a fixed pause
//! between fetches. It stops when the frontier empties, the page budget is
//! met, or the wall-clock ceiling passes, whichever comes first.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

use sitesense_browser::PageFetcher;
use sitesense_extractor::{ExtractOptions, extract};
use sitesense_shared::{CrawlConfig, ExtractedDocument, MIN_REQUEST_DELAY, Result};

use crate::scope::CrawlScope;
use crate::state::CrawlState;

// ---------------------------------------------------------------------------
// CrawlOutcome
// ---------------------------------------------------------------------------

/// Why a crawl stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing left to visit.
    FrontierExhausted,
    /// `max_pages` documents were extracted.
    PageBudgetReached,
    /// The wall-clock ceiling passed.
    TimeBudgetExceeded,
}

/// Summary of a completed crawl.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Extracted documents in visit order.
    pub pages: Vec<ExtractedDocument>,
    /// Pages that failed to fetch (URL, error message).
    pub failures: Vec<(String, String)>,
    /// Normalized URLs dequeued, in order, including failures.
    pub visited: Vec<String>,
    /// Total duration of the crawl.
    pub duration: Duration,
    pub stop_reason: StopReason,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for crawl status.
pub trait CrawlProgress: Send + Sync {
    /// Called after a page is fetched and extracted.
    fn page_fetched(&self, url: &str, current: usize, max_pages: usize);
    /// Called when a page fails; the crawl continues.
    fn page_failed(&self, url: &str, error: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl CrawlProgress for SilentProgress {
    fn page_fetched(&self, _url: &str, _current: usize, _max_pages: usize) {}
    fn page_failed(&self, _url: &str, _error: &str) {}
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Sequential same-host BFS crawler.
#[derive(Debug, Clone)]
pub struct Crawler {
    config: CrawlConfig,
    extract_options: ExtractOptions,
}

impl Crawler {
    /// Create a crawler. The fetch delay is floored at [`MIN_REQUEST_DELAY`]
    /// and the page budget at one.
    pub fn new(mut config: CrawlConfig, extract_options: ExtractOptions) -> Self {
        config.fetch_delay = config.fetch_delay.max(MIN_REQUEST_DELAY);
        config.max_pages = config.max_pages.max(1);
        Self {
            config,
            extract_options,
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Crawl from `seed` through `fetcher`.
    ///
    /// A failure on the seed page is returned as the error, since nothing
    /// else is reachable without it. Later failures are recorded in
    /// [`CrawlOutcome::failures`] and the crawl moves on.
    #[instrument(skip_all, fields(seed = %seed, max_pages = self.config.max_pages))]
    pub async fn crawl(
        &self,
        fetcher: &dyn PageFetcher,
        seed: &Url,
        progress: &dyn CrawlProgress,
    ) -> Result<CrawlOutcome> {
        let start = Instant::now();
        let scope = CrawlScope::new(&self.config);
        let mut state = CrawlState::new(seed);
        let mut pages: Vec<ExtractedDocument> = Vec::new();
        let mut failures: Vec<(String, String)> = Vec::new();
        let mut fetches = 0usize;

        info!(
            host = state.base_host(),
            delay_ms = self.config.fetch_delay.as_millis() as u64,
            max_duration_secs = self.config.max_duration.as_secs(),
            "starting crawl"
        );

        let stop_reason = loop {
            if pages.len() >= self.config.max_pages {
                break StopReason::PageBudgetReached;
            }
            if start.elapsed() >= self.config.max_duration {
                break StopReason::TimeBudgetExceeded;
            }
            let Some(url) = state.next_unvisited() else {
                break StopReason::FrontierExhausted;
            };

            if fetches > 0 {
                tokio::time::sleep(self.config.fetch_delay).await;
            }
            fetches += 1;

            debug!(%url, queued = state.frontier_len(), "fetching page");
            match fetcher.fetch(&url).await {
                Ok(page) if !state.is_same_host(&page.final_url) && fetches > 1 => {
                    let error = format!("redirected off-host to {}", page.final_url);
                    warn!(%url, final_url = %page.final_url, "page left the crawl host, skipping");
                    progress.page_failed(url.as_str(), &error);
                    failures.push((url.to_string(), error));
                }
                Ok(page) => {
                    if !state.is_same_host(&page.final_url) {
                        info!(
                            from = state.base_host(),
                            to = page.final_url.host_str().unwrap_or_default(),
                            "seed redirected, following new host"
                        );
                        state.rebase(&page.final_url);
                    }
                    state.mark_visited(&page.final_url);
                    let doc = extract(&page.html, &page.final_url, &self.extract_options);

                    let mut enqueued = 0usize;
                    for link in &doc.links {
                        let Ok(link_url) = Url::parse(link) else {
                            continue;
                        };
                        if scope.allows(&link_url) && state.enqueue(link_url) {
                            enqueued += 1;
                        }
                    }
                    state.record_extracted();
                    debug!(url = %doc.url, enqueued, "page extracted");

                    progress.page_fetched(&doc.url, state.extracted(), self.config.max_pages);
                    pages.push(doc);
                }
                Err(e) if fetches == 1 => return Err(e),
                Err(e) => {
                    warn!(%url, error = %e, "page failed, continuing");
                    progress.page_failed(url.as_str(), &e.to_string());
                    failures.push((url.to_string(), e.to_string()));
                }
            }
        };

        let outcome = CrawlOutcome {
            pages,
            failures,
            visited: state.into_visit_order(),
            duration: start.elapsed(),
            stop_reason,
        };

        info!(
            pages = outcome.pages.len(),
            failures = outcome.failures.len(),
            visited = outcome.visited.len(),
            duration_ms = outcome.duration.as_millis() as u64,
            stop_reason = ?outcome.stop_reason,
            "crawl completed"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod crawler_tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sitesense_browser::FetchedPage;
    use sitesense_shared::SiteSenseError;

    /// In-memory site. Unknown URLs and URLs in `failing` error out.
    struct StubSite {
        pages: HashMap<String, String>,
        redirects: HashMap<String, String>,
        failing: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl StubSite {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, html)| (u.to_string(), html.to_string()))
                    .collect(),
                redirects: HashMap::new(),
                failing: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, url: &str) -> Self {
            self.failing.push(url.to_string());
            self
        }

        fn redirecting(mut self, from: &str, to: &str) -> Self {
            self.redirects.insert(from.to_string(), to.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StubSite {
        async fn prepare(&self) -> Result<()> {
            Ok(())
        }

        async fn robots_allowed(&self, _url: &Url) -> bool {
            true
        }

        async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.failing.contains(&url.to_string()) {
                return Err(SiteSenseError::navigation(url.as_str(), "timed out"));
            }
            let final_url = match self.redirects.get(url.as_str()) {
                Some(target) => Url::parse(target).unwrap(),
                None => url.clone(),
            };
            let html = self
                .pages
                .get(final_url.as_str())
                .cloned()
                .ok_or_else(|| SiteSenseError::navigation(url.as_str(), "HTTP 404"))?;
            Ok(FetchedPage {
                requested_url: url.clone(),
                final_url,
                html,
                status: Some(200),
            })
        }
    }

    fn config(max_pages: usize) -> CrawlConfig {
        CrawlConfig {
            max_pages,
            fetch_delay: Duration::from_secs(1),
            max_duration: Duration::from_secs(240),
            include_patterns: vec![],
            exclude_patterns: vec![],
        }
    }

    fn crawler(config: CrawlConfig) -> Crawler {
        Crawler::new(config, ExtractOptions::default())
    }

    const SEED: &str = "https://shop.example/";
    const SEED_HTML: &str = r#"<body>
        <a href="/a">A</a><a href="/b">B</a><a href="/c">C</a>
    </body>"#;
    const A_HTML: &str = r#"<body><a href="https://elsewhere.example/d">D</a></body>"#;
    const B_HTML: &str = r##"<body><a href="/">Home</a><a href="/a#reviews">A again</a></body>"##;
    const C_HTML: &str = "<body><p>Leaf</p></body>";

    fn shop() -> StubSite {
        StubSite::new(&[
            (SEED, SEED_HTML),
            ("https://shop.example/a", A_HTML),
            ("https://shop.example/b", B_HTML),
            ("https://shop.example/c", C_HTML),
            ("https://elsewhere.example/d", C_HTML),
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn page_budget_stops_after_seed_and_first_link() {
        let site = shop();
        let seed = Url::parse(SEED).unwrap();
        let outcome = crawler(config(2))
            .crawl(&site, &seed, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::PageBudgetReached);
        let urls: Vec<&str> = outcome.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec![SEED, "https://shop.example/a"]);
        assert_eq!(site.calls(), vec![SEED.to_string(), "https://shop.example/a".into()]);
    }

    #[tokio::test(start_paused = true)]
    async fn never_leaves_host_or_revisits() {
        let site = shop();
        let seed = Url::parse(SEED).unwrap();
        let outcome = crawler(config(10))
            .crawl(&site, &seed, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::FrontierExhausted);
        assert_eq!(
            site.calls(),
            vec![
                SEED.to_string(),
                "https://shop.example/a".into(),
                "https://shop.example/b".into(),
                "https://shop.example/c".into(),
            ]
        );
        assert_eq!(outcome.visited.len(), 4);
        assert!(!outcome.visited.iter().any(|u| u.contains("elsewhere")));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_page_does_not_abort_crawl() {
        let site = shop().failing("https://shop.example/b");
        let seed = Url::parse(SEED).unwrap();
        let outcome = crawler(config(10))
            .crawl(&site, &seed, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(outcome.pages.len(), 3);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, "https://shop.example/b");
        assert!(outcome.failures[0].1.contains("timed out"));
        assert!(site.calls().contains(&"https://shop.example/c".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn seed_failure_is_an_error() {
        let site = shop().failing(SEED);
        let seed = Url::parse(SEED).unwrap();
        let err = crawler(config(10))
            .crawl(&site, &seed, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, SiteSenseError::Navigation { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_floored_and_applied_between_fetches() {
        let site = shop();
        let seed = Url::parse(SEED).unwrap();
        let mut cfg = config(3);
        cfg.fetch_delay = Duration::ZERO;
        let crawler = crawler(cfg);
        assert_eq!(crawler.config().fetch_delay, MIN_REQUEST_DELAY);

        let started = Instant::now();
        let outcome = crawler.crawl(&site, &seed, &SilentProgress).await.unwrap();
        assert_eq!(outcome.pages.len(), 3);
        // Three fetches, two pauses.
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_ceiling_stops_crawl() {
        let site = shop();
        let seed = Url::parse(SEED).unwrap();
        let mut cfg = config(10);
        cfg.max_duration = Duration::from_secs(2);
        let outcome = crawler(cfg)
            .crawl(&site, &seed, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::TimeBudgetExceeded);
        assert_eq!(outcome.pages.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exclude_patterns_filter_links() {
        let site = shop();
        let seed = Url::parse(SEED).unwrap();
        let mut cfg = config(10);
        cfg.exclude_patterns = vec!["/b".into()];
        let outcome = crawler(cfg)
            .crawl(&site, &seed, &SilentProgress)
            .await
            .unwrap();

        assert!(!site.calls().contains(&"https://shop.example/b".to_string()));
        assert_eq!(outcome.pages.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn off_host_redirect_is_a_failure_not_a_page() {
        let site = StubSite::new(&[
            (SEED, r#"<body><a href="/out">Out</a><a href="/c">C</a></body>"#),
            ("https://shop.example/c", C_HTML),
            ("https://evil.example/landing", C_HTML),
        ])
        .redirecting("https://shop.example/out", "https://evil.example/landing");
        let seed = Url::parse(SEED).unwrap();
        let outcome = crawler(config(10))
            .crawl(&site, &seed, &SilentProgress)
            .await
            .unwrap();

        let urls: Vec<&str> = outcome.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec![SEED, "https://shop.example/c"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, "https://shop.example/out");
        assert!(outcome.failures[0].1.contains("evil.example"));
    }

    #[tokio::test(start_paused = true)]
    async fn seed_redirect_rebases_host() {
        let site = StubSite::new(&[
            ("https://www.shop.example/", r#"<body><a href="/a">A</a></body>"#),
            ("https://www.shop.example/a", C_HTML),
        ])
        .redirecting(SEED, "https://www.shop.example/");
        let seed = Url::parse(SEED).unwrap();
        let outcome = crawler(config(10))
            .crawl(&site, &seed, &SilentProgress)
            .await
            .unwrap();

        let urls: Vec<&str> = outcome.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://www.shop.example/", "https://www.shop.example/a"]);
        assert!(outcome.failures.is_empty());
    }

    struct Recording(Mutex<Vec<(String, usize)>>);

    impl CrawlProgress for Recording {
        fn page_fetched(&self, url: &str, current: usize, _max_pages: usize) {
            self.0.lock().unwrap().push((url.to_string(), current));
        }
        fn page_failed(&self, _url: &str, _error: &str) {}
    }

    #[tokio::test(start_paused = true)]
    async fn progress_reports_each_page() {
        let site = shop();
        let seed = Url::parse(SEED).unwrap();
        let progress = Recording(Mutex::new(Vec::new()));
        crawler(config(2))
            .crawl(&site, &seed, &progress)
            .await
            .unwrap();

        let seen = progress.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(SEED.to_string(), 1), ("https://shop.example/a".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn test_crawl_with_mock_server() {
        use sitesense_browser::{HttpFetcher, RobotsPolicy, build_client};
        use sitesense_shared::CrawlPoliciesConfig;

        let server = wiremock::MockServer::start().await;

        let page1 = r#"<html><body><main>
            <h1>Page One</h1><a href="/page2">Go to page 2</a>
        </main></body></html>"#;
        let page2 = r#"<html><body><main>
            <h1>Page Two</h1><a href="/">Back</a>
        </main></body></html>"#;

        wiremock::Mock::given(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page1))
            .expect(1)
            .mount(&server)
            .await;
        wiremock::Mock::given(wiremock::matchers::path("/page2"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page2))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).unwrap();
        let robots = RobotsPolicy::new(client.clone(), &CrawlPoliciesConfig::default());
        let fetcher = HttpFetcher::new(client, robots);

        let seed = Url::parse(&server.uri()).unwrap();
        let outcome = crawler(config(10))
            .crawl(&fetcher, &seed, &SilentProgress)
            .await
            .unwrap();

        assert_eq!(outcome.pages.len(), 2);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.pages[1].title, "");
        assert_eq!(outcome.stop_reason, StopReason::FrontierExhausted);
    }
}
