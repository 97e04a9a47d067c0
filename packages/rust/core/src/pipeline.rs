//! End-to-end workflows: single-page scrape with enrichment, and site crawl.
//!
//! Acquisition failures (bad URL, robots.txt disallow, browser or fetch
//! failure) are fatal to the request. Enrichment failures never are.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};
use url::Url;

use sitesense_browser::PageFetcher;
use sitesense_crawler::{CrawlOutcome, CrawlProgress, Crawler};
use sitesense_enrichment::Enricher;
use sitesense_extractor::{ExtractOptions, extract};
use sitesense_shared::{CrawlConfig, ExtractedDocument, Result, SiteSenseError};

use crate::request::{ScrapeOutput, ScrapeRequest, parse_target_url};

/// Shared orchestration handle. Cheap to clone; every clone shares the same
/// fetcher (and so the same browser process).
#[derive(Clone)]
pub struct SiteSense {
    fetcher: Arc<dyn PageFetcher>,
    enricher: Enricher,
    extract_options: ExtractOptions,
    crawl_config: CrawlConfig,
}

impl SiteSense {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        enricher: Enricher,
        extract_options: ExtractOptions,
        crawl_config: CrawlConfig,
    ) -> Self {
        Self {
            fetcher,
            enricher,
            extract_options,
            crawl_config,
        }
    }

    pub fn fetcher(&self) -> &Arc<dyn PageFetcher> {
        &self.fetcher
    }

    /// Validate, gate on robots.txt, fetch, and extract one page.
    ///
    /// The URL is checked before any browser work happens.
    async fn acquire(&self, raw_url: &str) -> Result<ExtractedDocument> {
        let url = parse_target_url(raw_url)?;
        self.fetcher.prepare().await?;
        self.ensure_allowed(&url).await?;

        let page = self.fetcher.fetch(&url).await?;
        debug!(status = ?page.status, final_url = %page.final_url, "page fetched");
        Ok(extract(&page.html, &page.final_url, &self.extract_options))
    }

    async fn ensure_allowed(&self, url: &Url) -> Result<()> {
        if self.fetcher.robots_allowed(url).await {
            Ok(())
        } else {
            Err(SiteSenseError::Policy(format!(
                "robots.txt for {} disallows scraping",
                url.origin().ascii_serialization()
            )))
        }
    }

    /// Scrape one page and run the requested enrichment steps.
    ///
    /// FAQ generation, content analysis, product enhancement, and key-info
    /// extraction run concurrently. Training data is derived from the FAQs,
    /// so it runs after them on the same branch.
    #[instrument(skip_all, fields(url = %request.url))]
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<ScrapeOutput> {
        let start = Instant::now();
        let doc = self.acquire(&request.url).await?;
        info!(
            title = %doc.title,
            products = doc.products.len(),
            links = doc.links.len(),
            "page extracted"
        );

        let mut output = ScrapeOutput::new(doc);
        if !request.wants_enrichment() {
            return Ok(output);
        }

        let doc = &output.content;
        let faq_count = request
            .max_faqs
            .unwrap_or(self.enricher.settings().default_faqs);
        let context = product_context(doc);

        let faq_branch = async {
            if !request.generate_faq && !request.generate_training_data {
                return (None, None);
            }
            let faqs = self.enricher.generate_faqs(doc, faq_count).await;
            let training = if request.generate_training_data {
                Some(self.enricher.generate_training_data(doc, &faqs).await)
            } else {
                None
            };
            (request.generate_faq.then_some(faqs), training)
        };
        let analysis_branch = async {
            if request.analyze_content {
                Some(self.enricher.analyze_content(doc).await)
            } else {
                None
            }
        };
        let products_branch = async {
            if request.enhance_products {
                Some(self.enricher.enhance_products(&doc.products, &context).await)
            } else {
                None
            }
        };
        let key_info_branch = async {
            if request.extract_key_info {
                Some(self.enricher.extract_key_info(doc).await)
            } else {
                None
            }
        };

        let ((faqs, training), analysis, enhanced, key_info) =
            tokio::join!(faq_branch, analysis_branch, products_branch, key_info_branch);

        output.faqs = faqs;
        output.training_data = training;
        output.analysis = analysis;
        output.enhanced_products = enhanced;
        output.key_info = key_info;

        info!(
            faqs = output.faqs.as_ref().map_or(0, Vec::len),
            enhanced = output.enhanced_products.as_ref().map_or(0, Vec::len),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "enrichment complete"
        );
        Ok(output)
    }

    /// Crawl a site from `raw_url`, without enrichment.
    ///
    /// `max_pages` overrides the configured page budget.
    #[instrument(skip_all, fields(url = %raw_url))]
    pub async fn crawl(
        &self,
        raw_url: &str,
        max_pages: Option<usize>,
        progress: &dyn CrawlProgress,
    ) -> Result<CrawlOutcome> {
        let seed = parse_target_url(raw_url)?;
        if max_pages == Some(0) {
            return Err(SiteSenseError::validation("maxPages must be at least 1"));
        }
        self.fetcher.prepare().await?;
        self.ensure_allowed(&seed).await?;

        let mut config = self.crawl_config.clone();
        if let Some(max_pages) = max_pages {
            config = config.with_max_pages(max_pages);
        }
        let crawler = Crawler::new(config, self.extract_options.clone());
        crawler.crawl(self.fetcher.as_ref(), &seed, progress).await
    }
}

/// Short store description handed to product enhancement.
fn product_context(doc: &ExtractedDocument) -> String {
    match (doc.title.trim(), doc.description.trim()) {
        ("", "") => doc.url.clone(),
        (title, "") => title.to_string(),
        ("", description) => description.to_string(),
        (title, description) => format!("{title} - {description}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use sitesense_browser::FetchedPage;
    use sitesense_crawler::SilentProgress;
    use sitesense_enrichment::{
        CompletionProvider, CompletionRequest, DisabledProvider, EnrichmentSettings,
    };

    struct StubFetcher {
        html: String,
        robots_allow: bool,
        prepares: AtomicUsize,
        fetches: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn with_robots(html: &str, robots_allow: bool) -> Arc<Self> {
            Arc::new(Self {
                html: html.to_string(),
                robots_allow,
                prepares: AtomicUsize::new(0),
                fetches: Mutex::new(Vec::new()),
            })
        }

        fn new(html: &str) -> Arc<Self> {
            Self::with_robots(html, true)
        }

        fn disallowing(html: &str) -> Arc<Self> {
            Self::with_robots(html, false)
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn prepare(&self) -> Result<()> {
            self.prepares.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn robots_allowed(&self, _url: &Url) -> bool {
            self.robots_allow
        }

        async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
            self.fetches.lock().unwrap().push(url.to_string());
            Ok(FetchedPage {
                requested_url: url.clone(),
                final_url: url.clone(),
                html: self.html.clone(),
                status: Some(200),
            })
        }
    }

    /// Answers by recognizing which step's prompt it was given.
    struct RoutingProvider;

    #[async_trait]
    impl CompletionProvider for RoutingProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            let p = &request.prompt;
            let reply = if p.contains("frequently asked questions") {
                r#"[{"question": "Do you ship abroad?", "answer": "Yes.", "confidence": 0.4},
                    {"question": "Can I visit?", "answer": "By appointment.", "confidence": 0.9}]"#
            } else if p.contains("Rewrite this customer question") {
                r#"["Variant one?", "Variant two?", "Variant three?"]"#
            } else if p.contains("Analyze the following") {
                r#"{"summary": "Pottery studio.", "keywords": ["pottery"], "language": "en"}"#
            } else if p.contains("product description") {
                r#"[{"index": 0, "generatedDescription": "A lovely bowl.", "suggestedKeywords": ["bowl"]}]"#
            } else if p.contains("key business information") {
                r#"{"companyName": "Kiln & Co"}"#
            } else {
                return Err(SiteSenseError::Provider("unexpected prompt".into()));
            };
            Ok(reply.to_string())
        }
    }

    const PAGE: &str = r#"<html lang="en"><head><title>Kiln &amp; Co</title>
        <meta name="description" content="Studio pottery"></head><body>
        <article><p>We fire small batches of stoneware every week and ship worldwide.
        Visit our Kyoto studio by appointment to see the kilns and meet the potters
        who make every piece by hand from local clay.</p></article>
        <div class="product-card"><h3>Tea Bowl</h3><span>¥1,200</span></div>
        </body></html>"#;

    fn crawl_config() -> CrawlConfig {
        CrawlConfig {
            max_pages: 10,
            fetch_delay: Duration::from_secs(1),
            max_duration: Duration::from_secs(240),
            include_patterns: vec![],
            exclude_patterns: vec![],
        }
    }

    fn sitesense(fetcher: Arc<StubFetcher>, provider: Arc<dyn CompletionProvider>) -> SiteSense {
        SiteSense::new(
            fetcher,
            Enricher::new(provider, EnrichmentSettings::default()),
            ExtractOptions::default(),
            crawl_config(),
        )
    }

    #[tokio::test]
    async fn malformed_url_rejected_before_prepare() {
        let fetcher = StubFetcher::new(PAGE);
        let app = sitesense(fetcher.clone(), Arc::new(RoutingProvider));
        let err = app
            .scrape(&ScrapeRequest::extract_only("not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteSenseError::Validation { .. }));
        assert_eq!(fetcher.prepares.load(Ordering::SeqCst), 0);
        assert!(fetcher.fetches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn robots_disallow_is_policy_error_without_fetch() {
        let fetcher = StubFetcher::disallowing(PAGE);
        let app = sitesense(fetcher.clone(), Arc::new(RoutingProvider));
        let err = app
            .scrape(&ScrapeRequest::extract_only("https://shop.example/"))
            .await
            .unwrap_err();
        assert!(matches!(err, SiteSenseError::Policy(_)));
        assert!(fetcher.fetches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extract_only_has_no_enrichment_fields() {
        let fetcher = StubFetcher::new(PAGE);
        let app = sitesense(fetcher, Arc::new(RoutingProvider));
        let output = app
            .scrape(&ScrapeRequest::extract_only("https://shop.example/"))
            .await
            .unwrap();
        assert_eq!(output.content.title, "Kiln & Co");
        assert_eq!(output.content.products.len(), 1);
        assert!(output.faqs.is_none());
        assert!(output.analysis.is_none());
        assert!(output.enhanced_products.is_none());
    }

    #[tokio::test]
    async fn full_enrichment() {
        let fetcher = StubFetcher::new(PAGE);
        let app = sitesense(fetcher, Arc::new(RoutingProvider));
        let request = ScrapeRequest {
            url: "https://shop.example/".into(),
            generate_faq: true,
            analyze_content: true,
            enhance_products: true,
            extract_key_info: true,
            generate_training_data: true,
            max_faqs: Some(5),
        };
        let output = app.scrape(&request).await.unwrap();

        let faqs = output.faqs.unwrap();
        assert_eq!(faqs.len(), 2);
        assert_eq!(output.analysis.unwrap().summary, "Pottery studio.");
        let enhanced = output.enhanced_products.unwrap();
        assert_eq!(enhanced.len(), 1);
        assert_eq!(enhanced[0].product.name, "Tea Bowl");
        assert_eq!(enhanced[0].generated_description.as_deref(), Some("A lovely bowl."));
        assert_eq!(output.key_info.unwrap().company_name.as_deref(), Some("Kiln & Co"));
        let training = output.training_data.unwrap();
        assert_eq!(training.len(), 2);
        assert_eq!(training[0].variants.len(), 3);
    }

    #[tokio::test]
    async fn training_without_faq_flag_hides_faqs() {
        let fetcher = StubFetcher::new(PAGE);
        let app = sitesense(fetcher, Arc::new(RoutingProvider));
        let request = ScrapeRequest {
            url: "https://shop.example/".into(),
            generate_training_data: true,
            ..ScrapeRequest::default()
        };
        let output = app.scrape(&request).await.unwrap();
        assert!(output.faqs.is_none());
        assert_eq!(output.training_data.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn provider_outage_degrades_every_step() {
        let fetcher = StubFetcher::new(PAGE);
        let app = sitesense(fetcher, Arc::new(DisabledProvider::new("no api key")));
        let request = ScrapeRequest {
            url: "https://shop.example/".into(),
            generate_faq: true,
            analyze_content: true,
            enhance_products: true,
            ..ScrapeRequest::default()
        };
        let output = app.scrape(&request).await.unwrap();
        assert_eq!(output.faqs, Some(vec![]));
        assert_eq!(output.analysis.unwrap().summary, "Studio pottery");
        let enhanced = output.enhanced_products.unwrap();
        assert_eq!(enhanced.len(), 1);
        assert!(enhanced[0].generated_description.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn crawl_checks_inputs_and_robots() {
        let app = sitesense(StubFetcher::new(PAGE), Arc::new(RoutingProvider));
        let err = app
            .crawl("https://shop.example/", Some(0), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, SiteSenseError::Validation { .. }));

        let blocked = sitesense(StubFetcher::disallowing(PAGE), Arc::new(RoutingProvider));
        let err = blocked
            .crawl("https://shop.example/", None, &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, SiteSenseError::Policy(_)));

        let outcome = app
            .crawl("https://shop.example/", Some(1), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(outcome.pages.len(), 1);
    }
}
