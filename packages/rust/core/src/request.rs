//! Request and response shapes shared by the HTTP surface and the CLI.

use serde::{Deserialize, Serialize};
use url::Url;

use sitesense_crawler::{CrawlOutcome, StopReason};
use sitesense_shared::{
    ContentAnalysisRecord, EnhancedProductRecord, ExtractedDocument, FaqRecord, KeyInfoRecord,
    Result, SiteSenseError, TrainingExample,
};

/// A single-page scrape with optional enrichment steps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "generateFAQ")]
    pub generate_faq: bool,
    #[serde(default)]
    pub analyze_content: bool,
    #[serde(default)]
    pub enhance_products: bool,
    #[serde(default)]
    pub extract_key_info: bool,
    #[serde(default)]
    pub generate_training_data: bool,
    #[serde(default, rename = "maxFAQs")]
    pub max_faqs: Option<usize>,
}

impl ScrapeRequest {
    /// Extraction only, no enrichment.
    pub fn extract_only(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn wants_enrichment(&self) -> bool {
        self.generate_faq
            || self.analyze_content
            || self.enhance_products
            || self.extract_key_info
            || self.generate_training_data
    }
}

/// Extracted content plus whichever enrichment outputs were requested.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOutput {
    pub content: ExtractedDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faqs: Option<Vec<FaqRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ContentAnalysisRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_products: Option<Vec<EnhancedProductRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_info: Option<KeyInfoRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_data: Option<Vec<TrainingExample>>,
}

impl ScrapeOutput {
    pub fn new(content: ExtractedDocument) -> Self {
        Self {
            content,
            faqs: None,
            analysis: None,
            enhanced_products: None,
            key_info: None,
            training_data: None,
        }
    }
}

/// A bounded multi-page crawl.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub max_pages: Option<usize>,
}

/// Wire form of a [`CrawlOutcome`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSummary {
    pub pages: Vec<ExtractedDocument>,
    pub failures: Vec<CrawlFailure>,
    pub visited: Vec<String>,
    pub duration_ms: u64,
    pub stop_reason: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlFailure {
    pub url: String,
    pub error: String,
}

impl From<CrawlOutcome> for CrawlSummary {
    fn from(outcome: CrawlOutcome) -> Self {
        Self {
            pages: outcome.pages,
            failures: outcome
                .failures
                .into_iter()
                .map(|(url, error)| CrawlFailure { url, error })
                .collect(),
            visited: outcome.visited,
            duration_ms: outcome.duration.as_millis() as u64,
            stop_reason: match outcome.stop_reason {
                StopReason::FrontierExhausted => "frontierExhausted",
                StopReason::PageBudgetReached => "pageBudgetReached",
                StopReason::TimeBudgetExceeded => "timeBudgetExceeded",
            },
        }
    }
}

/// Parse and check a caller-supplied target URL.
///
/// Must be an absolute `http`/`https` URL with a host.
pub fn parse_target_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SiteSenseError::validation("url is required"));
    }
    let url = Url::parse(raw)
        .map_err(|e| SiteSenseError::validation(format!("invalid url {raw:?}: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(SiteSenseError::validation(format!(
            "unsupported url scheme {:?}, expected http or https",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(SiteSenseError::validation(format!("url {raw:?} has no host")));
    }
    Ok(url)
}
