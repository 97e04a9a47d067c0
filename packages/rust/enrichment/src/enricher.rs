//! The enrichment steps.
//!
//! Each public step degrades instead of failing: a provider error, a timeout,
//! or an unparseable response yields an empty or pass-through result and a
//! `warn!` line. The `try_*` halves hold the fallible logic.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use sitesense_shared::{
    AppConfig, ContentAnalysisRecord, EnhancedProductRecord, ExtractedDocument, FaqRecord,
    KeyInfoRecord, ProductRecord, Result, SiteSenseError, TrainingExample,
};

use crate::json::{parse_array, parse_object};
use crate::prompts::{self, JSON_ONLY_SYSTEM};
use crate::provider::{CompletionProvider, CompletionRequest};

/// Below this many characters of body text, FAQ generation is skipped.
pub const MIN_FAQ_TEXT_CHARS: usize = 100;

/// Below this many characters of body text, content analysis is skipped.
pub const MIN_ANALYSIS_TEXT_CHARS: usize = 50;

/// Hard ceiling on FAQs requested per page.
pub const MAX_FAQS_PER_PAGE: usize = 25;

/// Paraphrases kept per FAQ.
const MAX_VARIANTS: usize = 5;

/// Floor on the pause between product batches.
const MIN_BATCH_DELAY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Runtime enrichment knobs, merged from `[enrichment]` and `[openrouter]`.
#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    /// Products per enhancement call.
    pub batch_size: usize,
    /// Pause between product batches.
    pub batch_delay: Duration,
    /// FAQ count used when the caller does not ask for one.
    pub default_faqs: usize,
    /// Ceiling on any single provider call.
    pub request_timeout: Duration,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: MIN_BATCH_DELAY,
            default_faqs: 10,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&AppConfig> for EnrichmentSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            batch_size: config.enrichment.batch_size,
            batch_delay: Duration::from_millis(config.enrichment.batch_delay_ms),
            default_faqs: config.enrichment.max_faqs,
            request_timeout: Duration::from_secs(config.openrouter.request_timeout_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

/// Stateless enrichment steps over a shared completion provider.
#[derive(Clone)]
pub struct Enricher {
    provider: Arc<dyn CompletionProvider>,
    settings: EnrichmentSettings,
}

/// One entry of a product-batch response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductEnhancement {
    index: usize,
    #[serde(default)]
    generated_description: Option<String>,
    #[serde(default)]
    suggested_keywords: Vec<String>,
}

impl Enricher {
    /// Create an enricher. Batch size is floored at one and the batch delay
    /// at one second.
    pub fn new(provider: Arc<dyn CompletionProvider>, mut settings: EnrichmentSettings) -> Self {
        settings.batch_size = settings.batch_size.max(1);
        settings.batch_delay = settings.batch_delay.max(MIN_BATCH_DELAY);
        Self { provider, settings }
    }

    pub fn settings(&self) -> &EnrichmentSettings {
        &self.settings
    }

    /// One provider call bounded by the request timeout. Timeout is reported
    /// as a provider error.
    async fn call(&self, task: &'static str, request: CompletionRequest) -> Result<String> {
        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(task, timeout_secs = timeout.as_secs(), "provider call timed out");
                Err(SiteSenseError::Provider(format!(
                    "{task} timed out after {}s",
                    timeout.as_secs()
                )))
            }
        }
    }

    // -- FAQs ---------------------------------------------------------------

    /// Generate up to `count` FAQs from the document's body text.
    ///
    /// Returns an empty list without calling the provider when the text is
    /// shorter than [`MIN_FAQ_TEXT_CHARS`].
    #[instrument(skip_all, fields(url = %doc.url, count = count))]
    pub async fn generate_faqs(&self, doc: &ExtractedDocument, count: usize) -> Vec<FaqRecord> {
        if doc.body_text().trim().chars().count() < MIN_FAQ_TEXT_CHARS {
            debug!("text too short for FAQs, skipping");
            return Vec::new();
        }
        match self.try_generate_faqs(doc, count).await {
            Ok(faqs) => {
                info!(faqs = faqs.len(), "generated FAQs");
                faqs
            }
            Err(e) => {
                warn!(error = %e, "FAQ generation failed, returning none");
                Vec::new()
            }
        }
    }

    async fn try_generate_faqs(
        &self,
        doc: &ExtractedDocument,
        count: usize,
    ) -> Result<Vec<FaqRecord>> {
        let count = count.clamp(1, MAX_FAQS_PER_PAGE);
        let request = CompletionRequest::new(JSON_ONLY_SYSTEM, prompts::faqs(doc, count))
            .temperature(0.3)
            .max_tokens(3000);
        let text = self.call("faqs", request).await?;

        let mut faqs: Vec<FaqRecord> = parse_array(&text)?;
        faqs.retain(|f| !f.question.trim().is_empty() && !f.answer.trim().is_empty());
        faqs.truncate(count);
        Ok(faqs)
    }

    // -- Content analysis ---------------------------------------------------

    /// Summarize and classify the document.
    ///
    /// On skip or failure the result is a default record whose summary is the
    /// document's description.
    #[instrument(skip_all, fields(url = %doc.url))]
    pub async fn analyze_content(&self, doc: &ExtractedDocument) -> ContentAnalysisRecord {
        if doc.body_text().trim().chars().count() < MIN_ANALYSIS_TEXT_CHARS {
            debug!("text too short for analysis, skipping");
            return fallback_analysis(doc);
        }
        match self.try_analyze_content(doc).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "content analysis failed, using fallback");
                fallback_analysis(doc)
            }
        }
    }

    async fn try_analyze_content(&self, doc: &ExtractedDocument) -> Result<ContentAnalysisRecord> {
        let request = CompletionRequest::new(JSON_ONLY_SYSTEM, prompts::analysis(doc))
            .temperature(0.1)
            .max_tokens(1000);
        let text = self.call("analysis", request).await?;

        let mut analysis: ContentAnalysisRecord = parse_object(&text)?;
        if analysis.summary.trim().is_empty() {
            analysis.summary = doc.description.clone();
        }
        if analysis.language.trim().is_empty() {
            analysis.language = doc.metadata.get("language").cloned().unwrap_or_default();
        }
        Ok(analysis)
    }

    // -- Product enhancement ------------------------------------------------

    /// Add generated descriptions and keywords to `products`.
    ///
    /// Always returns one record per input product, in order. A batch whose
    /// call or parse fails is passed through unchanged.
    #[instrument(skip_all, fields(products = products.len()))]
    pub async fn enhance_products(
        &self,
        products: &[ProductRecord],
        context: &str,
    ) -> Vec<EnhancedProductRecord> {
        let mut enhanced = Vec::with_capacity(products.len());

        for (batch_no, batch) in products.chunks(self.settings.batch_size).enumerate() {
            if batch_no > 0 {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
            match self.try_enhance_batch(batch, context).await {
                Ok(records) => enhanced.extend(records),
                Err(e) => {
                    warn!(batch = batch_no, size = batch.len(), error = %e, "batch enhancement failed, passing through");
                    enhanced.extend(batch.iter().cloned().map(EnhancedProductRecord::from));
                }
            }
        }

        enhanced
    }

    async fn try_enhance_batch(
        &self,
        batch: &[ProductRecord],
        context: &str,
    ) -> Result<Vec<EnhancedProductRecord>> {
        let request = CompletionRequest::new(JSON_ONLY_SYSTEM, prompts::product_batch(batch, context))
            .temperature(0.7)
            .max_tokens(2000);
        let text = self.call("products", request).await?;
        let updates: Vec<ProductEnhancement> = parse_array(&text)?;

        let mut records: Vec<EnhancedProductRecord> =
            batch.iter().cloned().map(EnhancedProductRecord::from).collect();
        for update in updates {
            let Some(record) = records.get_mut(update.index) else {
                debug!(index = update.index, "enhancement for unknown product index");
                continue;
            };
            record.generated_description = update
                .generated_description
                .filter(|d| !d.trim().is_empty());
            record.suggested_keywords = update.suggested_keywords;
        }
        Ok(records)
    }

    // -- Key info -----------------------------------------------------------

    /// Pull company, contact, hours, and social links out of the page.
    #[instrument(skip_all, fields(url = %doc.url))]
    pub async fn extract_key_info(&self, doc: &ExtractedDocument) -> KeyInfoRecord {
        if doc.raw_text.trim().is_empty() {
            return KeyInfoRecord::default();
        }
        match self.try_extract_key_info(doc).await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "key info extraction failed, returning empty record");
                KeyInfoRecord::default()
            }
        }
    }

    async fn try_extract_key_info(&self, doc: &ExtractedDocument) -> Result<KeyInfoRecord> {
        let request = CompletionRequest::new(JSON_ONLY_SYSTEM, prompts::key_info(doc))
            .temperature(0.0)
            .max_tokens(1000);
        let text = self.call("key_info", request).await?;
        parse_object(&text)
    }

    // -- Training data ------------------------------------------------------

    /// Expand each FAQ with paraphrased question variants, one call per FAQ.
    ///
    /// A failed call leaves that FAQ with no variants.
    #[instrument(skip_all, fields(url = %doc.url, faqs = faqs.len()))]
    pub async fn generate_training_data(
        &self,
        doc: &ExtractedDocument,
        faqs: &[FaqRecord],
    ) -> Vec<TrainingExample> {
        let mut examples = Vec::with_capacity(faqs.len());

        for faq in faqs {
            let variants = match self.try_question_variants(doc, faq).await {
                Ok(variants) => variants,
                Err(e) => {
                    warn!(question = %faq.question, error = %e, "variant generation failed");
                    Vec::new()
                }
            };
            examples.push(TrainingExample {
                question: faq.question.clone(),
                answer: faq.answer.clone(),
                variants,
                category: faq.category.clone(),
            });
        }

        examples
    }

    async fn try_question_variants(
        &self,
        doc: &ExtractedDocument,
        faq: &FaqRecord,
    ) -> Result<Vec<String>> {
        let request =
            CompletionRequest::new(JSON_ONLY_SYSTEM, prompts::question_variants(doc, faq))
                .temperature(0.8)
                .max_tokens(500);
        let text = self.call("variants", request).await?;

        let original = faq.question.trim().to_lowercase();
        let mut variants: Vec<String> = Vec::new();
        for variant in parse_array::<String>(&text)? {
            let variant = variant.trim().to_string();
            let key = variant.to_lowercase();
            if variant.is_empty() || key == original {
                continue;
            }
            if !variants.iter().any(|v| v.to_lowercase() == key) {
                variants.push(variant);
            }
        }
        variants.truncate(MAX_VARIANTS);
        Ok(variants)
    }
}

fn fallback_analysis(doc: &ExtractedDocument) -> ContentAnalysisRecord {
    ContentAnalysisRecord {
        summary: doc.description.clone(),
        language: doc.metadata.get("language").cloned().unwrap_or_default(),
        ..ContentAnalysisRecord::default()
    }
}
