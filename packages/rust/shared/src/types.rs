//! Core domain types shared by extraction, crawling, and enrichment.
//!
//! All types serialize with camelCase keys, which is the wire format of the
//! HTTP surface and of the documents handed to the downstream indexer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ExtractedDocument
// ---------------------------------------------------------------------------

/// Structured result of extracting one fetched page.
///
/// Created once per page and never mutated afterwards. `links` and `images`
/// hold deduplicated absolute URLs only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    /// Final URL of the page (after redirects).
    pub url: String,
    /// `<title>` or `og:title`, empty when absent.
    pub title: String,
    /// Meta description or `og:description`, empty when absent.
    pub description: String,
    /// Whole-body visible text (truncated to the configured cap).
    pub raw_text: String,
    /// Best-effort isolated reading content.
    pub main_text: String,
    /// Products detected on the page.
    pub products: Vec<ProductRecord>,
    /// Images found on the page.
    pub images: Vec<ImageRecord>,
    /// Outbound links, absolute and deduplicated.
    pub links: Vec<String>,
    /// All `name`/`property` meta pairs plus a few derived entries.
    pub metadata: BTreeMap<String, String>,
    /// SHA-256 of `raw_text`, hex encoded.
    pub content_hash: String,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl ExtractedDocument {
    /// The text enrichment should work from: main text if isolated, else raw text.
    pub fn body_text(&self) -> &str {
        if self.main_text.trim().is_empty() {
            &self.raw_text
        } else {
            &self.main_text
        }
    }
}

// ---------------------------------------------------------------------------
// Products and images
// ---------------------------------------------------------------------------

/// A product detected on a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// ISO 4217 code, e.g. `JPY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

/// An image referenced by a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

// ---------------------------------------------------------------------------
// Enrichment outputs
// ---------------------------------------------------------------------------

/// A generated question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqRecord {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// LLM-produced content analysis of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAnalysisRecord {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub language: String,
}

/// A product plus LLM-generated marketing fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedProductRecord {
    #[serde(flatten)]
    pub product: ProductRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_description: Option<String>,
    #[serde(default)]
    pub suggested_keywords: Vec<String>,
}

impl From<ProductRecord> for EnhancedProductRecord {
    /// Pass-through conversion used when enrichment is skipped or fails.
    fn from(product: ProductRecord) -> Self {
        Self {
            product,
            generated_description: None,
            suggested_keywords: Vec::new(),
        }
    }
}

/// Contact details pulled out of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Business facts extracted from a page (company, contact, hours, social).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfoRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_hours: Option<String>,
    /// Platform name → profile URL.
    #[serde(default)]
    pub social_links: BTreeMap<String, String>,
    #[serde(default)]
    pub services: Vec<String>,
}

/// An FAQ expanded with paraphrased question variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingExample {
    pub question: String,
    pub answer: String,
    pub variants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_serializes_camel_case_with_iso_timestamp() {
        let doc = ExtractedDocument {
            url: "https://shop.example/".into(),
            raw_text: "hello".into(),
            fetched_at: "2026-01-02T03:04:05Z".parse().expect("timestamp"),
            ..Default::default()
        };

        let json = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(json["rawText"], "hello");
        assert_eq!(json["mainText"], "");
        assert_eq!(json["fetchedAt"], "2026-01-02T03:04:05Z");
        assert!(json["products"].as_array().expect("array").is_empty());
    }

    #[test]
    fn body_text_prefers_main_text() {
        let mut doc = ExtractedDocument {
            raw_text: "nav nav body".into(),
            ..Default::default()
        };
        assert_eq!(doc.body_text(), "nav nav body");

        doc.main_text = "body".into();
        assert_eq!(doc.body_text(), "body");
    }

    #[test]
    fn enhanced_product_flattens_base_fields() {
        let enhanced = EnhancedProductRecord {
            product: ProductRecord {
                name: "Tea Bowl".into(),
                price: Some(1200.0),
                currency: Some("JPY".into()),
                ..Default::default()
            },
            generated_description: Some("Hand thrown.".into()),
            suggested_keywords: vec!["ceramics".into()],
        };

        let json = serde_json::to_value(&enhanced).expect("serialize");
        assert_eq!(json["name"], "Tea Bowl");
        assert_eq!(json["currency"], "JPY");
        assert_eq!(json["generatedDescription"], "Hand thrown.");
        assert_eq!(json["suggestedKeywords"][0], "ceramics");
    }

    #[test]
    fn pass_through_product_has_no_generated_fields() {
        let enhanced = EnhancedProductRecord::from(ProductRecord {
            name: "Mug".into(),
            ..Default::default()
        });
        assert!(enhanced.generated_description.is_none());
        assert!(enhanced.suggested_keywords.is_empty());
    }
}
