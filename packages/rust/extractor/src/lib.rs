//! Content extraction for SiteSense.
//!
//! Turns a fetched HTML page into an [`ExtractedDocument`]: metadata, visible
//! and main text, products, images, and links. Extraction is total: malformed
//! or missing markup yields empty fields, never an error.

mod links;
mod metadata;
mod price;
mod products;
mod text;

use chrono::Utc;
use scraper::Html;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use sitesense_shared::ExtractedDocument;

pub use links::resolve_href;
pub use price::{Price, currency_code, find_price, parse_amount, parse_price};

/// Lower bound on the text cap.
pub const MIN_TEXT_CHARS: usize = 10_000;
/// Upper bound on the text cap.
pub const MAX_TEXT_CHARS: usize = 50_000;

/// Extraction knobs.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Cap applied to `raw_text` and `main_text`, clamped to
    /// [`MIN_TEXT_CHARS`]..=[`MAX_TEXT_CHARS`].
    pub max_text_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_text_chars: 30_000,
        }
    }
}

impl ExtractOptions {
    pub fn new(max_text_chars: usize) -> Self {
        Self { max_text_chars }
    }

    fn text_cap(&self) -> usize {
        self.max_text_chars.clamp(MIN_TEXT_CHARS, MAX_TEXT_CHARS)
    }
}

/// Extract a structured document from `html` served at `url`.
pub fn extract(html: &str, url: &Url, options: &ExtractOptions) -> ExtractedDocument {
    let doc = Html::parse_document(html);
    let cap = options.text_cap();

    let metadata = metadata::extract_metadata(&doc, url);
    let title = metadata::extract_title(&doc, &metadata);
    let description = metadata::extract_description(&metadata);

    let raw_text = text::truncate_chars(&text::visible_text(&doc), cap);
    let main_text = match text::main_text(&doc) {
        main if main.is_empty() => raw_text.clone(),
        main => text::truncate_chars(&main, cap),
    };

    let products = products::extract_products(&doc, url);
    let images = links::extract_images(&doc, url);
    let links = links::extract_links(&doc, url);

    debug!(
        url = %url,
        raw_chars = raw_text.chars().count(),
        products = products.len(),
        images = images.len(),
        links = links.len(),
        "extracted page"
    );

    ExtractedDocument {
        url: url.to_string(),
        title,
        description,
        content_hash: content_hash(&raw_text),
        raw_text,
        main_text,
        products,
        images,
        links,
        metadata,
        fetched_at: Utc::now(),
    }
}

/// SHA-256 of `text`, lowercase hex.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
