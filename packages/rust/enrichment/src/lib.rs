//! AI enrichment for extracted documents.
//!
//! This crate provides:
//! - [`Enricher`]: FAQ generation, content analysis, product enhancement,
//!   key-info extraction, and training-data expansion
//! - [`CompletionProvider`]: the LLM seam, with [`OpenRouterProvider`] as the
//!   production implementation
//! - [`json`]: prose-tolerant JSON extraction from model output

pub mod enricher;
pub mod json;
mod prompts;
pub mod provider;

pub use enricher::{
    Enricher, EnrichmentSettings, MAX_FAQS_PER_PAGE, MIN_ANALYSIS_TEXT_CHARS, MIN_FAQ_TEXT_CHARS,
};
pub use provider::{CompletionProvider, CompletionRequest, DisabledProvider, OpenRouterProvider};
