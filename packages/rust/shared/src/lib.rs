//! Shared types, error model, and configuration for SiteSense.
//!
//! This crate is the foundation depended on by all other SiteSense crates.
//! It provides:
//! - [`SiteSenseError`]: the unified error type
//! - Domain types ([`ExtractedDocument`], [`ProductRecord`], [`FaqRecord`], ...)
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserConfig, CrawlConfig, CrawlPoliciesConfig, EnrichmentConfig,
    MIN_REQUEST_DELAY, OpenRouterConfig, ServerConfig, WaitStrategy, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{ErrorKind, Result, SiteSenseError};
pub use types::{
    ContactInfo, ContentAnalysisRecord, EnhancedProductRecord, ExtractedDocument, FaqRecord,
    ImageRecord, KeyInfoRecord, ProductRecord, TrainingExample,
};
