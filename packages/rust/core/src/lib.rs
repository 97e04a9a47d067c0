//! Orchestration for SiteSense.
//!
//! Ties page acquisition, extraction, crawling, and enrichment together into
//! the two end-to-end workflows the HTTP surface and CLI expose:
//! [`SiteSense::scrape`] and [`SiteSense::crawl`].

pub mod pipeline;
pub mod request;

pub use pipeline::SiteSense;
pub use request::{
    CrawlFailure, CrawlRequest, CrawlSummary, ScrapeOutput, ScrapeRequest, parse_target_url,
};
