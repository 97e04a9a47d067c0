//! Bounded same-host crawling for SiteSense.
//!
//! This crate provides:
//! - [`Crawler`]: sequential BFS over a [`PageFetcher`](sitesense_browser::PageFetcher)
//! - [`CrawlState`]: the frontier queue and visited set, keyed by [`normalize_url`]
//! - [`CrawlProgress`]: progress callbacks for CLI reporting

pub mod engine;
mod scope;
pub mod state;

pub use engine::{CrawlOutcome, CrawlProgress, Crawler, SilentProgress, StopReason};
pub use state::{CrawlState, normalize_url};
