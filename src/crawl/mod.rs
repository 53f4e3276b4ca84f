// src/crawl/mod.rs
// =============================================================================
// This module drives website crawling.
//
// Features:
// - URL normalization so every page has exactly one identity
// - Breadth-first, depth-bounded exploration with admission-time dedup
// - Flat mode for known URL lists (sitemaps) and recursive mode for seeds
// - Per-session summaries (successes, failures, rounds, peak memory)
//
// Submodules:
// - page: PageUrl and PageResult
// - frontier: visited set and per-round queues
// - controller: the BatchCrawler that ties rounds to the dispatcher
// =============================================================================

mod controller;
mod frontier;
mod page;

pub use controller::{BatchCrawler, CrawlReport};
pub use page::{PageResult, PageUrl};
