// src/fetch/mod.rs
// =============================================================================
// The fetch port: anything that can turn one URL into a PageResult.
//
// The crawl orchestrator only knows about the `Fetcher` trait. The default
// implementation is `HttpFetcher` (plain HTTP + HTML parsing), but a headless
// browser or a PDF extractor can be plugged in the same way.
//
// Submodules:
// - http: the reqwest-based fetcher
// - html: markdown conversion and link extraction for HTML pages
// =============================================================================

mod html;
mod http;

pub use http::HttpFetcher;

use crate::crawl::PageResult;
use crate::crawl::PageUrl;
use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Whether a fetcher may serve a page it has already seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Always go to the network
    #[default]
    Bypass,
    /// Reuse an earlier response for the same URL
    Use,
}

/// Options handed to the fetcher on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    pub render_headless: bool,
    /// Elements stripped from the page before conversion (e.g. nav, footer)
    pub excluded_tags: BTreeSet<String>,
    /// Keep only links that stay on the page's own host
    pub exclude_external_links: bool,
    pub cache_mode: CacheMode,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            render_headless: true,
            excluded_tags: ["nav", "footer"].iter().map(|t| t.to_string()).collect(),
            exclude_external_links: true,
            cache_mode: CacheMode::Bypass,
        }
    }
}

// Implementations may fail however they like; the dispatcher turns every
// Err (and every panic) into a failed PageResult for that URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &PageUrl, options: &FetchOptions) -> Result<PageResult, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = FetchOptions::default();
        assert!(options.render_headless);
        assert!(options.exclude_external_links);
        assert_eq!(options.cache_mode, CacheMode::Bypass);
        assert!(options.excluded_tags.contains("nav"));
        assert!(options.excluded_tags.contains("footer"));
    }
}
