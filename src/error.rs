// src/error.rs
// =============================================================================
// Typed errors for the crawl pipeline.
//
// Only two kinds of error ever reach the caller:
// - ConfigError: bad bounds, detected before any network activity
// - SinkError: the output artifact could not be written
//
// FetchError and SitemapError exist so that failures have a shape while they
// are being converted into data (a failed PageResult, an empty URL list).
//
// Rust concepts:
// - thiserror: derive Display/Error impls from attributes
// - #[from]: automatic conversion so `?` works on the wrapped error
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid invocation settings. Fails the whole run immediately.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max concurrent fetches must be at least 1 (got {0})")]
    InvalidConcurrency(i64),

    #[error("crawl depth must not be negative (got {0})")]
    InvalidDepth(i64),

    #[error("memory threshold must be within (0, 100] percent (got {0})")]
    InvalidMemoryThreshold(f64),

    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no URLs were given")]
    NoUrls,
}

/// Why a single page could not be fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Transport(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("unsupported content type '{0}'")]
    UnsupportedContentType(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetch task panicked: {0}")]
    Panicked(String),
}

/// Sitemap discovery failures. Never escapes `sitemap::discover`.
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("failed to fetch sitemap: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("sitemap request returned HTTP {0}")]
    Status(u16),

    #[error("malformed sitemap XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Output artifact could not be written.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to create output directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize results: {0}")]
    Json(#[from] serde_json::Error),
}
