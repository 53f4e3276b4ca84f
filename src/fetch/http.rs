// src/fetch/http.rs
// =============================================================================
// The default fetcher: a plain HTTP GET followed by HTML distillation.
//
// Key functionality:
// - One shared reqwest client (connection pooling, timeout, redirect limit)
// - Non-2xx responses and unsupported content types become FetchErrors
// - Transport errors are categorized (timeout, DNS, TLS, redirect loop)
// - Optional in-process cache for CacheMode::Use
//
// This fetcher never executes JavaScript. `render_headless` is accepted for
// compatibility with browser-backed fetchers and has no effect here.
// =============================================================================

use super::html::distill_html;
use super::{CacheMode, FetchOptions, Fetcher};
use crate::crawl::{PageResult, PageUrl};
use crate::error::FetchError;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;

const USER_AGENT: &str = concat!("page-distiller/", env!("CARGO_PKG_VERSION"));

// What we know how to turn into content
#[derive(Debug, Clone, Copy, PartialEq)]
enum ContentKind {
    Html,
    Text,
}

impl ContentKind {
    // A missing Content-Type header is treated as HTML
    fn from_header(content_type: Option<&str>) -> Result<Self, FetchError> {
        let Some(raw) = content_type else {
            return Ok(ContentKind::Html);
        };

        let mime = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => Ok(ContentKind::Html),
            "text/plain" | "text/markdown" | "text/x-markdown" => Ok(ContentKind::Text),
            _ => Err(FetchError::UnsupportedContentType(mime)),
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    cache: DashMap<PageUrl, PageResult>,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(HttpFetcher {
            client,
            timeout,
            cache: DashMap::new(),
        })
    }

    fn categorize_error(&self, error: reqwest::Error) -> FetchError {
        let error_string = error.to_string();

        if error.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if error.is_redirect() {
            FetchError::Transport("Too many redirects".to_string())
        } else if error.is_connect() {
            if error_string.contains("dns") {
                FetchError::Transport("Could not resolve hostname".to_string())
            } else {
                FetchError::Transport(format!("Connection failed: {}", error_string))
            }
        } else if error_string.contains("certificate") || error_string.contains("ssl") {
            FetchError::Transport("SSL certificate error".to_string())
        } else {
            FetchError::Transport(error_string)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &PageUrl, options: &FetchOptions) -> Result<PageResult, FetchError> {
        if options.cache_mode == CacheMode::Use {
            if let Some(hit) = self.cache.get(url) {
                tracing::debug!("Cache hit for {}", url);
                return Ok(hit.clone());
            }
        }

        let mut request = self.client.get(url.as_url().clone());
        if options.cache_mode == CacheMode::Bypass {
            request = request.header(CACHE_CONTROL, "no-cache");
        }

        let response = request.send().await.map_err(|e| self.categorize_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let kind = ContentKind::from_header(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        )?;

        // Relative links resolve against where we ended up after redirects
        let final_url = PageUrl::from_url(response.url().clone());
        let body = response.text().await.map_err(|e| self.categorize_error(e))?;

        let result = match kind {
            ContentKind::Html => {
                let (markdown, links) = distill_html(
                    &body,
                    &final_url,
                    &options.excluded_tags,
                    options.exclude_external_links,
                );
                PageResult::success(url.clone(), markdown, links)
            }
            ContentKind::Text => PageResult::success(url.clone(), body, Vec::new()),
        };

        tracing::debug!(
            url = %url,
            headless = options.render_headless,
            bytes = result.content.len(),
            links = result.links.len(),
            "page fetched"
        );

        if options.cache_mode == CacheMode::Use {
            self.cache.insert(url.clone(), result.clone());
        }

        Ok(result)
    }
}
