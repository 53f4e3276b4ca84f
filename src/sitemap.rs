// src/sitemap.rs
// =============================================================================
// Sitemap discovery: turns a sitemap.xml into a list of page URLs.
//
// Strategy:
// - Fetch the document with a plain GET
// - Read it with quick-xml's namespace-aware reader
// - Keep the text of every <loc> element bound to the sitemap namespace
//
// Discovery is advisory. Any fetch or parse failure is logged and yields an
// empty list, and the caller falls back to crawling the URL recursively.
// =============================================================================

use crate::crawl::PageUrl;
use crate::error::SitemapError;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use reqwest::Client;

pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// True when the URL looks like a sitemap document rather than a page.
pub fn is_sitemap_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase().ends_with(".xml"),
        Err(_) => false,
    }
}

// Fetches and parses a sitemap
//
// Returns: the page URLs in document order, or an empty Vec on any error
pub async fn discover(client: &Client, sitemap_url: &str) -> Vec<PageUrl> {
    match fetch_sitemap(client, sitemap_url).await {
        Ok(urls) => {
            tracing::info!("Found {} URL(s) in sitemap {}", urls.len(), sitemap_url);
            urls
        }
        Err(e) => {
            tracing::error!("Error fetching sitemap {}: {}", sitemap_url, e);
            Vec::new()
        }
    }
}

async fn fetch_sitemap(client: &Client, sitemap_url: &str) -> Result<Vec<PageUrl>, SitemapError> {
    let response = client.get(sitemap_url).send().await?;

    if !response.status().is_success() {
        return Err(SitemapError::Status(response.status().as_u16()));
    }

    let body = response.text().await?;
    let urls = parse_sitemap(&body)?
        .into_iter()
        .filter_map(|loc| match PageUrl::parse(&loc) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::debug!("Skipping invalid sitemap entry '{}': {}", loc, e);
                None
            }
        })
        .collect();

    Ok(urls)
}

// Extracts the text of every namespaced <loc> element
//
// Both <urlset> and <sitemapindex> documents are accepted; for an index the
// result is the list of child sitemap URLs.
pub fn parse_sitemap(xml: &str) -> Result<Vec<String>, SitemapError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locs = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_resolved_event()? {
            (ResolveResult::Bound(Namespace(ns)), Event::Start(e))
                if ns == SITEMAP_NAMESPACE.as_bytes() && e.local_name().as_ref() == b"loc" =>
            {
                current = Some(String::new());
            }
            (_, Event::Text(text)) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&text.unescape().map_err(quick_xml::Error::from)?);
                }
            }
            (_, Event::CData(data)) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&String::from_utf8_lossy(&data));
                }
            }
            (_, Event::End(e)) if e.local_name().as_ref() == b"loc" => {
                if let Some(loc) = current.take() {
                    let loc = loc.trim();
                    if !loc.is_empty() {
                        locs.push(loc.to_string());
                    }
                }
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    Ok(locs)
}
