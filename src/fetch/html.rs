// src/fetch/html.rs
// =============================================================================
// Turns an HTML page into markdown content plus its outbound links.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (built on html5ever)
// - Supports CSS selectors for finding elements
// - Exposes the underlying tree, so excluded regions can be detached
//
// The cleaned DOM is serialized back to HTML and handed to `html2md`.
//
// Links are collected from the full page before anything is stripped.
// =============================================================================

use crate::crawl::PageUrl;
use scraper::{Html, Selector};
use url::Url;

// Never useful as content, whatever the caller excludes
const ALWAYS_STRIPPED: &[&str] = &["script", "style", "noscript", "template"];

// Converts an HTML document into (markdown, links)
//
// Parameters:
//   html: the raw page body
//   page_url: the URL the page was fetched from (for resolving relative links)
//   excluded_tags: element names removed before conversion
//   same_host_only: drop links that point to another host
pub fn distill_html<'a>(
    html: &str,
    page_url: &PageUrl,
    excluded_tags: impl IntoIterator<Item = &'a String>,
    same_host_only: bool,
) -> (String, Vec<PageUrl>) {
    let mut document = Html::parse_document(html);

    let links = extract_links(&document, page_url, same_host_only);

    let mut tags: Vec<&str> = ALWAYS_STRIPPED.to_vec();
    tags.extend(excluded_tags.into_iter().map(String::as_str));
    strip_elements(&mut document, tags.into_iter());

    let markdown = html2md::parse_html(&document.root_element().html());
    (markdown.trim().to_string(), links)
}

// Detaches every element matching one of `tags` from the document tree
fn strip_elements<'a>(document: &mut Html, tags: impl Iterator<Item = &'a str>) {
    for tag in tags {
        let selector = match Selector::parse(tag) {
            Ok(selector) => selector,
            Err(_) => {
                tracing::warn!("Ignoring excluded tag that is not a valid selector: {}", tag);
                continue;
            }
        };

        let ids: Vec<_> = document.select(&selector).map(|element| element.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}

// Collects absolute http(s) links from <a href> elements, in document order
fn extract_links(document: &Html, page_url: &PageUrl, same_host_only: bool) -> Vec<PageUrl> {
    // "a[href]" is a constant, known-valid selector
    let selector = Selector::parse("a[href]").expect("'a[href]' is a valid selector");
    let base = page_url.as_url();

    let mut links = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(resolved) = resolve_url(base, href) else {
            tracing::debug!("Skipping unresolvable link '{}' on {}", href, page_url);
            continue;
        };

        if !is_crawlable_link(&resolved) {
            continue;
        }

        let link = PageUrl::from_url(resolved);
        if same_host_only && link.host() != page_url.host() {
            continue;
        }

        if !links.contains(&link) {
            links.push(link);
        }
    }

    links
}

// Resolves a possibly-relative href against the page URL
//
// Examples (base = "https://example.com/page"):
//   "/docs"              -> https://example.com/docs
//   "../other"           -> https://example.com/other
//   "https://other.com"  -> https://other.com/
//   "#section"           -> None (same page)
fn resolve_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    base.join(href).ok()
}

// Only HTTP/HTTPS pages can be crawled; mailto:, tel:, javascript:, data: and
// file: links are skipped
fn is_crawlable_link(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
