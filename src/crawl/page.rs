// src/crawl/page.rs
// =============================================================================
// The two values that flow through a crawl:
// - PageUrl: a URL in normalized form, used as the identity of a page
// - PageResult: what fetching one PageUrl produced (content or an error)
//
// Normalization rules:
// - scheme and host are lower-cased (the url crate does this on parse)
// - default ports are dropped (also done by the url crate)
// - the #fragment is removed
// - trailing slashes are removed, except for the bare root path "/"
// - an empty "?" query is removed
//
// Two URLs that normalize to the same string are the same page.
// =============================================================================

use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageUrl(Url);

impl PageUrl {
    /// Parses and normalizes a URL string.
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Url::parse(input.trim()).map(Self::from_url)
    }

    /// Normalizes an already-parsed URL.
    pub fn from_url(mut url: Url) -> Self {
        url.set_fragment(None);

        if url.query() == Some("") {
            url.set_query(None);
        }

        let path = url.path();
        if path.len() > 1 && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/').to_string();
            // "//" trims to "" which the url crate turns back into "/"
            url.set_path(&trimmed);
        }

        PageUrl(url)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }
}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PageUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The outcome of fetching one page.
///
/// Built only through [`PageResult::success`] and [`PageResult::failure`] so
/// that a failed result can never carry links.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub url: PageUrl,
    pub success: bool,
    pub content: String,
    /// Outbound links in document order, without duplicates
    pub links: Vec<PageUrl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageResult {
    pub fn success(url: PageUrl, content: impl Into<String>, links: Vec<PageUrl>) -> Self {
        let mut unique = Vec::with_capacity(links.len());
        for link in links {
            if !unique.contains(&link) {
                unique.push(link);
            }
        }

        PageResult {
            url,
            success: true,
            content: content.into(),
            links: unique,
            error: None,
        }
    }

    pub fn failure(url: PageUrl, error: impl Into<String>) -> Self {
        PageResult {
            url,
            success: false,
            content: String::new(),
            links: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://x.com/a/", "https://x.com/a")]
    #[case("https://x.com/a", "https://x.com/a")]
    #[case("HTTPS://Example.COM/Docs", "https://example.com/Docs")]
    #[case("https://example.com", "https://example.com/")]
    #[case("https://example.com/", "https://example.com/")]
    #[case("https://example.com:443/a", "https://example.com/a")]
    #[case("http://example.com:80/a", "http://example.com/a")]
    #[case("http://example.com:8080/a", "http://example.com:8080/a")]
    #[case("https://example.com/a#intro", "https://example.com/a")]
    #[case("https://example.com/a/#intro", "https://example.com/a")]
    #[case("https://example.com/a?", "https://example.com/a")]
    #[case("https://example.com/a/?q=1", "https://example.com/a?q=1")]
    #[case("https://example.com//", "https://example.com/")]
    #[case("  https://example.com/a  ", "https://example.com/a")]
    fn test_normalize(#[case] input: &str, #[case] expected: &str) {
        let url = PageUrl::parse(input).unwrap();
        assert_eq!(url.as_str(), expected);
    }

    #[rstest]
    #[case("https://x.com/a/")]
    #[case("HTTP://X.COM:80/a/b/#frag")]
    #[case("https://example.com")]
    #[case("https://example.com/docs/?")]
    fn test_normalize_is_idempotent(#[case] input: &str) {
        let once = PageUrl::parse(input).unwrap();
        let twice = PageUrl::parse(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_same_page_after_normalization() {
        let a = PageUrl::parse("https://x.com/a/").unwrap();
        let b = PageUrl::parse("https://X.com/a#top").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_url() {
        assert!(PageUrl::parse("not a url").is_err());
    }

    #[test]
    fn test_success_dedups_links_in_order() {
        let url = PageUrl::parse("https://example.com").unwrap();
        let b = PageUrl::parse("https://example.com/b").unwrap();
        let c = PageUrl::parse("https://example.com/c").unwrap();
        let result = PageResult::success(url, "# Home", vec![b.clone(), c.clone(), b.clone()]);
        assert!(result.success);
        assert_eq!(result.links, vec![b, c]);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_failure_has_no_links() {
        let url = PageUrl::parse("https://example.com").unwrap();
        let result = PageResult::failure(url, "HTTP 500");
        assert!(!result.success);
        assert!(result.links.is_empty());
        assert_eq!(result.error.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn test_serializes_url_as_string() {
        let url = PageUrl::parse("https://example.com/a/").unwrap();
        let json = serde_json::to_value(PageResult::failure(url, "boom")).unwrap();
        assert_eq!(json["url"], "https://example.com/a");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
    }
}
