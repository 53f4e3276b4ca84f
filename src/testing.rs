// src/testing.rs
// =============================================================================
// In-process fetcher used by the dispatcher and controller tests.
//
// Pages are declared up front as a small link graph. The stub records how
// often each URL was fetched and the highest number of fetches that were in
// flight at the same time.
// =============================================================================

use crate::crawl::{PageResult, PageUrl};
use crate::error::FetchError;
use crate::fetch::{FetchOptions, Fetcher};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum StubPage {
    Links(Vec<String>),
    Fail(String),
    Panic,
    Hang,
}

pub struct StubFetcher {
    pages: HashMap<PageUrl, StubPage>,
    delay: Duration,
    calls: Mutex<Vec<PageUrl>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        StubFetcher {
            pages: HashMap::new(),
            delay: Duration::from_millis(5),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn page(mut self, url: &str, links: &[&str]) -> Self {
        self.pages.insert(
            url_of(url),
            StubPage::Links(links.iter().map(|l| l.to_string()).collect()),
        );
        self
    }

    pub fn failing(mut self, url: &str, error: &str) -> Self {
        self.pages.insert(url_of(url), StubPage::Fail(error.to_string()));
        self
    }

    pub fn panicking(mut self, url: &str) -> Self {
        self.pages.insert(url_of(url), StubPage::Panic);
        self
    }

    pub fn hanging(mut self, url: &str) -> Self {
        self.pages.insert(url_of(url), StubPage::Hang);
        self
    }

    pub fn calls(&self) -> Vec<PageUrl> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        let url = url_of(url);
        self.calls().iter().filter(|c| **c == url).count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

pub fn url_of(s: &str) -> PageUrl {
    PageUrl::parse(s).unwrap()
}

// Decrements the in-flight counter even when the fetch panics or is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &PageUrl, _options: &FetchOptions) -> Result<PageResult, FetchError> {
        self.calls.lock().unwrap().push(url.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        tokio::time::sleep(self.delay).await;

        match self.pages.get(url) {
            Some(StubPage::Links(links)) => {
                let links = links.iter().map(|l| url_of(l)).collect();
                Ok(PageResult::success(url.clone(), format!("# {}", url), links))
            }
            Some(StubPage::Fail(error)) => Err(FetchError::Transport(error.clone())),
            Some(StubPage::Panic) => panic!("stub fetcher exploded on {}", url),
            Some(StubPage::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(FetchError::Transport("woke up".to_string()))
            }
            None => Err(FetchError::Status(404)),
        }
    }
}
