// src/crawl/controller.rs
// =============================================================================
// Top-level crawl driver.
//
// Two modes:
// - flat: a known list of URLs (e.g. from a sitemap) is dispatched once
// - recursive: breadth-first expansion from one seed, one round per depth
//
// In recursive mode each round is dispatched and fully drained before the
// next one starts, so a page at graph distance d is only fetched in round d
// and peak concurrency never exceeds the dispatcher's cap.
//
// Output is every successful PageResult, round-major and in completion
// order within a round. Failures are kept separately for reporting.
//
// Rust concepts:
// - Ownership: a CrawlSession is consumed by finish(), so a finished session
//   can't be appended to by accident
// - Frontier is a plain owned value, no locks: only this loop touches it
// =============================================================================

use super::frontier::Frontier;
use super::page::{PageResult, PageUrl};
use crate::dispatch::AdaptiveDispatcher;
use crate::error::ConfigError;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub rounds: usize,
    pub peak_rss_bytes: u64,
    pub elapsed: Duration,
}

impl CrawlSummary {
    pub fn peak_rss_mb(&self) -> u64 {
        self.peak_rss_bytes / (1024 * 1024)
    }
}

/// Everything one crawl session produced.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub pages: Vec<PageResult>,
    pub failures: Vec<PageResult>,
    pub summary: CrawlSummary,
}

// State for one invocation. Discarded once its report has been taken.
struct CrawlSession {
    pages: Vec<PageResult>,
    failures: Vec<PageResult>,
    rounds: usize,
    state: SessionState,
    started: Instant,
}

impl CrawlSession {
    fn start() -> Self {
        CrawlSession {
            pages: Vec::new(),
            failures: Vec::new(),
            rounds: 0,
            state: SessionState::Running,
            started: Instant::now(),
        }
    }

    // Appends one drained round, keeping the dispatcher's completion order
    fn record_round(&mut self, results: &[PageResult]) {
        debug_assert_eq!(self.state, SessionState::Running);
        self.rounds += 1;

        // Successes become output, failures only feed the summary
        for result in results {
            if result.success {
                self.pages.push(result.clone());
            } else {
                self.failures.push(result.clone());
            }
        }
    }

    fn finish(mut self, peak_rss_bytes: u64) -> CrawlReport {
        self.state = SessionState::Done;

        let summary = CrawlSummary {
            succeeded: self.pages.len(),
            failed: self.failures.len(),
            rounds: self.rounds,
            peak_rss_bytes,
            elapsed: self.started.elapsed(),
        };

        CrawlReport {
            pages: self.pages,
            failures: self.failures,
            summary,
        }
    }
}

pub struct BatchCrawler {
    dispatcher: AdaptiveDispatcher,
}

impl BatchCrawler {
    pub fn new(dispatcher: AdaptiveDispatcher) -> Self {
        BatchCrawler { dispatcher }
    }

    /// Fetches a known, finite list of URLs in a single dispatch.
    pub async fn crawl_flat(&self, urls: Vec<PageUrl>) -> CrawlReport {
        let mut session = CrawlSession::start();
        // Peak memory is per session, not per process lifetime
        self.dispatcher.monitor().reset_peak();

        // A flat list is a single round: no links are followed
        tracing::info!("Crawling {} URL(s) in parallel", urls.len());
        let results = self.dispatcher.run_batch(urls).await;
        session.record_round(&results);

        self.finish(session)
    }

    /// Breadth-first crawl from `seed`, following links up to `depth` hops.
    pub async fn crawl_recursive(&self, seed: PageUrl, depth: i64) -> Result<CrawlReport, ConfigError> {
        if depth < 0 {
            return Err(ConfigError::InvalidDepth(depth));
        }

        let mut session = CrawlSession::start();
        self.dispatcher.monitor().reset_peak();

        // Round 0 is always just the seed
        let mut frontier = Frontier::new(seed, depth);
        let mut round = frontier.current_round().to_vec();

        // An empty round means either nothing new was linked or the depth
        // budget ran out. Both end the crawl.
        while !round.is_empty() {
            tracing::info!(
                "Round {}: crawling {} URL(s) ({} visited so far, depth budget {})",
                frontier.round(),
                round.len(),
                frontier.visited_count(),
                frontier.depth_remaining()
            );

            // run_batch returns only after every URL of the round has a
            // result, which is the barrier between rounds
            let results = self.dispatcher.run_batch(round).await;
            session.record_round(&results);

            let succeeded = results.iter().filter(|r| r.success).count();
            tracing::info!(
                "Round {} finished: {} succeeded, {} failed",
                frontier.round(),
                succeeded,
                results.len() - succeeded
            );

            // Links found this round become the next round (minus anything
            // already admitted)
            round = frontier.expand(&results);
        }

        Ok(self.finish(session))
    }

    // Closes a session and builds its report
    fn finish(&self, session: CrawlSession) -> CrawlReport {
        let monitor = self.dispatcher.monitor();

        // The background sampler stops when a batch drains, so a batch that
        // is shorter than the check interval was only sampled before any page
        // loaded. One more reading here captures memory after the crawl.
        monitor.sample();

        let report = session.finish(monitor.peak_rss_bytes());
        log_summary(&report.summary);
        report
    }
}

fn log_summary(summary: &CrawlSummary) {
    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        rounds = summary.rounds,
        peak_rss_mb = summary.peak_rss_mb(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "crawl session finished"
    );
}
