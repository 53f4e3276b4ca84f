// src/dispatch/pool.rs
// =============================================================================
// The adaptive dispatcher: a bounded pool of concurrent fetch tasks.
//
// A URL is admitted only when both gates are open:
// 1. a slot is free (at most `max_concurrent` fetches in flight)
// 2. the latest memory sample is at or below `memory_threshold_percent`
//
// Pressure only delays admission. Fetches that are already running are never
// cancelled, whatever the memory sample says.
//
// Every admitted URL yields exactly one PageResult. Errors, timeouts and even
// panics inside the fetcher become failed results; nothing escapes the batch.
//
// Rust concepts:
// - Semaphore: counts free slots, each permit is one DispatchTicket
// - watch channel: the latest pressure sample, updated by a background task
// - mpsc channel: results arrive in completion order
// =============================================================================

use super::memory::MemoryMonitor;
use crate::crawl::{PageResult, PageUrl};
use crate::error::{ConfigError, FetchError};
use crate::fetch::{FetchOptions, Fetcher};
use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    pub max_concurrent: usize,
    pub memory_threshold_percent: f64,
    /// How often the background sampler re-reads memory pressure
    pub check_interval: Duration,
    /// Per-fetch limit; `None` lets a fetch run forever
    pub fetch_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            max_concurrent: 10,
            memory_threshold_percent: 70.0,
            check_interval: Duration::from_secs(1),
            fetch_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidConcurrency(0));
        }
        let threshold = self.memory_threshold_percent;
        if !(threshold > 0.0 && threshold <= 100.0) {
            return Err(ConfigError::InvalidMemoryThreshold(threshold));
        }
        if self.check_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                name: "check interval",
            });
        }
        if self.fetch_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ZeroDuration {
                name: "fetch timeout",
            });
        }
        Ok(())
    }
}

/// One occupied fetch slot. The slot frees itself when the ticket drops.
#[derive(Debug)]
pub struct DispatchTicket {
    _permit: OwnedSemaphorePermit,
}

pub struct AdaptiveDispatcher {
    config: DispatcherConfig,
    fetcher: Arc<dyn Fetcher>,
    options: Arc<FetchOptions>,
    monitor: Arc<MemoryMonitor>,
}

impl AdaptiveDispatcher {
    /// Fails fast on an invalid configuration, before any fetch is started.
    pub fn new(
        config: DispatcherConfig,
        fetcher: Arc<dyn Fetcher>,
        options: FetchOptions,
        monitor: Arc<MemoryMonitor>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(AdaptiveDispatcher {
            config,
            fetcher,
            options: Arc::new(options),
            monitor,
        })
    }

    pub fn monitor(&self) -> &Arc<MemoryMonitor> {
        &self.monitor
    }

    /// Fetches every URL and returns one result per URL, in completion order.
    pub async fn run_batch(&self, urls: Vec<PageUrl>) -> Vec<PageResult> {
        if urls.is_empty() {
            return Vec::new();
        }

        let total = urls.len();
        // The sampler lives exactly as long as this batch
        let sampler = self.monitor.spawn_sampler(self.config.check_interval);
        let mut pressure = sampler.subscribe();
        let slots = Arc::new(Semaphore::new(self.config.max_concurrent));
        // Unbounded is fine: at most `total` messages are ever sent
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Keyed by submission index so duplicate URLs in the input stay distinct
        let mut outstanding = BTreeMap::new();

        for (index, url) in urls.into_iter().enumerate() {
            // Blocks here until a slot is free and memory is acceptable
            let ticket = self.admit(&slots, &mut pressure).await;
            outstanding.insert(index, url.clone());

            // Each task gets its own handles to the shared pieces
            let tx = tx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let options = Arc::clone(&self.options);
            let timeout = self.config.fetch_timeout;

            tokio::spawn(async move {
                let result = fetch_one(fetcher.as_ref(), url, &options, timeout).await;
                // The receiver outlives every task
                let _ = tx.send((index, result));
                drop(ticket);
            });
        }
        // Drop our sender so rx.recv() returns None after the last task
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some((index, result)) = rx.recv().await {
            outstanding.remove(&index);
            if let Some(error) = &result.error {
                tracing::warn!("Failed to fetch {}: {}", result.url, error);
            }
            results.push(result);
        }

        // Only reachable if the runtime shut a task down before it reported
        for (_, url) in outstanding {
            tracing::error!("Fetch task for {} ended without a result", url);
            results.push(PageResult::failure(url, "fetch task was cancelled"));
        }

        tracing::debug!(
            total,
            succeeded = results.iter().filter(|r| r.success).count(),
            "batch drained"
        );
        results
    }

    // Waits for a free slot, then for memory pressure to be acceptable
    async fn admit(&self, slots: &Arc<Semaphore>, pressure: &mut watch::Receiver<f64>) -> DispatchTicket {
        let permit = Arc::clone(slots)
            .acquire_owned()
            .await
            .expect("dispatch semaphore is never closed");

        let threshold = self.config.memory_threshold_percent;
        let current = *pressure.borrow();
        if current > threshold {
            tracing::info!(
                "Memory usage {:.1}% is above {:.1}%, pausing new fetches",
                current,
                threshold
            );
            if pressure.wait_for(|p| *p <= threshold).await.is_err() {
                // Pressure is advisory; without a sampler we keep going
                tracing::warn!("Memory sampler stopped, admitting without pressure check");
            } else {
                tracing::info!("Memory pressure relieved, resuming fetches");
            }
        }

        DispatchTicket { _permit: permit }
    }
}

// Runs one fetch and converts every possible outcome into a PageResult
async fn fetch_one(
    fetcher: &dyn Fetcher,
    url: PageUrl,
    options: &FetchOptions,
    timeout: Option<Duration>,
) -> PageResult {
    let outcome = {
        let fetch = AssertUnwindSafe(fetcher.fetch(&url, options)).catch_unwind();
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, fetch).await {
                Ok(outcome) => outcome,
                Err(_) => Ok(Err(FetchError::Timeout(limit))),
            },
            None => fetch.await,
        }
    };

    match outcome {
        Ok(Ok(mut result)) => {
            // The result is always filed under the URL that was dispatched
            result.url = url;
            if !result.success {
                result.links.clear();
            }
            result
        }
        Ok(Err(error)) => PageResult::failure(url, error.to_string()),
        Err(panic) => PageResult::failure(url, FetchError::Panicked(panic_message(panic)).to_string()),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::memory::tests::ScriptedProbe;
    use crate::testing::{url_of, StubFetcher};
    use std::collections::HashSet;

    fn dispatcher(fetcher: Arc<StubFetcher>, config: DispatcherConfig) -> AdaptiveDispatcher {
        let monitor = Arc::new(MemoryMonitor::new(ScriptedProbe::new(&[10.0])));
        AdaptiveDispatcher::new(config, fetcher, FetchOptions::default(), monitor).unwrap()
    }

    fn urls(n: usize) -> Vec<PageUrl> {
        (0..n)
            .map(|i| url_of(&format!("https://example.com/p{}", i)))
            .collect()
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = DispatcherConfig {
            max_concurrent: 0,
            ..DispatcherConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidConcurrency(0)));

        let monitor = Arc::new(MemoryMonitor::new(ScriptedProbe::new(&[10.0])));
        let result = AdaptiveDispatcher::new(
            config,
            Arc::new(StubFetcher::new()),
            FetchOptions::default(),
            monitor,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_threshold_and_durations_validated() {
        let bad_threshold = DispatcherConfig {
            memory_threshold_percent: 0.0,
            ..DispatcherConfig::default()
        };
        assert!(matches!(
            bad_threshold.validate(),
            Err(ConfigError::InvalidMemoryThreshold(_))
        ));

        let bad_interval = DispatcherConfig {
            check_interval: Duration::ZERO,
            ..DispatcherConfig::default()
        };
        assert!(bad_interval.validate().is_err());

        let no_timeout = DispatcherConfig {
            fetch_timeout: None,
            ..DispatcherConfig::default()
        };
        assert!(no_timeout.validate().is_ok());
    }

    #[tokio::test]
    async fn test_empty_batch_returns_immediately() {
        let fetcher = Arc::new(StubFetcher::new());
        let results = dispatcher(fetcher.clone(), DispatcherConfig::default())
            .run_batch(Vec::new())
            .await;
        assert!(results.is_empty());
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_one_result_per_url() {
        let mut stub = StubFetcher::new();
        for url in urls(12) {
            stub = stub.page(url.as_str(), &[]);
        }
        let fetcher = Arc::new(stub);
        let results = dispatcher(fetcher.clone(), DispatcherConfig::default())
            .run_batch(urls(12))
            .await;

        assert_eq!(results.len(), 12);
        let seen: HashSet<_> = results.iter().map(|r| r.url.clone()).collect();
        assert_eq!(seen, urls(12).into_iter().collect());
        assert!(results.iter().all(|r| r.success));
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let mut stub = StubFetcher::new().with_delay(Duration::from_millis(20));
        for url in urls(20) {
            stub = stub.page(url.as_str(), &[]);
        }
        let fetcher = Arc::new(stub);
        let config = DispatcherConfig {
            max_concurrent: 3,
            ..DispatcherConfig::default()
        };

        let results = dispatcher(fetcher.clone(), config).run_batch(urls(20)).await;

        assert_eq!(results.len(), 20);
        assert!(fetcher.peak_in_flight() <= 3, "peak was {}", fetcher.peak_in_flight());
        assert!(fetcher.peak_in_flight() >= 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        let all = urls(10);
        let mut stub = StubFetcher::new();
        for url in &all[1..] {
            stub = stub.page(url.as_str(), &[]);
        }
        stub = stub.failing(all[0].as_str(), "connection refused");
        let fetcher = Arc::new(stub);

        let results = dispatcher(fetcher, DispatcherConfig::default())
            .run_batch(all.clone())
            .await;

        assert_eq!(results.len(), 10);
        assert_eq!(results.iter().filter(|r| r.success).count(), 9);
        let failed = results.iter().find(|r| !r.success).unwrap();
        assert_eq!(failed.url, all[0]);
        assert_eq!(failed.error.as_deref(), Some("connection refused"));
        assert!(failed.links.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_fetch_becomes_failure() {
        let fetcher = Arc::new(
            StubFetcher::new()
                .page("https://example.com/ok", &[])
                .panicking("https://example.com/boom"),
        );
        let results = dispatcher(fetcher, DispatcherConfig::default())
            .run_batch(vec![
                url_of("https://example.com/ok"),
                url_of("https://example.com/boom"),
            ])
            .await;

        assert_eq!(results.len(), 2);
        let boom = results
            .iter()
            .find(|r| r.url == url_of("https://example.com/boom"))
            .unwrap();
        assert!(!boom.success);
        assert!(boom.error.as_deref().unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn test_hanging_fetch_times_out() {
        let fetcher = Arc::new(StubFetcher::new().hanging("https://example.com/slow"));
        let config = DispatcherConfig {
            fetch_timeout: Some(Duration::from_millis(50)),
            ..DispatcherConfig::default()
        };

        let results = dispatcher(fetcher, config)
            .run_batch(vec![url_of("https://example.com/slow")])
            .await;

        assert_eq!(results.len(), 1);
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().starts_with("timed out"));
    }

    #[tokio::test]
    async fn test_duplicate_input_urls_each_get_a_result() {
        let fetcher = Arc::new(StubFetcher::new().page("https://example.com/a", &[]));
        let a = url_of("https://example.com/a");
        let results = dispatcher(fetcher.clone(), DispatcherConfig::default())
            .run_batch(vec![a.clone(), a.clone()])
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(fetcher.call_count("https://example.com/a"), 2);
    }

    #[tokio::test]
    async fn test_admission_waits_for_memory_pressure_to_drop() {
        // Initial sample and the next two ticks are over the threshold
        let monitor = Arc::new(MemoryMonitor::new(ScriptedProbe::new(&[95.0, 90.0, 85.0, 20.0])));
        let fetcher = Arc::new(StubFetcher::new().page("https://example.com/a", &[]));
        let config = DispatcherConfig {
            check_interval: Duration::from_millis(10),
            ..DispatcherConfig::default()
        };
        let dispatcher =
            AdaptiveDispatcher::new(config, fetcher.clone(), FetchOptions::default(), monitor.clone())
                .unwrap();

        let results = dispatcher
            .run_batch(vec![url_of("https://example.com/a")])
            .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        // The fetch could only have been admitted after the 20% sample
        assert_eq!(monitor.last_sample(), 20.0);
        assert_eq!(fetcher.call_count("https://example.com/a"), 1);
    }
}
