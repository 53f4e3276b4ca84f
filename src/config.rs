// src/config.rs
// =============================================================================
// Turns raw command-line values into a validated crawl configuration.
//
// Everything here runs before the first network request. An invalid bound
// (no concurrency, negative depth, a threshold outside (0, 100], a zero or
// negative duration, an unparseable seed) stops the run with a ConfigError.
// =============================================================================

use crate::cli::CrawlArgs;
use crate::crawl::PageUrl;
use crate::dispatch::DispatcherConfig;
use crate::error::ConfigError;
use crate::fetch::{CacheMode, FetchOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlConfig {
    pub dispatcher: DispatcherConfig,
    pub fetch: FetchOptions,
    pub depth: i64,
    pub output_dir: PathBuf,
    pub write_json: bool,
}

impl CrawlConfig {
    pub fn from_args(args: &CrawlArgs, depth: i64) -> Result<Self, ConfigError> {
        if args.max_concurrent < 1 {
            return Err(ConfigError::InvalidConcurrency(args.max_concurrent));
        }
        if depth < 0 {
            return Err(ConfigError::InvalidDepth(depth));
        }

        let timeout = seconds(args.timeout, "fetch timeout")?;
        let dispatcher = DispatcherConfig {
            max_concurrent: args.max_concurrent as usize,
            memory_threshold_percent: args.memory_threshold,
            check_interval: seconds(args.check_interval, "check interval")?,
            fetch_timeout: Some(timeout),
        };
        dispatcher.validate()?;

        let fetch = FetchOptions {
            excluded_tags: args.exclude_tags.iter().map(|t| t.trim().to_string()).collect(),
            exclude_external_links: !args.include_external,
            cache_mode: if args.use_cache {
                CacheMode::Use
            } else {
                CacheMode::Bypass
            },
            ..FetchOptions::default()
        };

        Ok(CrawlConfig {
            dispatcher,
            fetch,
            depth,
            output_dir: args.output_dir.clone(),
            write_json: args.json,
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.dispatcher.fetch_timeout.unwrap_or(Duration::from_secs(30))
    }
}

// Positive, finite seconds only
fn seconds(value: f64, name: &'static str) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(ConfigError::ZeroDuration { name }),
    }
}

/// Parses every seed up front so a typo fails the run before anything is fetched.
pub fn parse_seeds(urls: &[String]) -> Result<Vec<PageUrl>, ConfigError> {
    if urls.is_empty() {
        return Err(ConfigError::NoUrls);
    }

    urls.iter()
        .map(|raw| {
            let url = PageUrl::parse(raw).map_err(|e| ConfigError::InvalidUrl {
                url: raw.clone(),
                reason: e.to_string(),
            })?;
            match url.as_url().scheme() {
                "http" | "https" => Ok(url),
                other => Err(ConfigError::InvalidUrl {
                    url: raw.clone(),
                    reason: format!("unsupported scheme '{}'", other),
                }),
            }
        })
        .collect()
}
