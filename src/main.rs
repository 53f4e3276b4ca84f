// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap and set up logging
// 2. Validate the configuration (before any network request)
// 3. Run one crawl session per seed, one after the other
// 4. Write each session's artifact and print its summary
// 5. Exit with proper code (0 = all pages fetched, 1 = some failed, 2 = error)
// =============================================================================

// Module declarations - one per source file or directory
mod cli;      // src/cli.rs - command-line parsing
mod config;   // src/config.rs - validated settings
mod crawl;    // src/crawl/ - URL identity, frontier and crawl modes
mod dispatch; // src/dispatch/ - bounded, memory-aware fetch pool
mod error;    // src/error.rs - typed errors
mod fetch;    // src/fetch/ - the fetcher port and its HTTP implementation
mod output;   // src/output.rs - markdown and JSON artifacts
mod sitemap;  // src/sitemap.rs - sitemap.xml discovery
#[cfg(test)]
mod testing;  // src/testing.rs - stub fetcher for tests

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::CrawlConfig;
use crawl::{BatchCrawler, CrawlReport};
use dispatch::{AdaptiveDispatcher, MemoryMonitor};
use fetch::HttpFetcher;
use output::{JsonSink, MarkdownSink, ResultSink};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Logs go to stderr; RUST_LOG wins over --verbose
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "page_distiller=debug"
    } else {
        "page_distiller=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// Returns:
//   Ok(0) = every page fetched
//   Ok(1) = at least one page failed
//   Err   = configuration or output error
async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Crawl { urls, depth, options } => {
            let config = CrawlConfig::from_args(&options, depth)?;
            config::parse_seeds(&urls)?;
            handle_crawl(&urls, &config).await
        }
        Commands::Batch { urls, options } => {
            let config = CrawlConfig::from_args(&options, 0)?;
            let pages = config::parse_seeds(&urls)?;
            handle_batch(&urls[0], pages, &config).await
        }
    }
}

// Everything a session needs, built once per invocation
struct Pipeline {
    crawler: BatchCrawler,
    sitemap_client: reqwest::Client,
    sinks: Vec<Box<dyn ResultSink>>,
}

fn build_pipeline(config: &CrawlConfig) -> Result<Pipeline> {
    let fetcher = HttpFetcher::new(config.fetch_timeout()).context("failed to build HTTP client")?;
    let monitor = Arc::new(MemoryMonitor::system());
    let dispatcher = AdaptiveDispatcher::new(
        config.dispatcher.clone(),
        Arc::new(fetcher),
        config.fetch.clone(),
        monitor,
    )?;

    let sitemap_client = reqwest::Client::builder()
        .timeout(config.fetch_timeout())
        .build()
        .context("failed to build sitemap client")?;

    let mut sinks: Vec<Box<dyn ResultSink>> = vec![Box::new(MarkdownSink::new(&config.output_dir))];
    if config.write_json {
        sinks.push(Box::new(JsonSink::new(&config.output_dir)));
    }

    Ok(Pipeline {
        crawler: BatchCrawler::new(dispatcher),
        sitemap_client,
        sinks,
    })
}

// Handles the 'crawl' subcommand: every URL is its own session
async fn handle_crawl(seeds: &[String], config: &CrawlConfig) -> Result<i32> {
    let pipeline = build_pipeline(config)?;
    let mut any_failed = false;

    // Sessions run one after the other, never interleaved
    for seed in seeds {
        let report = run_session(seed, &pipeline.crawler, &pipeline.sitemap_client, config.depth).await?;

        write_outputs(&pipeline.sinks, seed, &report)?;
        print_summary(&report);
        any_failed |= report.summary.failed > 0;
    }

    Ok(if any_failed { 1 } else { 0 })
}

// Runs one crawl session for one seed
//
// A seed ending in .xml is tried as a sitemap first. If discovery yields
// nothing (fetch error, bad XML, no <loc> entries) the seed is crawled
// recursively like any other page.
async fn run_session(
    seed: &str,
    crawler: &BatchCrawler,
    sitemap_client: &reqwest::Client,
    depth: i64,
) -> Result<CrawlReport> {
    println!("🔍 Crawling {}", seed);

    let mut sitemap_urls = Vec::new();
    if sitemap::is_sitemap_url(seed) {
        sitemap_urls = sitemap::discover(sitemap_client, seed).await;
    }

    if sitemap_urls.is_empty() {
        println!("📊 Crawling recursively with depth {}", depth);
        let seed_url =
            crawl::PageUrl::parse(seed).with_context(|| format!("invalid seed '{}'", seed))?;
        Ok(crawler.crawl_recursive(seed_url, depth).await?)
    } else {
        println!("📄 Found {} URL(s) in sitemap", sitemap_urls.len());
        Ok(crawler.crawl_flat(sitemap_urls).await)
    }
}

// Handles the 'batch' subcommand: the whole list is one flat session
async fn handle_batch(name: &str, pages: Vec<crawl::PageUrl>, config: &CrawlConfig) -> Result<i32> {
    let pipeline = build_pipeline(config)?;

    println!("🔍 Fetching {} URL(s)", pages.len());
    let report = pipeline.crawler.crawl_flat(pages).await;

    write_outputs(&pipeline.sinks, name, &report)?;
    print_summary(&report);

    Ok(if report.summary.failed > 0 { 1 } else { 0 })
}

// The artifact is written even when some pages failed
fn write_outputs(sinks: &[Box<dyn ResultSink>], seed: &str, report: &CrawlReport) -> Result<()> {
    for sink in sinks {
        let path = sink.write(seed, &report.pages)?;
        println!("💾 Saved {} page(s) to {}", report.pages.len(), path.display());
    }
    Ok(())
}

fn print_summary(report: &CrawlReport) {
    let summary = &report.summary;

    if !report.failures.is_empty() {
        println!("\n❌ Failed pages:");
        for failure in &report.failures {
            println!(
                "   {}: {}",
                failure.url,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    println!("\n📊 Summary:");
    println!("   ✅ Succeeded: {}", summary.succeeded);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   🔁 Rounds: {}", summary.rounds);
    println!("   🧠 Peak memory: {} MB", summary.peak_rss_mb());
    println!("   ⏱️  Elapsed: {:.2}s\n", summary.elapsed.as_secs_f64());
}
