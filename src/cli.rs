// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
// - crawl: each URL is its own crawl session (sitemaps become flat batches,
//   everything else is crawled recursively up to --depth)
// - batch: the URLs are one flat batch, fetched once, no link following
//
// Numeric flags can also be set through DISTILL_* environment variables.
// Range checks happen in config.rs, not here, so that a bad value from the
// environment is reported the same way as a bad flag.
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "page-distiller",
    version,
    about = "Crawl websites and sitemaps and distill every page into markdown",
    long_about = "page-distiller fetches pages starting from seed URLs or sitemaps, converts each \
                  page to markdown and writes one artifact per seed. Fetches run concurrently and \
                  new fetches are held back while host memory usage is high."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug output (RUST_LOG overrides this)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl each URL as an independent session
    ///
    /// Example: page-distiller crawl https://example.com/docs --depth 2
    Crawl {
        /// Website or sitemap URLs (a URL ending in .xml is read as a sitemap)
        #[arg(required = true)]
        urls: Vec<String>,

        /// Maximum link depth for recursive crawling (0 = only the seed)
        #[arg(short, long, default_value_t = 3, env = "DISTILL_DEPTH", allow_negative_numbers = true)]
        depth: i64,

        #[command(flatten)]
        options: CrawlArgs,
    },

    /// Fetch an explicit list of URLs as one batch, without following links
    ///
    /// Example: page-distiller batch https://example.com/a https://example.com/b
    Batch {
        /// Page URLs to fetch; the output is named after the first one
        #[arg(required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        options: CrawlArgs,
    },
}

/// Settings shared by both subcommands
#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Maximum number of fetches in flight at once
    #[arg(
        short = 'c',
        long,
        default_value_t = 10,
        env = "DISTILL_MAX_CONCURRENT",
        allow_negative_numbers = true
    )]
    pub max_concurrent: i64,

    /// Hold back new fetches while host memory usage is above this percentage
    #[arg(long, default_value_t = 70.0, env = "DISTILL_MEMORY_THRESHOLD")]
    pub memory_threshold: f64,

    /// Seconds between memory pressure checks
    #[arg(long, default_value_t = 1.0)]
    pub check_interval: f64,

    /// Per-page fetch timeout in seconds
    #[arg(long, default_value_t = 30.0, env = "DISTILL_TIMEOUT")]
    pub timeout: f64,

    /// Directory the artifacts are written to
    #[arg(short, long, default_value = "output", env = "DISTILL_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Also write the results as JSON next to the markdown file
    #[arg(long)]
    pub json: bool,

    /// Follow and keep links that leave the page's host
    #[arg(long)]
    pub include_external: bool,

    /// Reuse responses for URLs fetched earlier in this run
    #[arg(long)]
    pub use_cache: bool,

    /// HTML elements stripped from page content (repeatable)
    #[arg(long = "exclude-tag", value_name = "TAG", default_values_t = ["nav".to_string(), "footer".to_string()])]
    pub exclude_tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_crawl_defaults() {
        let cli = Cli::try_parse_from(["page-distiller", "crawl", "https://example.com"]).unwrap();
        match cli.command {
            Commands::Crawl { urls, depth, options } => {
                assert_eq!(urls, vec!["https://example.com"]);
                assert_eq!(depth, 3);
                assert_eq!(options.max_concurrent, 10);
                assert_eq!(options.memory_threshold, 70.0);
                assert_eq!(options.output_dir, PathBuf::from("output"));
                assert_eq!(options.exclude_tags, vec!["nav", "footer"]);
                assert!(!options.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_crawl_flags() {
        let cli = Cli::try_parse_from([
            "page-distiller",
            "crawl",
            "https://a.example",
            "https://b.example/sitemap.xml",
            "-d",
            "1",
            "-c",
            "4",
            "--exclude-tag",
            "aside",
            "--json",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Crawl { urls, depth, options } => {
                assert_eq!(urls.len(), 2);
                assert_eq!(depth, 1);
                assert_eq!(options.max_concurrent, 4);
                assert_eq!(options.exclude_tags, vec!["aside"]);
                assert!(options.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_negative_values_reach_validation() {
        let cli = Cli::try_parse_from(["page-distiller", "crawl", "https://a.example", "-d", "-1"]).unwrap();
        assert!(matches!(cli.command, Commands::Crawl { depth: -1, .. }));
    }

    #[test]
    fn test_batch_requires_urls() {
        assert!(Cli::try_parse_from(["page-distiller", "batch"]).is_err());
    }
}
