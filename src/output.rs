// src/output.rs
// =============================================================================
// Result sinks: where a finished crawl session ends up.
//
// - MarkdownSink: one .md file, one block per page, blocks separated by "---"
// - JsonSink: one .json file with the full PageResult records
//
// File names are derived from the seed URL, so crawling the same seed twice
// overwrites the same artifact.
// =============================================================================

use crate::crawl::PageResult;
use crate::error::SinkError;
use std::fs;
use std::path::{Path, PathBuf};

const PAGE_SEPARATOR: &str = "\n---\n\n";

pub trait ResultSink {
    /// Persists `pages` for the session seeded by `seed`; returns the path written.
    fn write(&self, seed: &str, pages: &[PageResult]) -> Result<PathBuf, SinkError>;
}

// Turns a seed URL into a filesystem-safe token
//
// Example:
//   "https://docs.example.com/guide/intro" -> "docs_example_com_guide_intro"
pub fn output_token(seed: &str) -> String {
    let trimmed = seed
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");

    trimmed
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// Concatenates pages into the markdown artifact body
pub fn render_markdown(pages: &[PageResult]) -> String {
    pages
        .iter()
        .map(|page| format!("URL: {}\n\nContent:\n\n{}", page.url, page.content))
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

fn ensure_dir(dir: &Path) -> Result<(), SinkError> {
    fs::create_dir_all(dir).map_err(|source| SinkError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_file(path: PathBuf, contents: &str) -> Result<PathBuf, SinkError> {
    fs::write(&path, contents).map_err(|source| SinkError::Write {
        path: path.clone(),
        source,
    })?;
    tracing::info!("Wrote {} bytes to {}", contents.len(), path.display());
    Ok(path)
}

#[derive(Debug, Clone)]
pub struct MarkdownSink {
    dir: PathBuf,
}

impl MarkdownSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        MarkdownSink { dir: dir.into() }
    }
}

impl ResultSink for MarkdownSink {
    fn write(&self, seed: &str, pages: &[PageResult]) -> Result<PathBuf, SinkError> {
        ensure_dir(&self.dir)?;
        let path = self.dir.join(format!("{}.md", output_token(seed)));
        write_file(path, &render_markdown(pages))
    }
}

#[derive(Debug, Clone)]
pub struct JsonSink {
    dir: PathBuf,
}

impl JsonSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        JsonSink { dir: dir.into() }
    }
}

impl ResultSink for JsonSink {
    fn write(&self, seed: &str, pages: &[PageResult]) -> Result<PathBuf, SinkError> {
        ensure_dir(&self.dir)?;
        let json = serde_json::to_string_pretty(pages)?;
        let path = self.dir.join(format!("{}.json", output_token(seed)));
        write_file(path, &json)
    }
}
