//! Source list providers.
//!
//! The poll loop reloads the list at the start of every cycle, so sources can
//! be added or removed without restarting.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::trace;

use crate::{Error, Result};

/// Supplies the ordered list of source identifiers to check.
#[async_trait]
pub trait SourceListProvider: Send + Sync + 'static {
    async fn load(&self) -> Result<Vec<String>>;
}

/// Source list stored as a text file, one identifier per line.
#[derive(Debug, Clone)]
pub struct FileSourceList {
    path: PathBuf,
}

impl FileSourceList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fail with a configuration error if the file is missing.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.is_file() {
            return Ok(());
        }
        Err(Error::config(format!(
            "could not find source list at {}; create this file and put one source per line",
            self.path.display()
        )))
    }
}

/// Parse a source list: trimmed, non-empty lines in file order.
pub fn parse_source_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl SourceListProvider for FileSourceList {
    async fn load(&self) -> Result<Vec<String>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::SourceList(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        let sources = parse_source_list(&contents);
        trace!(path = %self.path.display(), count = sources.len(), "Loaded source list");
        Ok(sources)
    }
}

/// Fixed, in-memory source list.
#[derive(Debug, Clone, Default)]
pub struct StaticSourceList {
    sources: Vec<String>,
}

impl StaticSourceList {
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl SourceListProvider for StaticSourceList {
    async fn load(&self) -> Result<Vec<String>> {
        Ok(self.sources.clone())
    }
}
