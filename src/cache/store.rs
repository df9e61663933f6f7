//! Cache persistence
//!
//! Whole-document JSON reads and writes at a fixed location. A missing file
//! is not an error; the caller treats it the same as a stale cache. Writes
//! are plain overwrites: concurrent adapter invocations race last-writer-wins
//! by design, matching the behavior callers already depend on.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::CacheDocument;
use crate::paths;

pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the per-platform default location.
    pub fn at_default_location() -> Result<Self> {
        Ok(Self::new(paths::cache_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cache document, or `None` when absent or unreadable as a
    /// document (an unparseable file forces a rebuild the same way a
    /// missing one does).
    pub fn load(&self) -> Result<Option<CacheDocument>> {
        if !self.path.exists() {
            log::debug!("Cache file does not exist: {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Could not read cache file: {}", self.path.display()))?;

        match serde_json::from_str(&content) {
            Ok(document) => {
                log::debug!("Loaded cache from {}", self.path.display());
                Ok(Some(document))
            }
            Err(e) => {
                log::warn!("Discarding unparseable cache file: {e}");
                Ok(None)
            }
        }
    }

    /// Persist the document, replacing any previous content.
    pub fn save(&self, document: &CacheDocument) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(document).context("Failed to serialize cache")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write cache file: {}", self.path.display()))?;

        log::debug!("Saved cache to {}", self.path.display());
        Ok(())
    }

    /// Delete the cache file. Missing file is success.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Removed cache file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Cache file already absent: {}", self.path.display());
                Ok(())
            }
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove cache file: {}", self.path.display())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
