//! Cache staleness detection
//!
//! A cache is usable only if the schema version matches, every tracked file
//! still exists with an unchanged modification time, and (for unfiltered
//! checks) the live set of module search directories equals the one recorded
//! at discovery time. Timestamps are compared at whole-second resolution so
//! that filesystems and serializers with coarser precision never cause
//! spurious rebuilds.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::Path;

use super::{CacheDocument, CacheEntry};

pub struct StalenessDetector {
    schema_version: u32,
}

impl StalenessDetector {
    pub fn new(schema_version: u32) -> Self {
        Self { schema_version }
    }

    /// Whether a single tracked file invalidates the cache: gone, or
    /// modified at a different whole second than recorded.
    pub fn is_file_stale(path: &Path, cached_secs: i64) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            log::debug!("Tracked file no longer exists: {}", path.display());
            return true;
        };
        let Ok(modified) = metadata.modified() else {
            return true;
        };

        let current_secs = DateTime::<Utc>::from(modified).timestamp();
        if current_secs != cached_secs {
            log::debug!(
                "Tracked file changed: {} ({} -> {})",
                path.display(),
                cached_secs,
                current_secs
            );
            return true;
        }
        false
    }

    /// Whether the cache needs a rebuild.
    ///
    /// With a non-empty module filter only the named modules are validated:
    /// a module with no entry at all is stale, otherwise its entries' tracked
    /// files are checked. The unfiltered check is conservative: every entry's
    /// files, plus search-path drift, because a module can appear or vanish
    /// without any tracked file changing.
    pub fn is_stale(
        &self,
        cache: &CacheDocument,
        requested_modules: &[String],
        live_search_paths: &BTreeSet<String>,
    ) -> bool {
        if cache.schema_version != self.schema_version {
            log::debug!(
                "Cache schema version {} does not match expected {}",
                cache.schema_version,
                self.schema_version
            );
            return true;
        }

        if cache.entries.is_empty() {
            log::debug!("Cache has no entries");
            return true;
        }

        if !requested_modules.is_empty() {
            return requested_modules
                .iter()
                .any(|module| self.module_is_stale(cache, module));
        }

        if cache.entries.iter().any(entry_files_stale) {
            return true;
        }

        if cache.search_paths != *live_search_paths {
            let drift: Vec<&String> = cache
                .search_paths
                .symmetric_difference(live_search_paths)
                .collect();
            log::debug!("Search paths changed: {drift:?}");
            return true;
        }

        false
    }

    fn module_is_stale(&self, cache: &CacheDocument, module: &str) -> bool {
        let mut found = false;
        for entry in cache.entries.iter().filter(|e| e.in_module(module)) {
            found = true;
            if entry_files_stale(entry) {
                return true;
            }
        }
        if !found {
            log::debug!("Module not present in cache: {module}");
            return true;
        }
        false
    }
}

fn entry_files_stale(entry: &CacheEntry) -> bool {
    entry
        .tracked_files
        .iter()
        .any(|(path, cached)| StalenessDetector::is_file_stale(Path::new(path), *cached))
}

// ============================================================================
// Tests
// ============================================================================
