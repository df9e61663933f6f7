//! Discovery cache: document model, store, and staleness detection
//!
//! Enumerating installed resource modules is expensive, so the results are
//! persisted as a versioned JSON document. The document is rebuilt wholesale
//! whenever the staleness detector says so; it is never patched in place.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub mod staleness;
pub mod store;

pub use staleness::StalenessDetector;
pub use store::CacheStore;

/// Bumped whenever the cache document shape changes; older documents are
/// discarded wholesale.
pub const CACHE_SCHEMA_VERSION: u32 = 3;

/// How a resource's logic is implemented. Closed set: anything else found
/// during discovery is skipped, and anything else reaching dispatch is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    ScriptBased,
    ClassBased,
    Binary,
    Composite,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ScriptBased => "ScriptBased",
            Self::ClassBased => "ClassBased",
            Self::Binary => "Binary",
            Self::Composite => "Composite",
        };
        write!(f, "{label}")
    }
}

/// Metadata for one discovered resource. Immutable once cached; unset source
/// fields are recorded as empty strings, never omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub kind: ResourceKind,
    pub name: String,
    pub module_name: String,
    pub version: String,
    pub path: String,
    pub parent_path: String,
    pub company: String,
    #[serde(default)]
    pub properties: Vec<String>,
}

/// One cache entry, keyed by `"<Module>/<Resource>"`. `tracked_files` maps
/// every file under the resource's owning directory (by extension allowlist)
/// to its modification time in whole unix seconds; it is the staleness
/// witness set for the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub type_key: String,
    pub info: ResourceInfo,
    #[serde(default)]
    pub tracked_files: BTreeMap<String, i64>,
}

impl CacheEntry {
    /// Whether this entry belongs to the given module (the part of the type
    /// key before the slash, compared case-insensitively).
    pub fn in_module(&self, module: &str) -> bool {
        match self.type_key.split_once('/') {
            Some((entry_module, _)) => entry_module.eq_ignore_ascii_case(module),
            None => false,
        }
    }
}

/// The versioned cache document persisted between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheDocument {
    pub schema_version: u32,
    #[serde(default)]
    pub search_paths: BTreeSet<String>,
    #[serde(default)]
    pub entries: Vec<CacheEntry>,
}

impl CacheDocument {
    pub fn new(search_paths: BTreeSet<String>, entries: Vec<CacheEntry>) -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            search_paths,
            entries,
        }
    }

    /// Look up an entry by type key (case-insensitive, the engine's
    /// convention for type names).
    pub fn find_entry(&self, type_key: &str) -> Option<&CacheEntry> {
        self.entries
            .iter()
            .find(|entry| entry.type_key.eq_ignore_ascii_case(type_key))
    }
}
