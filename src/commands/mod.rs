//! Operation implementations behind the CLI surface

use anyhow::Result;

use crate::cache::{CacheDocument, CacheStore, StalenessDetector, CACHE_SCHEMA_VERSION};
use crate::discovery::Discoverer;
use crate::host::ProviderHost;
use crate::paths;
use crate::runtime::RuntimeInfo;
use crate::schema::ResourceRequest;

pub mod cache;
pub mod invoke;
pub mod list;
pub mod validate;

/// Resolve a usable cache: load it, validate it, and transparently rebuild
/// and persist when stale or absent. Staleness and schema mismatches never
/// surface to the caller.
pub fn ensure_cache(
    store: &CacheStore,
    host: &dyn ProviderHost,
    runtime: RuntimeInfo,
    requested_modules: &[String],
) -> Result<CacheDocument> {
    let detector = StalenessDetector::new(CACHE_SCHEMA_VERSION);
    let live_paths = paths::search_paths();

    if let Some(document) = store.load()? {
        if detector.is_stale(&document, requested_modules, &live_paths) {
            log::info!("Discovery cache is stale, rebuilding");
        } else {
            log::debug!("Using cached discovery results");
            return Ok(document);
        }
    } else {
        log::info!("No discovery cache found, enumerating resources");
    }

    let discoverer = Discoverer::new(host, runtime);
    let entries = discoverer.discover(requested_modules)?;
    let document = CacheDocument::new(live_paths, entries);
    store.save(&document)?;
    Ok(document)
}

/// Unique module names referenced by a request batch, used to scope the
/// staleness check to what the caller actually needs.
pub(crate) fn requested_modules(requests: &[ResourceRequest]) -> Vec<String> {
    let mut modules: Vec<String> = Vec::new();
    for request in requests {
        let module = request
            .resource_type
            .split_once('/')
            .map_or(request.resource_type.as_str(), |(module, _)| module);
        if !modules.iter().any(|m| m.eq_ignore_ascii_case(module)) {
            modules.push(module.to_string());
        }
    }
    modules
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DscBridgeError;
    use crate::host::{Method, RawResource};
    use crate::normalize::ProviderOutput;
    use crate::runtime::{PlatformFamily, MODERN_HOST_MAJOR};
    use serde_json::{json, Map, Value};
    use std::cell::Cell;

    pub(crate) struct CountingHost {
        pub enumerations: Cell<usize>,
    }

    impl CountingHost {
        pub(crate) fn new() -> Self {
            Self {
                enumerations: Cell::new(0),
            }
        }
    }

    impl ProviderHost for CountingHost {
        fn enumerate(&self, _modules: &[String]) -> Result<Vec<RawResource>, DscBridgeError> {
            self.enumerations.set(self.enumerations.get() + 1);
            Ok(vec![RawResource {
                name: "Thing".to_string(),
                module_name: Some("Demo".to_string()),
                version: Some("1.0.0".to_string()),
                implemented_as: Some("ScriptBased".to_string()),
                properties: vec!["Name".to_string()],
                ..RawResource::default()
            }])
        }

        fn invoke(
            &self,
            _method: Method,
            _resource_name: &str,
            _module_name: &str,
            _properties: &Map<String, Value>,
        ) -> Result<ProviderOutput, DscBridgeError> {
            ProviderOutput::from_value(json!({"Name": "x"}))
        }
    }

    fn store_in(dir: &std::path::Path) -> CacheStore {
        CacheStore::new(dir.join("resource_cache.json"))
    }

    fn runtime() -> RuntimeInfo {
        RuntimeInfo::new(PlatformFamily::Linux, MODERN_HOST_MAJOR)
    }

    #[test]
    fn first_call_discovers_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let host = CountingHost::new();

        let document = ensure_cache(&store, &host, runtime(), &[]).unwrap();
        assert_eq!(host.enumerations.get(), 1);
        assert_eq!(document.schema_version, CACHE_SCHEMA_VERSION);
        assert!(store.path().exists());
    }

    #[test]
    fn fresh_cache_is_reused_without_enumeration() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let host = CountingHost::new();

        ensure_cache(&store, &host, runtime(), &["Demo".to_string()]).unwrap();
        ensure_cache(&store, &host, runtime(), &["Demo".to_string()]).unwrap();
        assert_eq!(host.enumerations.get(), 1);
    }

    #[test]
    fn missing_module_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let host = CountingHost::new();

        ensure_cache(&store, &host, runtime(), &[]).unwrap();
        ensure_cache(&store, &host, runtime(), &["Absent".to_string()]).unwrap();
        assert_eq!(host.enumerations.get(), 2);
    }

    #[test]
    fn requested_modules_dedupes_case_insensitively() {
        let requests: Vec<ResourceRequest> = vec![
            ResourceRequest {
                name: "a".to_string(),
                resource_type: "Demo/Thing".to_string(),
                properties: Map::new(),
            },
            ResourceRequest {
                name: "b".to_string(),
                resource_type: "demo/Widget".to_string(),
                properties: Map::new(),
            },
            ResourceRequest {
                name: "c".to_string(),
                resource_type: "Other/Thing".to_string(),
                properties: Map::new(),
            },
        ];

        let modules = requested_modules(&requests);
        assert_eq!(modules, vec!["Demo".to_string(), "Other".to_string()]);
    }
}
