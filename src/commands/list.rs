//! List cached resources

use anyhow::Result;
use serde_json::json;

use super::ensure_cache;
use crate::cache::{CacheEntry, CacheStore};
use crate::host::ProviderHost;
use crate::runtime::RuntimeInfo;

/// Print one JSON summary per cached resource, rebuilding the cache first
/// if it is stale.
pub fn run(store: &CacheStore, host: &dyn ProviderHost, runtime: RuntimeInfo) -> Result<()> {
    let cache = ensure_cache(store, host, runtime, &[])?;
    for entry in &cache.entries {
        println!("{}", serde_json::to_string(&summary(entry))?);
    }
    Ok(())
}

fn summary(entry: &CacheEntry) -> serde_json::Value {
    json!({
        "type": entry.type_key,
        "kind": entry.info.kind.to_string(),
        "implementedAs": entry.info.kind.to_string(),
        "version": entry.info.version,
        "path": entry.info.path,
        "directory": entry.info.parent_path,
        "author": entry.info.company,
        "properties": entry.info.properties,
        "requireAdapter": true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::test_support::entry;
    use crate::cache::ResourceKind;

    #[test]
    fn summary_carries_type_kind_and_adapter_marker() {
        let value = summary(&entry("Demo/Thing", ResourceKind::ClassBased));
        assert_eq!(value["type"], "Demo/Thing");
        assert_eq!(value["kind"], "ClassBased");
        assert_eq!(value["implementedAs"], "ClassBased");
        assert_eq!(value["requireAdapter"], true);
        assert!(value["properties"].as_array().is_some());
    }
}
