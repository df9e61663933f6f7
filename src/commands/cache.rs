//! Cache maintenance

use anyhow::Result;

use crate::cache::CacheStore;

/// Delete the discovery cache file; the next operation rebuilds it.
pub fn clear(store: &CacheStore) -> Result<()> {
    store.clear()
}
