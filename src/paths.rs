//! Centralized path resolution for dscbridge
//!
//! # Environment Variables
//!
//! - `DSCBRIDGE_STATE_DIR` - Override state directory (cache file location)
//! - `DSCBRIDGE_RESOURCE_PATH` - Override resource module search paths
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `DSCBRIDGE_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/dscbridge` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\dscbridge`
//!    - macOS/Linux: `~/.local/state/dscbridge`
//!
//! Search paths come from `DSCBRIDGE_RESOURCE_PATH` when set, otherwise
//! from `PSModulePath`, split on the platform path-list separator.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "DSCBRIDGE_STATE_DIR";

/// Environment variable for resource search path override
pub const ENV_RESOURCE_PATH: &str = "DSCBRIDGE_RESOURCE_PATH";

/// Environment variable the host shell populates with module locations
pub const ENV_MODULE_PATH: &str = "PSModulePath";

#[cfg(windows)]
const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: char = ':';

/// Get the dscbridge state directory path
pub fn state_dir() -> Result<PathBuf> {
    // 1. Check environment variable override
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    // 2. Check XDG_STATE_HOME
    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("dscbridge");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    // 3. Platform default
    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join("dscbridge");
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    // Unix default: ~/.local/state/dscbridge
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join("dscbridge");
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Get the cache file path
pub fn cache_file() -> Result<PathBuf> {
    Ok(state_dir()?.join("resource_cache.json"))
}

/// Get the live set of resource module search directories.
///
/// The set (not the order) is what matters: the staleness detector
/// compares it against the set recorded at discovery time.
pub fn search_paths() -> BTreeSet<String> {
    let raw = std::env::var(ENV_RESOURCE_PATH)
        .or_else(|_| std::env::var(ENV_MODULE_PATH))
        .unwrap_or_default();

    raw.split(PATH_LIST_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(|segment| expand(segment).display().to_string())
        .collect()
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Helper to run a test with temporary env var
    ///
    /// # Safety
    /// This function uses unsafe env::set_var/remove_var which can cause issues
    /// if other threads read environment variables concurrently.
    /// Only use in single-threaded test contexts.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    #[test]
    fn test_state_dir_env_override() {
        with_env_var(ENV_STATE_DIR, "/custom/state/path", || {
            let result = state_dir().unwrap();
            assert_eq!(result, PathBuf::from("/custom/state/path"));
        });
    }

    #[test]
    fn test_cache_file_under_state_dir() {
        with_env_var(ENV_STATE_DIR, "/custom/state/path", || {
            let result = cache_file().unwrap();
            assert_eq!(
                result,
                PathBuf::from("/custom/state/path/resource_cache.json")
            );
        });
    }

    #[cfg(unix)]
    #[test]
    fn test_search_paths_split_and_deduped() {
        with_env_var(ENV_RESOURCE_PATH, "/a/modules:/b/modules:/a/modules", || {
            let paths = search_paths();
            assert_eq!(paths.len(), 2);
            assert!(paths.contains("/a/modules"));
            assert!(paths.contains("/b/modules"));
        });
    }

    #[cfg(unix)]
    #[test]
    fn test_search_paths_skip_empty_segments() {
        with_env_var(ENV_RESOURCE_PATH, ":/a/modules::", || {
            let paths = search_paths();
            assert_eq!(paths.len(), 1);
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn test_expand_absolute() {
        let result = expand("/absolute/path");
        assert_eq!(result, PathBuf::from("/absolute/path"));
    }
}
