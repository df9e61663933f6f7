//! Resource discovery
//!
//! Turns the host's raw enumeration into cache entries: resolves incomplete
//! metadata, keeps only the highest installed version of each module, skips
//! what the current runtime cannot execute, and records the tracked-file set
//! that later staleness checks witness against.

use chrono::{DateTime, Utc};
use semver::Version;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cache::{CacheEntry, ResourceInfo, ResourceKind};
use crate::error::DscBridgeError;
use crate::host::{ProviderHost, RawResource};
use crate::runtime::RuntimeInfo;

/// File extensions tracked for staleness under a resource's directory tree.
const TRACKED_EXTENSIONS: [&str; 4] = ["ps1", "psd1", "psm1", "mof"];

/// Path marker for platform-shipped resources that may lack module manifests.
const BUILTIN_PATH_MARKER: &str = "system32/configuration";

/// Path marker for resources that require the legacy Windows-only host.
const LEGACY_PATH_MARKER: &str = "system32/windowspowershell";

const BUILTIN_MODULE_NAME: &str = "PSDesiredStateConfiguration";
const BUILTIN_COMPANY: &str = "Microsoft Corporation";

pub struct Discoverer<'a> {
    host: &'a dyn ProviderHost,
    runtime: RuntimeInfo,
}

struct ResolvedResource {
    kind: ResourceKind,
    name: String,
    module_name: String,
    version: String,
    path: String,
    parent_path: String,
    company: String,
    properties: Vec<String>,
}

impl<'a> Discoverer<'a> {
    pub fn new(host: &'a dyn ProviderHost, runtime: RuntimeInfo) -> Self {
        Self { host, runtime }
    }

    /// Enumerate, resolve, dedupe, and convert to cache entries. Type-key
    /// uniqueness across the returned list is guaranteed.
    pub fn discover(
        &self,
        requested_modules: &[String],
    ) -> Result<Vec<CacheEntry>, DscBridgeError> {
        let raw = self.host.enumerate(requested_modules)?;
        log::debug!("Enumeration returned {} resource records", raw.len());

        let resolved: Vec<ResolvedResource> = raw
            .into_iter()
            .filter_map(|record| self.resolve(record))
            .collect();
        let surviving = keep_highest_module_versions(resolved);

        let mut entries: BTreeMap<String, CacheEntry> = BTreeMap::new();
        for resource in surviving {
            let type_key = format!("{}/{}", resource.module_name, resource.name);
            let key = type_key.to_lowercase();
            if entries.contains_key(&key) {
                log::debug!("Skipping duplicate resource {type_key}");
                continue;
            }

            let tracked_files = track_files(&resource);
            entries.insert(
                key,
                CacheEntry {
                    type_key,
                    info: ResourceInfo {
                        kind: resource.kind,
                        name: resource.name,
                        module_name: resource.module_name,
                        version: resource.version,
                        path: resource.path,
                        parent_path: resource.parent_path,
                        company: resource.company,
                        properties: resource.properties,
                    },
                    tracked_files,
                },
            );
        }

        log::info!("Discovery produced {} cache entries", entries.len());
        Ok(entries.into_values().collect())
    }

    /// Resolve one raw record into complete metadata, or drop it.
    fn resolve(&self, record: RawResource) -> Option<ResolvedResource> {
        let Some(kind) = parse_kind(record.implemented_as.as_deref()) else {
            log::warn!(
                "Skipping resource '{}': unrecognized implementation '{}'",
                record.name,
                record.implemented_as.unwrap_or_default()
            );
            return None;
        };

        let path = record.path.unwrap_or_default();
        let parent_path = match record.parent_path {
            Some(parent) => parent,
            None => Path::new(&path)
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        };

        if path_matches(&parent_path, LEGACY_PATH_MARKER)
            && !self.runtime.supports_legacy_resources()
        {
            log::debug!(
                "Skipping resource '{}': requires the legacy host runtime",
                record.name
            );
            return None;
        }

        let mut company = record.company_name.unwrap_or_default();
        let mut version = record.version.unwrap_or_default();
        let module_name = match record.module_name {
            Some(module) if !module.is_empty() => module,
            _ if path_matches(&parent_path, BUILTIN_PATH_MARKER) => {
                company = BUILTIN_COMPANY.to_string();
                BUILTIN_MODULE_NAME.to_string()
            }
            _ => {
                // Layout is <ModuleRoot>/<Version>/DSCResources/<Name>, so
                // the module root sits three levels above the resource dir.
                let Some(module_dir) = Path::new(&parent_path).ancestors().nth(3) else {
                    log::warn!(
                        "Skipping resource '{}': cannot derive module from path '{parent_path}'",
                        record.name
                    );
                    return None;
                };
                let derived = module_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if version.is_empty() {
                    version = manifest_version(module_dir, &derived).unwrap_or_default();
                }
                derived
            }
        };

        Some(ResolvedResource {
            kind,
            name: record.name,
            module_name,
            version,
            path,
            parent_path,
            company,
            properties: record.properties,
        })
    }
}

/// Map the host's implementation label onto the closed kind set.
fn parse_kind(implemented_as: Option<&str>) -> Option<ResourceKind> {
    match implemented_as? {
        // "PowerShell" is the host's label for MOF-backed script resources
        "ScriptBased" | "PowerShell" => Some(ResourceKind::ScriptBased),
        "ClassBased" => Some(ResourceKind::ClassBased),
        "Binary" => Some(ResourceKind::Binary),
        "Composite" => Some(ResourceKind::Composite),
        _ => None,
    }
}

/// Case- and separator-insensitive path marker test.
fn path_matches(path: &str, marker: &str) -> bool {
    path.to_lowercase().replace('\\', "/").contains(marker)
}

/// Read the declared version out of a module manifest, if one exists at the
/// module root.
fn manifest_version(module_dir: &Path, module_name: &str) -> Option<String> {
    let manifest = module_dir.join(format!("{module_name}.psd1"));
    let content = std::fs::read_to_string(manifest).ok()?;
    for line in content.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("ModuleVersion") {
            let value = rest.trim_start_matches(['=', ' ', '\t']);
            let value = value.trim_matches(['\'', '"']);
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// When multiple versions of the same module are installed, keep only the
/// resources of the highest one. Ordering is explicit version comparison,
/// not enumeration order.
fn keep_highest_module_versions(resources: Vec<ResolvedResource>) -> Vec<ResolvedResource> {
    let mut highest: BTreeMap<String, Version> = BTreeMap::new();
    for resource in &resources {
        let module = resource.module_name.to_lowercase();
        let version = parse_version(&resource.version);
        match highest.get(&module) {
            Some(known) if *known >= version => {}
            _ => {
                highest.insert(module, version);
            }
        }
    }

    resources
        .into_iter()
        .filter(|resource| {
            let module = resource.module_name.to_lowercase();
            let keep = highest
                .get(&module)
                .is_some_and(|max| parse_version(&resource.version) == *max);
            if !keep {
                log::debug!(
                    "Dropping {}/{} v{}: newer module version installed",
                    resource.module_name,
                    resource.name,
                    resource.version
                );
            }
            keep
        })
        .collect()
}

/// Parse a module version leniently: two-part and four-part versions are
/// common in module manifests, so pad or truncate to semver's three.
fn parse_version(version: &str) -> Version {
    if let Ok(parsed) = Version::parse(version) {
        return parsed;
    }

    let mut parts = version.split('.').map(|p| p.parse::<u64>().unwrap_or(0));
    Version::new(
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

/// Recursively collect the staleness witness set: every allowlisted file
/// under the resource's owning directory, with its mtime in whole seconds.
fn track_files(resource: &ResolvedResource) -> BTreeMap<String, i64> {
    let root = if resource.parent_path.is_empty() {
        PathBuf::from(&resource.path)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    } else {
        PathBuf::from(&resource.parent_path)
    };

    let mut tracked = BTreeMap::new();
    for entry in WalkDir::new(&root).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let has_tracked_extension = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| TRACKED_EXTENSIONS.contains(&e.to_lowercase().as_str()));
        if !has_tracked_extension {
            continue;
        }
        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                tracked.insert(
                    entry.path().display().to_string(),
                    DateTime::<Utc>::from(modified).timestamp(),
                );
            }
        }
    }
    tracked
}

// ============================================================================
// Tests
// ============================================================================
