//! External resource-execution capability
//!
//! The adapter never runs resource logic itself. Everything goes through two
//! seams: [`ProviderHost`] for enumeration and script/binary delegation, and
//! [`ProviderRegistry`] for class-based resources, which loads a
//! [`ClassProvider`] keyed by (module, name). Both are synchronous, blocking,
//! and may fail with arbitrary provider-defined errors.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::error::DscBridgeError;
use crate::normalize::ProviderOutput;

pub mod pwsh;

pub use pwsh::PwshHost;

/// The four resource operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Set,
    Test,
    Export,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "Get",
            Self::Set => "Set",
            Self::Test => "Test",
            Self::Export => "Export",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resource record as reported by the host's enumeration, before any
/// dedupe or metadata backfill.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawResource {
    pub name: String,
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub parent_path: Option<String>,
    #[serde(default)]
    pub implemented_as: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub properties: Vec<String>,
}

/// Host capability for enumeration and direct invocation of script-style and
/// binary resources.
pub trait ProviderHost {
    /// Enumerate installed resources, optionally restricted to the given
    /// modules (empty slice means everything that provides resources).
    fn enumerate(&self, modules: &[String]) -> Result<Vec<RawResource>, DscBridgeError>;

    /// Invoke one method of a resource by name and owning module.
    fn invoke(
        &self,
        method: Method,
        resource_name: &str,
        module_name: &str,
        properties: &Map<String, Value>,
    ) -> Result<ProviderOutput, DscBridgeError>;
}

/// A loaded class-based resource instance.
pub trait ClassProvider {
    fn get(&self, properties: &Map<String, Value>) -> Result<ProviderOutput, DscBridgeError>;
    fn set(&self, properties: &Map<String, Value>) -> Result<ProviderOutput, DscBridgeError>;
    fn test(&self, properties: &Map<String, Value>) -> Result<bool, DscBridgeError>;
    fn export(&self) -> Result<Vec<ProviderOutput>, DscBridgeError>;
}

/// Explicit loader for class-based providers. Population is always an
/// explicit load call keyed by (module, name); there is no implicit runtime
/// discovery behind this trait.
pub trait ProviderRegistry {
    fn load(
        &self,
        module_name: &str,
        resource_name: &str,
    ) -> Result<Box<dyn ClassProvider + '_>, DscBridgeError>;
}
