//! Invocation dispatch
//!
//! Routes one normalized request against the resolved cache to the execution
//! strategy matching the entry's implementation kind, and normalizes the
//! provider's answer into the response envelope. Every failure here is fatal
//! to the whole invocation; retry policy belongs to the engine driving the
//! adapter, not to this component.

use serde_json::{Map, Value};

use crate::cache::{CacheDocument, CacheEntry, ResourceKind};
use crate::error::DscBridgeError;
use crate::host::{Method, ProviderHost, ProviderRegistry};
use crate::normalize::{normalize, ProviderOutput};
use crate::runtime::RuntimeInfo;
use crate::schema::{ResourceRequest, ResourceResult};

/// The only resource names the binary strategy will execute.
pub const BINARY_RESOURCE_ALLOWLIST: [&str; 3] = ["File", "Log", "SignatureValidation"];

/// Result of one dispatched request: Export fans out, everything else is a
/// single envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutput {
    Single(ResourceResult),
    Many(Vec<ResourceResult>),
}

pub struct Dispatcher<'a> {
    host: &'a dyn ProviderHost,
    registry: &'a dyn ProviderRegistry,
    runtime: RuntimeInfo,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        host: &'a dyn ProviderHost,
        registry: &'a dyn ProviderRegistry,
        runtime: RuntimeInfo,
    ) -> Self {
        Self {
            host,
            registry,
            runtime,
        }
    }

    /// Dispatch one request against the cache.
    pub fn invoke(
        &self,
        method: Method,
        request: &ResourceRequest,
        cache: &CacheDocument,
    ) -> Result<InvokeOutput, DscBridgeError> {
        let Some(entry) = cache.find_entry(&request.resource_type) else {
            return Err(DscBridgeError::ResourceNotFound(
                request.resource_type.clone(),
            ));
        };

        log::debug!(
            "Dispatching {method} for {} ({})",
            entry.type_key,
            entry.info.kind
        );

        match entry.info.kind {
            ResourceKind::ScriptBased => self.invoke_script(method, request, entry),
            ResourceKind::Binary => self.invoke_binary(method, request, entry),
            ResourceKind::ClassBased => self.invoke_class(method, request, entry),
            ResourceKind::Composite => Err(DscBridgeError::UnrecognizedKind(format!(
                "No implementation for composite resource '{}'; composites are expanded by the engine",
                entry.type_key
            ))),
        }
    }

    fn invoke_script(
        &self,
        method: Method,
        request: &ResourceRequest,
        entry: &CacheEntry,
    ) -> Result<InvokeOutput, DscBridgeError> {
        if !self.runtime.is_windows() {
            return Err(DscBridgeError::UnsupportedPlatform(format!(
                "Script-based resource '{}' is only supported on Windows",
                entry.type_key
            )));
        }

        let mut properties = request.properties.clone();
        if method == Method::Get {
            prune_unknown_properties(&mut properties, &entry.info.properties, &entry.type_key);
        }

        let raw = self.delegate(method, entry, &properties)?;
        Ok(InvokeOutput::Single(ResourceResult::new(
            request,
            normalize(raw),
        )))
    }

    fn invoke_binary(
        &self,
        method: Method,
        request: &ResourceRequest,
        entry: &CacheEntry,
    ) -> Result<InvokeOutput, DscBridgeError> {
        if !self.runtime.supports_legacy_resources() {
            return Err(DscBridgeError::UnsupportedPlatform(format!(
                "Binary resource '{}' requires the legacy Windows host",
                entry.type_key
            )));
        }

        let allowed = BINARY_RESOURCE_ALLOWLIST
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&entry.info.name));
        if !allowed {
            return Err(DscBridgeError::UnsupportedPlatform(format!(
                "Binary resource '{}' is not supported",
                entry.type_key
            )));
        }

        let raw = self.delegate(method, entry, &request.properties)?;
        Ok(InvokeOutput::Single(ResourceResult::new(
            request,
            normalize(raw),
        )))
    }

    fn invoke_class(
        &self,
        method: Method,
        request: &ResourceRequest,
        entry: &CacheEntry,
    ) -> Result<InvokeOutput, DscBridgeError> {
        let provider = self
            .registry
            .load(&entry.info.module_name, &entry.info.name)?;

        match method {
            Method::Get => {
                let raw = provider.get(&request.properties)?;
                Ok(InvokeOutput::Single(ResourceResult::new(
                    request,
                    normalize(raw),
                )))
            }
            Method::Set => {
                let raw = provider.set(&request.properties)?;
                Ok(InvokeOutput::Single(ResourceResult::new(
                    request,
                    normalize(raw),
                )))
            }
            Method::Test => {
                let in_desired_state = provider.test(&request.properties)?;
                let mut properties = Map::new();
                properties.insert("InDesiredState".to_string(), Value::Bool(in_desired_state));
                Ok(InvokeOutput::Single(ResourceResult::new(
                    request, properties,
                )))
            }
            Method::Export => {
                let results = provider
                    .export()?
                    .into_iter()
                    .enumerate()
                    .map(|(i, raw)| ResourceResult {
                        name: format!("{}-{i}", request.resource_type),
                        resource_type: request.resource_type.clone(),
                        properties: normalize(raw),
                    })
                    .collect();
                Ok(InvokeOutput::Many(results))
            }
        }
    }

    fn delegate(
        &self,
        method: Method,
        entry: &CacheEntry,
        properties: &Map<String, Value>,
    ) -> Result<ProviderOutput, DscBridgeError> {
        self.host
            .invoke(method, &entry.info.name, &entry.info.module_name, properties)
    }
}

/// Drop requested properties the resource's retrieval routine does not
/// declare. Some providers fail on extra parameters instead of ignoring
/// them, so the adapter filters before delegating a Get.
fn prune_unknown_properties(
    properties: &mut Map<String, Value>,
    declared: &[String],
    type_key: &str,
) {
    properties.retain(|key, _| {
        let known = declared.iter().any(|p| p.eq_ignore_ascii_case(key));
        if !known {
            log::debug!("Pruning property '{key}' not declared by {type_key}");
        }
        known
    });
}

// ============================================================================
// Tests
// ============================================================================
