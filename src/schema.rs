//! Wire envelopes exchanged with the configuration-management engine
//!
//! Two input shapes collapse into one request list: a configuration
//! document (selected by the metadata context marker) where every element
//! of `resources` becomes one request, and a bare single-resource object
//! whose type-indicator field is stripped and whose remaining fields
//! become the property bag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DscBridgeError;

/// Synthetic name assigned to bare single-resource requests.
pub const ADAPTER_NAME: &str = "dscbridge";

/// Field carrying the resource type in a bare single-resource request.
pub const TYPE_INDICATOR_FIELD: &str = "adapted_dsc_type";

/// Context marker value selecting configuration-document mode.
pub const CONFIGURATION_CONTEXT: &str = "configuration";

/// One desired-state request, normalized from either input shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// One actual-state result, mirroring the request envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceResult {
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub properties: Map<String, Value>,
}

impl ResourceResult {
    pub fn new(request: &ResourceRequest, properties: Map<String, Value>) -> Self {
        Self {
            name: request.name.clone(),
            resource_type: request.resource_type.clone(),
            properties,
        }
    }
}

/// Whether the input document carries the configuration context marker.
fn is_configuration_document(document: &Map<String, Value>) -> bool {
    document
        .get("metadata")
        .and_then(|m| m.get(ADAPTER_NAME))
        .and_then(|m| m.get("context"))
        .and_then(Value::as_str)
        == Some(CONFIGURATION_CONTEXT)
}

/// Parse engine input into a list of requests.
pub fn parse_requests(input: &str) -> Result<Vec<ResourceRequest>, DscBridgeError> {
    let value: Value = serde_json::from_str(input)?;
    let Value::Object(document) = value else {
        return Err(DscBridgeError::Input(
            "Expected a JSON object as input".to_string(),
        ));
    };

    if is_configuration_document(&document) {
        parse_configuration(&document)
    } else {
        Ok(vec![parse_bare_resource(document)?])
    }
}

fn parse_configuration(
    document: &Map<String, Value>,
) -> Result<Vec<ResourceRequest>, DscBridgeError> {
    let Some(Value::Array(resources)) = document.get("resources") else {
        return Err(DscBridgeError::Input(
            "Configuration document is missing a 'resources' array".to_string(),
        ));
    };

    resources
        .iter()
        .map(|resource| {
            serde_json::from_value::<ResourceRequest>(resource.clone()).map_err(|e| {
                DscBridgeError::Input(format!("Invalid resource in configuration: {e}"))
            })
        })
        .collect()
}

fn parse_bare_resource(
    mut document: Map<String, Value>,
) -> Result<ResourceRequest, DscBridgeError> {
    let Some(indicator) = document.remove(TYPE_INDICATOR_FIELD) else {
        return Err(DscBridgeError::Input(format!(
            "Input is missing the '{TYPE_INDICATOR_FIELD}' field"
        )));
    };
    let Value::String(resource_type) = indicator else {
        return Err(DscBridgeError::Input(format!(
            "'{TYPE_INDICATOR_FIELD}' must be a string"
        )));
    };

    Ok(ResourceRequest {
        name: ADAPTER_NAME.to_string(),
        resource_type,
        properties: document,
    })
}

// ============================================================================
// Tests
// ============================================================================
