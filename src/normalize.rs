//! Provider result normalization
//!
//! Providers report state in two shapes: a flat key/value map, or a rich
//! instance object that drags provider-internal metadata fields along. Both
//! collapse into one canonical property bag here, regardless of which
//! dispatch branch produced them.

use serde_json::{Map, Value};

use crate::error::DscBridgeError;

/// Instance-object fields that never belong in a result's properties.
pub const METADATA_FIELD_DENYLIST: [&str; 4] = [
    "CimClass",
    "CimInstanceProperties",
    "CimSystemProperties",
    "PSComputerName",
];

/// Raw provider result, tagged by shape at the provider boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutput {
    /// Flat key/value state map, used as-is.
    Properties(Map<String, Value>),
    /// Rich instance object carrying provider-internal metadata.
    Instance(Map<String, Value>),
}

impl ProviderOutput {
    /// Classify a raw JSON value from a provider. An object carrying any
    /// denylisted metadata field is instance-shaped; any other object is a
    /// plain property map. Non-objects are provider bugs.
    pub fn from_value(value: Value) -> Result<Self, DscBridgeError> {
        let Value::Object(map) = value else {
            return Err(DscBridgeError::Provider(format!(
                "Provider returned a non-object result: {value}"
            )));
        };

        let is_instance = map
            .keys()
            .any(|key| METADATA_FIELD_DENYLIST.contains(&key.as_str()));
        if is_instance {
            Ok(Self::Instance(map))
        } else {
            Ok(Self::Properties(map))
        }
    }
}

/// Collapse a raw provider result into the canonical property bag.
pub fn normalize(raw: ProviderOutput) -> Map<String, Value> {
    match raw {
        ProviderOutput::Properties(map) => map,
        ProviderOutput::Instance(map) => map
            .into_iter()
            .filter(|(key, _)| !METADATA_FIELD_DENYLIST.contains(&key.as_str()))
            .collect(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn flat_map_passes_through_unchanged() {
        let raw = ProviderOutput::from_value(json!({"Name": "x", "Ensure": "Present"})).unwrap();
        assert!(matches!(raw, ProviderOutput::Properties(_)));

        let normalized = normalize(raw);
        assert_eq!(normalized, as_map(json!({"Name": "x", "Ensure": "Present"})));
    }

    #[test]
    fn instance_object_is_stripped_of_metadata_fields() {
        let raw = ProviderOutput::from_value(json!({
            "Name": "x",
            "CimClass": {"ClassName": "Demo"},
            "CimInstanceProperties": [],
            "CimSystemProperties": {},
            "PSComputerName": "localhost"
        }))
        .unwrap();
        assert!(matches!(raw, ProviderOutput::Instance(_)));

        let normalized = normalize(raw);
        assert_eq!(normalized, as_map(json!({"Name": "x"})));
    }

    #[test]
    fn non_object_result_is_a_provider_error() {
        let err = ProviderOutput::from_value(json!("just a string")).unwrap_err();
        assert!(matches!(err, DscBridgeError::Provider(_)));
    }

    #[test]
    fn empty_object_is_a_valid_property_map() {
        let raw = ProviderOutput::from_value(json!({})).unwrap();
        assert!(normalize(raw).is_empty());
    }
}
