//! Get/Set/Test/Export against cached resources

use anyhow::Result;

use super::{ensure_cache, requested_modules};
use crate::cache::CacheStore;
use crate::dispatch::{Dispatcher, InvokeOutput};
use crate::host::{Method, ProviderHost, ProviderRegistry};
use crate::runtime::RuntimeInfo;
use crate::schema;

/// Parse, dispatch, and print one operation. All requests are dispatched
/// before anything is printed, so a fatal failure produces no partial
/// output.
pub fn run(
    method: Method,
    input: &str,
    store: &CacheStore,
    host: &dyn ProviderHost,
    registry: &dyn ProviderRegistry,
    runtime: RuntimeInfo,
) -> Result<()> {
    let outputs = execute(method, input, store, host, registry, runtime)?;
    for output in outputs {
        match output {
            InvokeOutput::Single(result) => println!("{}", serde_json::to_string(&result)?),
            InvokeOutput::Many(results) => println!("{}", serde_json::to_string(&results)?),
        }
    }
    Ok(())
}

/// Dispatch every request in the input envelope, in order. Each request is
/// invoked independently; the first fatal error aborts the batch.
pub fn execute(
    method: Method,
    input: &str,
    store: &CacheStore,
    host: &dyn ProviderHost,
    registry: &dyn ProviderRegistry,
    runtime: RuntimeInfo,
) -> Result<Vec<InvokeOutput>> {
    let requests = schema::parse_requests(input)?;
    log::debug!("Dispatching {method} for {} request(s)", requests.len());

    let modules = requested_modules(&requests);
    let cache = ensure_cache(store, host, runtime, &modules)?;

    let dispatcher = Dispatcher::new(host, registry, runtime);
    let mut outputs = Vec::with_capacity(requests.len());
    for request in &requests {
        outputs.push(dispatcher.invoke(method, request, &cache)?);
    }
    Ok(outputs)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::super::tests::CountingHost;
    use super::*;
    use crate::cache::CACHE_SCHEMA_VERSION;
    use crate::error::DscBridgeError;
    use crate::host::ClassProvider;
    use crate::normalize::ProviderOutput;
    use crate::runtime::{PlatformFamily, LEGACY_HOST_MAJOR};
    use serde_json::{json, Map, Value};

    struct EmptyRegistry;

    impl ProviderRegistry for EmptyRegistry {
        fn load(
            &self,
            module_name: &str,
            _resource_name: &str,
        ) -> Result<Box<dyn ClassProvider + '_>, DscBridgeError> {
            Err(DscBridgeError::Provider(format!(
                "no provider for module {module_name}"
            )))
        }
    }

    fn store_in(dir: &std::path::Path) -> CacheStore {
        CacheStore::new(dir.join("resource_cache.json"))
    }

    fn windows_legacy() -> RuntimeInfo {
        RuntimeInfo::new(PlatformFamily::Windows, LEGACY_HOST_MAJOR)
    }

    #[test]
    fn bare_get_discovers_once_and_returns_normalized_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let host = CountingHost::new();

        let input = json!({"adapted_dsc_type": "Demo/Thing", "Name": "x"}).to_string();
        let outputs = execute(
            Method::Get,
            &input,
            &store,
            &host,
            &EmptyRegistry,
            windows_legacy(),
        )
        .unwrap();

        assert_eq!(host.enumerations.get(), 1);

        // Cache was written at the current schema version
        let document = store.load().unwrap().unwrap();
        assert_eq!(document.schema_version, CACHE_SCHEMA_VERSION);

        assert_eq!(outputs.len(), 1);
        let InvokeOutput::Single(result) = &outputs[0] else {
            panic!("expected single envelope");
        };
        assert_eq!(result.resource_type, "Demo/Thing");
        assert_eq!(result.properties.get("Name"), Some(&json!("x")));
    }

    #[test]
    fn configuration_requests_are_invoked_independently() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let host = CountingHost::new();

        // The second resource carries a property the provider never
        // declared; Get pruning still lets both invocations proceed.
        let input = json!({
            "metadata": {"dscbridge": {"context": "configuration"}},
            "resources": [
                {"name": "first", "type": "Demo/Thing", "properties": {"Name": "a"}},
                {"name": "second", "type": "Demo/Thing", "properties": {"NoSuchProperty": 1}}
            ]
        })
        .to_string();

        let outputs = execute(
            Method::Get,
            &input,
            &store,
            &host,
            &EmptyRegistry,
            windows_legacy(),
        )
        .unwrap();
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn unknown_type_aborts_with_no_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let host = CountingHost::new();

        let input = json!({"adapted_dsc_type": "Nowhere/Nothing"}).to_string();
        let err = execute(
            Method::Get,
            &input,
            &store,
            &host,
            &EmptyRegistry,
            windows_legacy(),
        )
        .unwrap_err();

        let bridge_error = err.downcast_ref::<DscBridgeError>().unwrap();
        assert!(matches!(bridge_error, DscBridgeError::ResourceNotFound(_)));
    }

    #[test]
    fn malformed_input_never_reaches_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let host = CountingHost::new();

        let result = execute(
            Method::Get,
            "not json",
            &store,
            &host,
            &EmptyRegistry,
            windows_legacy(),
        );
        assert!(result.is_err());
        assert_eq!(host.enumerations.get(), 0);
    }

    struct FanOutRegistry;

    struct FanOutProvider;

    impl ClassProvider for FanOutProvider {
        fn get(&self, properties: &Map<String, Value>) -> Result<ProviderOutput, DscBridgeError> {
            Ok(ProviderOutput::Properties(properties.clone()))
        }

        fn set(&self, properties: &Map<String, Value>) -> Result<ProviderOutput, DscBridgeError> {
            Ok(ProviderOutput::Properties(properties.clone()))
        }

        fn test(&self, _properties: &Map<String, Value>) -> Result<bool, DscBridgeError> {
            Ok(true)
        }

        fn export(&self) -> Result<Vec<ProviderOutput>, DscBridgeError> {
            Ok(vec![ProviderOutput::Properties(Map::new())])
        }
    }

    impl ProviderRegistry for FanOutRegistry {
        fn load(
            &self,
            _module_name: &str,
            _resource_name: &str,
        ) -> Result<Box<dyn ClassProvider + '_>, DscBridgeError> {
            Ok(Box::new(FanOutProvider))
        }
    }

    struct ClassHost;

    impl ProviderHost for ClassHost {
        fn enumerate(
            &self,
            _modules: &[String],
        ) -> Result<Vec<crate::host::RawResource>, DscBridgeError> {
            Ok(vec![crate::host::RawResource {
                name: "Thing".to_string(),
                module_name: Some("Demo".to_string()),
                version: Some("1.0.0".to_string()),
                implemented_as: Some("ClassBased".to_string()),
                ..crate::host::RawResource::default()
            }])
        }

        fn invoke(
            &self,
            _method: Method,
            _resource_name: &str,
            _module_name: &str,
            _properties: &Map<String, Value>,
        ) -> Result<ProviderOutput, DscBridgeError> {
            unreachable!("class-based dispatch goes through the registry")
        }
    }

    #[test]
    fn export_produces_a_fanned_out_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let input = json!({"adapted_dsc_type": "Demo/Thing"}).to_string();
        let outputs = execute(
            Method::Export,
            &input,
            &store,
            &ClassHost,
            &FanOutRegistry,
            windows_legacy(),
        )
        .unwrap();

        assert_eq!(outputs.len(), 1);
        assert!(matches!(&outputs[0], InvokeOutput::Many(results) if results.len() == 1));
    }
}
