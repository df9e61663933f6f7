//! PowerShell-backed provider host
//!
//! Default implementation of the host capability: every call shells out to
//! `pwsh` with a generated script and parses the JSON it prints. Calls are
//! blocking with no timeout; a hung provider hangs the whole invocation.

use serde_json::{Map, Value};
use std::process::Command;

use super::{ClassProvider, Method, ProviderHost, ProviderRegistry, RawResource};
use crate::error::DscBridgeError;
use crate::normalize::ProviderOutput;

const ENUMERATE_SELECTION: &str = "Select-Object -Property Name, ModuleName, \
     @{n='Version';e={$_.Version.ToString()}}, Path, ParentPath, \
     @{n='ImplementedAs';e={$_.ImplementedAs.ToString()}}, CompanyName, \
     @{n='Properties';e={@($_.Properties.Name)}}";

pub struct PwshHost {
    executable: String,
}

impl Default for PwshHost {
    fn default() -> Self {
        Self::new("pwsh")
    }
}

impl PwshHost {
    pub fn new(executable: &str) -> Self {
        Self {
            executable: executable.to_string(),
        }
    }

    /// Run a script and return its stdout. A nonzero exit relays the
    /// provider's stderr verbatim.
    fn run_script(&self, script: &str) -> Result<String, DscBridgeError> {
        log::trace!("Invoking {} with script: {script}", self.executable);

        let output = Command::new(&self.executable)
            .args(["-NoLogo", "-NoProfile", "-NonInteractive", "-Command", script])
            .output()
            .map_err(|e| {
                DscBridgeError::Provider(format!("Failed to start {}: {e}", self.executable))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DscBridgeError::Provider(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn parse_output(stdout: &str) -> Result<Value, DscBridgeError> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(trimmed)
            .map_err(|e| DscBridgeError::Provider(format!("Unparseable provider output: {e}")))
    }

    fn properties_preamble(properties: &Map<String, Value>) -> Result<String, DscBridgeError> {
        let json = serde_json::to_string(&Value::Object(properties.clone()))?;
        Ok(format!(
            "$ErrorActionPreference = 'Stop'\n\
             $properties = '{}' | ConvertFrom-Json -AsHashtable\n",
            quote_single(&json)
        ))
    }
}

/// Escape a string for inclusion in single quotes in a generated script.
fn quote_single(value: &str) -> String {
    value.replace('\'', "''")
}

impl ProviderHost for PwshHost {
    fn enumerate(&self, modules: &[String]) -> Result<Vec<RawResource>, DscBridgeError> {
        let filter = if modules.is_empty() {
            String::new()
        } else {
            let list = modules
                .iter()
                .map(|m| format!("'{}'", quote_single(m)))
                .collect::<Vec<_>>()
                .join(", ");
            format!(" -Module @({list})")
        };

        let script = format!(
            "$ErrorActionPreference = 'Stop'\n\
             $resources = Get-DscResource{filter} | {ENUMERATE_SELECTION}\n\
             ConvertTo-Json -InputObject @($resources) -Depth 5 -Compress"
        );

        let stdout = self.run_script(&script)?;
        let value = Self::parse_output(&stdout)?;
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| {
                    serde_json::from_value(item).map_err(|e| {
                        DscBridgeError::Provider(format!("Invalid resource record: {e}"))
                    })
                })
                .collect(),
            Value::Object(map) if map.is_empty() => Ok(Vec::new()),
            other => Err(DscBridgeError::Provider(format!(
                "Enumeration returned unexpected output: {other}"
            ))),
        }
    }

    fn invoke(
        &self,
        method: Method,
        resource_name: &str,
        module_name: &str,
        properties: &Map<String, Value>,
    ) -> Result<ProviderOutput, DscBridgeError> {
        let script = format!(
            "{preamble}\
             $result = Invoke-DscResource -Name '{name}' -ModuleName '{module}' \
             -Method {method} -Property $properties\n\
             ConvertTo-Json -InputObject $result -Depth 10 -Compress",
            preamble = Self::properties_preamble(properties)?,
            name = quote_single(resource_name),
            module = quote_single(module_name),
        );

        let stdout = self.run_script(&script)?;
        ProviderOutput::from_value(Self::parse_output(&stdout)?)
    }
}

// ============================================================================
// Class-based loading
// ============================================================================

/// A class-based resource loaded through the PowerShell host. Each call
/// constructs the instance, assigns the requested properties, and invokes
/// the method matching the operation.
pub struct PwshClassProvider<'a> {
    host: &'a PwshHost,
    module_name: String,
    resource_name: String,
}

impl PwshClassProvider<'_> {
    fn run_method(
        &self,
        method: Method,
        properties: &Map<String, Value>,
    ) -> Result<Value, DscBridgeError> {
        let script = format!(
            "{preamble}\
             Import-Module '{module}' -Force\n\
             $instance = New-Object -TypeName '{name}'\n\
             foreach ($key in $properties.Keys) {{ $instance.$key = $properties[$key] }}\n\
             $result = $instance.{method}()\n\
             ConvertTo-Json -InputObject $result -Depth 10 -Compress",
            preamble = PwshHost::properties_preamble(properties)?,
            module = quote_single(&self.module_name),
            name = quote_single(&self.resource_name),
        );

        let stdout = self.host.run_script(&script)?;
        PwshHost::parse_output(&stdout)
    }
}

impl ClassProvider for PwshClassProvider<'_> {
    fn get(&self, properties: &Map<String, Value>) -> Result<ProviderOutput, DscBridgeError> {
        ProviderOutput::from_value(self.run_method(Method::Get, properties)?)
    }

    fn set(&self, properties: &Map<String, Value>) -> Result<ProviderOutput, DscBridgeError> {
        ProviderOutput::from_value(self.run_method(Method::Set, properties)?)
    }

    fn test(&self, properties: &Map<String, Value>) -> Result<bool, DscBridgeError> {
        match self.run_method(Method::Test, properties)? {
            Value::Bool(in_desired_state) => Ok(in_desired_state),
            Value::Object(map) => map
                .get("InDesiredState")
                .and_then(Value::as_bool)
                .ok_or_else(|| {
                    DscBridgeError::Provider("Test result carries no boolean state".to_string())
                }),
            other => Err(DscBridgeError::Provider(format!(
                "Test returned a non-boolean result: {other}"
            ))),
        }
    }

    fn export(&self) -> Result<Vec<ProviderOutput>, DscBridgeError> {
        let script = format!(
            "$ErrorActionPreference = 'Stop'\n\
             Import-Module '{module}' -Force\n\
             $instance = New-Object -TypeName '{name}'\n\
             $results = @($instance.Export())\n\
             ConvertTo-Json -InputObject $results -Depth 10 -Compress",
            module = quote_single(&self.module_name),
            name = quote_single(&self.resource_name),
        );

        let stdout = self.host.run_script(&script)?;
        match PwshHost::parse_output(&stdout)? {
            Value::Array(items) => items.into_iter().map(ProviderOutput::from_value).collect(),
            other => Err(DscBridgeError::Provider(format!(
                "Export returned a non-list result: {other}"
            ))),
        }
    }
}

impl ProviderRegistry for PwshHost {
    fn load(
        &self,
        module_name: &str,
        resource_name: &str,
    ) -> Result<Box<dyn ClassProvider + '_>, DscBridgeError> {
        if module_name.is_empty() || resource_name.is_empty() {
            return Err(DscBridgeError::Provider(
                "Class-based resource is missing a module or type name".to_string(),
            ));
        }
        Ok(Box::new(PwshClassProvider {
            host: self,
            module_name: module_name.to_string(),
            resource_name: resource_name.to_string(),
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_single_doubles_quotes() {
        assert_eq!(quote_single("it's"), "it''s");
        assert_eq!(quote_single("plain"), "plain");
    }

    #[test]
    fn parse_output_of_empty_stdout_is_empty_object() {
        let value = PwshHost::parse_output("  \n").unwrap();
        assert_eq!(value, Value::Object(Map::new()));
    }

    #[test]
    fn parse_output_rejects_garbage() {
        assert!(PwshHost::parse_output("not json {").is_err());
    }

    #[test]
    fn registry_rejects_empty_keys() {
        let host = PwshHost::default();
        assert!(host.load("", "Thing").is_err());
        assert!(host.load("Demo", "").is_err());
    }
}
