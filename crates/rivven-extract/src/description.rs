//! Self-description exposed to the orchestrator for help and UI generation

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// One recognized configuration parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescription {
    /// Parameter key
    pub name: String,
    /// Whether the parameter may be omitted
    pub optional: bool,
    /// Human-readable purpose
    pub description: String,
}

impl ParameterDescription {
    /// A required parameter
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
            description: description.into(),
        }
    }

    /// An optional parameter
    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
            description: description.into(),
        }
    }
}

// Serialized as `{"<name>": {"optional": .., "description": ..}}`
impl Serialize for ParameterDescription {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            optional: bool,
            description: &'a str,
        }

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            &self.name,
            &Body {
                optional: self.optional,
                description: &self.description,
            },
        )?;
        map.end()
    }
}

/// Component description: parameters, output element type and config schema
#[derive(Debug, Clone, Serialize)]
pub struct ComponentDescription {
    /// Component name
    pub name: String,
    /// Recognized parameters, in declaration order
    pub parameters: Vec<ParameterDescription>,
    /// Declared output element type
    pub output: String,
    /// JSON schema of the configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<serde_json::Value>,
}

impl ComponentDescription {
    /// Create an empty description
    pub fn new(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            output: output.into(),
            config_schema: None,
        }
    }

    /// Add a parameter
    pub fn parameter(mut self, parameter: ParameterDescription) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set config schema from a type implementing JsonSchema
    pub fn config_schema_from<T: schemars::JsonSchema>(mut self) -> Self {
        let schema = schemars::schema_for!(T);
        self.config_schema = serde_json::to_value(schema).ok();
        self
    }

    /// Look up a parameter by name
    pub fn get(&self, name: &str) -> Option<&ParameterDescription> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Serialize to a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
