//! Operator and instance definitions - the document model.
//!
//! A composite operator is described by a JSON or YAML document that
//! declares its main port types, optional delegates and properties, the
//! child instances it is composed of, and the connections wiring their
//! ports together.

use crate::error::{Result, SlangError};
use crate::port::PortDef;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};

/// A named side-channel with its own in/out port pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegateDef {
    /// Descriptor of the delegate's in-port.
    #[serde(rename = "in")]
    pub input: PortDef,

    /// Descriptor of the delegate's out-port.
    #[serde(rename = "out")]
    pub output: PortDef,
}

impl DelegateDef {
    /// Create a new delegate definition.
    pub fn new(input: PortDef, output: PortDef) -> Self {
        Self { input, output }
    }

    /// Replace bound generic identifiers in both port descriptors.
    pub fn specialize(&self, generics: &BTreeMap<String, PortDef>) -> Self {
        Self {
            input: self.input.specialize(generics),
            output: self.output.specialize(generics),
        }
    }

    fn validate(&self) -> Result<()> {
        self.input.validate()?;
        self.output.validate()
    }

    fn generics_specified(&self) -> Result<()> {
        self.input.generics_specified()?;
        self.output.generics_specified()
    }
}

/// A use-site of an operator inside a parent definition.
///
/// # Example
///
/// ```yaml
/// operators:
///   - name: duplicate
///     operator: slang.fork
///     generics:
///       T:
///         type: number
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDef {
    /// Instance name, unique within the parent.
    pub name: String,

    /// Qualified operator name (builtin, relative or search-path).
    pub operator: String,

    /// Property values handed to the operator at instantiation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, JsonValue>,

    /// Generic bindings applied to the operator's template.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub generics: BTreeMap<String, PortDef>,

    /// The resolved operator definition, attached by the loader.
    #[serde(skip)]
    operator_def: Option<Box<OperatorDef>>,
}

impl InstanceDef {
    /// Create a new instance definition.
    pub fn new(name: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            operator: operator.into(),
            properties: BTreeMap::new(),
            generics: BTreeMap::new(),
            operator_def: None,
        }
    }

    /// Bind a generic identifier.
    pub fn with_generic(mut self, identifier: impl Into<String>, def: PortDef) -> Self {
        self.generics.insert(identifier.into(), def);
        self
    }

    /// Set a property value.
    pub fn with_property(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Attach the resolved operator definition.
    ///
    /// The loader calls this once the reference has been resolved; the
    /// builder reads it back when materializing the child.
    pub fn set_operator_def(&mut self, def: OperatorDef) {
        self.operator_def = Some(Box::new(def));
    }

    /// The resolved operator definition, if the loader attached one.
    pub fn operator_def(&self) -> Option<&OperatorDef> {
        self.operator_def.as_deref()
    }

    /// Validate the instance-level invariants.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.operator.is_empty() {
            return Err(SlangError::EmptyName);
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(SlangError::WhitespaceInName(self.name.clone()));
        }
        if self.operator.chars().any(char::is_whitespace) {
            return Err(SlangError::WhitespaceInName(self.operator.clone()));
        }
        for def in self.generics.values() {
            def.validate()?;
        }
        Ok(())
    }
}

/// A composite operator template.
///
/// # Example
///
/// ```yaml
/// in:
///   type: number
/// out:
///   type: map
///   map:
///     a:
///       type: number
///     b:
///       type: number
/// operators:
///   - name: duplicate
///     operator: slang.fork
///     generics:
///       T:
///         type: number
/// connections:
///   "->/": ["->/duplicate"]
///   "duplicate/->a": ["/->a"]
///   "duplicate/->b": ["/->b"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorDef {
    /// Descriptor of the main in-port.
    #[serde(rename = "in")]
    pub input: PortDef,

    /// Descriptor of the main out-port.
    #[serde(rename = "out")]
    pub output: PortDef,

    /// Named side channels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub delegates: BTreeMap<String, DelegateDef>,

    /// Property schema, validated against supplied values at instantiation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PortDef>,

    /// Child instances.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operators: Vec<InstanceDef>,

    /// Directed edges, source reference to destination references.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub connections: BTreeMap<String, Vec<String>>,
}

impl OperatorDef {
    /// Create a new definition with the given main port descriptors.
    pub fn new(input: PortDef, output: PortDef) -> Self {
        Self {
            input,
            output,
            delegates: BTreeMap::new(),
            properties: BTreeMap::new(),
            operators: Vec::new(),
            connections: BTreeMap::new(),
        }
    }

    /// Add a delegate.
    pub fn with_delegate(mut self, name: impl Into<String>, delegate: DelegateDef) -> Self {
        self.delegates.insert(name.into(), delegate);
        self
    }

    /// Declare a property.
    pub fn with_property(mut self, name: impl Into<String>, def: PortDef) -> Self {
        self.properties.insert(name.into(), def);
        self
    }

    /// Add a child instance.
    pub fn with_instance(mut self, instance: InstanceDef) -> Self {
        self.operators.push(instance);
        self
    }

    /// Add a connection edge.
    pub fn with_connection(
        mut self,
        source: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        self.connections
            .entry(source.into())
            .or_default()
            .push(destination.into());
        self
    }

    /// Parse a definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| SlangError::DefinitionParse(e.to_string()))
    }

    /// Parse a definition from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SlangError::DefinitionParse(e.to_string()))
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| SlangError::DefinitionParse(e.to_string()))
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SlangError::DefinitionParse(e.to_string()))
    }

    /// Validate the definition invariants.
    ///
    /// The main descriptors, delegates and property schema must validate;
    /// every child instance must validate; child names must be unique.
    pub fn validate(&self) -> Result<()> {
        self.input.validate()?;
        self.output.validate()?;

        for (name, delegate) in &self.delegates {
            if name.is_empty() {
                return Err(SlangError::EmptyName);
            }
            delegate.validate()?;
        }

        for def in self.properties.values() {
            def.validate()?;
        }

        let mut used_names = HashSet::new();
        for instance in &self.operators {
            instance.validate()?;
            if !used_names.insert(instance.name.as_str()) {
                return Err(SlangError::DuplicateChildName(instance.name.clone()));
            }
        }

        Ok(())
    }

    /// Replace bound generic identifiers in the main ports, the delegate
    /// ports and the property schema.
    pub fn specialize(&self, generics: &BTreeMap<String, PortDef>) -> Self {
        let mut specialized = self.clone();
        specialized.input = self.input.specialize(generics);
        specialized.output = self.output.specialize(generics);
        specialized.delegates = self
            .delegates
            .iter()
            .map(|(name, delegate)| (name.clone(), delegate.specialize(generics)))
            .collect();
        specialized.properties = self
            .properties
            .iter()
            .map(|(name, def)| (name.clone(), def.specialize(generics)))
            .collect();
        specialized
    }

    /// Assert that no generic placeholder remains in the main ports, the
    /// delegate ports or the property schema.
    pub fn generics_specified(&self) -> Result<()> {
        self.input.generics_specified()?;
        self.output.generics_specified()?;
        for delegate in self.delegates.values() {
            delegate.generics_specified()?;
        }
        for def in self.properties.values() {
            def.generics_specified()?;
        }
        Ok(())
    }

    /// Get a child instance by name.
    pub fn instance(&self, name: &str) -> Option<&InstanceDef> {
        self.operators.iter().find(|i| i.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_complete_definition() {
        let yaml = r#"
in:
  type: number
out:
  type: map
  map:
    a:
      type: number
    b:
      type: number
operators:
  - name: duplicate
    operator: slang.fork
    generics:
      T:
        type: number
connections:
  "->/": ["->/duplicate"]
  "duplicate/->a": ["/->a"]
  "duplicate/->b": ["/->b"]
"#;
        let def = OperatorDef::from_yaml(yaml).unwrap();
        def.validate().unwrap();

        assert_eq!(def.input, PortDef::Number);
        assert_eq!(def.operators.len(), 1);
        assert_eq!(def.operators[0].operator, "slang.fork");
        assert_eq!(
            def.operators[0].generics.get("T"),
            Some(&PortDef::Number)
        );
        assert_eq!(def.connections.len(), 3);
    }

    #[test]
    fn parse_minimal_definition() {
        let def = OperatorDef::from_json(r#"{"in":{"type":"number"},"out":{"type":"number"}}"#)
            .unwrap();
        def.validate().unwrap();
        assert!(def.operators.is_empty());
        assert!(def.connections.is_empty());
        assert!(def.delegates.is_empty());
    }

    #[test]
    fn parse_delegates() {
        let yaml = r#"
in:
  type: number
out:
  type: string
delegates:
  handler:
    in:
      type: string
    out:
      type: number
"#;
        let def = OperatorDef::from_yaml(yaml).unwrap();
        def.validate().unwrap();

        let handler = def.delegates.get("handler").unwrap();
        assert_eq!(handler.input, PortDef::String);
        assert_eq!(handler.output, PortDef::Number);
    }

    #[test]
    fn duplicate_child_names_rejected() {
        let def = OperatorDef::new(PortDef::Number, PortDef::Number)
            .with_instance(InstanceDef::new("x", "slang.fork"))
            .with_instance(InstanceDef::new("x", "slang.take"));
        assert!(matches!(
            def.validate(),
            Err(SlangError::DuplicateChildName(name)) if name == "x"
        ));
    }

    #[test]
    fn whitespace_in_names_rejected() {
        let instance = InstanceDef::new("my op", "slang.fork");
        assert!(matches!(
            instance.validate(),
            Err(SlangError::WhitespaceInName(_))
        ));

        let instance = InstanceDef::new("op", "slang. fork");
        assert!(matches!(
            instance.validate(),
            Err(SlangError::WhitespaceInName(_))
        ));
    }

    #[test]
    fn empty_names_rejected() {
        assert!(matches!(
            InstanceDef::new("", "slang.fork").validate(),
            Err(SlangError::EmptyName)
        ));
        assert!(matches!(
            InstanceDef::new("op", "").validate(),
            Err(SlangError::EmptyName)
        ));
    }

    #[test]
    fn specialize_reaches_delegates() {
        let def = OperatorDef::new(PortDef::generic("T"), PortDef::generic("T")).with_delegate(
            "iteration",
            DelegateDef::new(PortDef::generic("T"), PortDef::generic("T")),
        );
        assert!(def.generics_specified().is_err());

        let generics = [("T".to_string(), PortDef::Boolean)].into_iter().collect();
        let specialized = def.specialize(&generics);
        specialized.generics_specified().unwrap();
        assert_eq!(specialized.input, PortDef::Boolean);
        assert_eq!(
            specialized.delegates.get("iteration").unwrap().output,
            PortDef::Boolean
        );
    }

    #[test]
    fn roundtrip_preserves_structure() {
        let def = OperatorDef::new(
            PortDef::stream(PortDef::map([("k", PortDef::Number)])),
            PortDef::Binary,
        )
        .with_property("limit", PortDef::Number)
        .with_instance(
            InstanceDef::new("child", ".util.helper")
                .with_generic("T", PortDef::String)
                .with_property("value", serde_json::json!(42)),
        )
        .with_connection("->/", "->/child")
        .with_connection("child/->", "/->");

        let yaml = def.to_yaml().unwrap();
        let reparsed = OperatorDef::from_yaml(&yaml).unwrap();

        assert_eq!(reparsed.input, def.input);
        assert_eq!(reparsed.output, def.output);
        assert_eq!(reparsed.properties, def.properties);
        assert_eq!(reparsed.operators.len(), 1);
        assert_eq!(reparsed.operators[0].generics, def.operators[0].generics);
        assert_eq!(reparsed.connections, def.connections);

        let json = def.to_json().unwrap();
        let reparsed = OperatorDef::from_json(&json).unwrap();
        assert_eq!(reparsed.connections, def.connections);
    }

    #[test]
    fn resolved_def_attachment() {
        let mut instance = InstanceDef::new("child", ".helper");
        assert!(instance.operator_def().is_none());

        instance.set_operator_def(OperatorDef::new(PortDef::Number, PortDef::Number));
        assert_eq!(instance.operator_def().unwrap().input, PortDef::Number);
    }
}
