//! Graph builder.
//!
//! Materializes a resolved operator definition into a runnable operator
//! tree: children are created top-down (builtins through the registry,
//! composites recursively), then connections are wired bottom-up so that
//! every child's interior is complete before its boundary ports gain
//! destinations.

use crate::loader::Resolver;
use crate::operator::Operator;
use crate::reference::resolve_reference;
use crate::registry::BuiltinRegistry;
use slang_core::{OperatorDef, Result, SlangError, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Builds operator trees from definitions.
pub struct Builder {
    registry: Arc<BuiltinRegistry>,
}

impl Builder {
    /// Create a builder backed by a builtin registry.
    pub fn new(registry: Arc<BuiltinRegistry>) -> Self {
        Self { registry }
    }

    /// Build a runnable operator from a loaded definition.
    ///
    /// Fails if the definition is invalid, a connection reference does not
    /// resolve, endpoint descriptors differ, or a reference addresses a
    /// port with the wrong direction for its role. On failure the
    /// partially constructed tree is discarded.
    pub fn build(&self, name: &str, def: &OperatorDef) -> Result<Arc<Operator>> {
        self.build_operator(name, def, BTreeMap::new())
    }

    /// Load a definition from disk and build it in one step.
    pub fn build_file(&self, resolver: &Resolver, path: &Path) -> Result<Arc<Operator>> {
        let def = resolver.load(path)?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("main");
        self.build(name, &def)
    }

    fn build_operator(
        &self,
        name: &str,
        def: &OperatorDef,
        properties: BTreeMap<String, Value>,
    ) -> Result<Arc<Operator>> {
        def.validate()?;
        let operator = Operator::new(name, def, properties, None)?;

        for instance in &def.operators {
            let child = if self.registry.is_registered(&instance.operator) {
                self.registry.instantiate(instance)?
            } else {
                let child_def = instance
                    .operator_def()
                    .ok_or_else(|| SlangError::NotFound(instance.operator.clone()))?;
                let child_properties = instance
                    .properties
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value.clone())))
                    .collect();
                self.build_operator(&instance.name, child_def, child_properties)?
            };
            operator.add_child(child);
        }

        for (source_ref, destination_refs) in &def.connections {
            let source = resolve_reference(source_ref, &operator)?;
            if !source.readable {
                return Err(SlangError::WrongDirection(source_ref.clone()));
            }
            for destination_ref in destination_refs {
                let destination = resolve_reference(destination_ref, &operator)?;
                if destination.readable {
                    return Err(SlangError::WrongDirection(destination_ref.clone()));
                }
                source.port.connect(&destination.port)?;
                if let Some(builtin) = destination.operator.builtin() {
                    builtin.on_connect(&destination.operator, &destination.port)?;
                }
            }
        }

        tracing::debug!(operator = %name, children = def.operators.len(), "operator built");
        Ok(operator)
    }
}
