//! Builtin operator registry.
//!
//! Builtins are leaf operators implemented natively: each one carries a
//! shared, immutable definition template and a worker function. The
//! registry maps qualified names to builtins; instantiation clones and
//! specializes the template before any port is built, so templates are
//! never mutated by instances.

use crate::operator::Operator;
use crate::port::Port;
use slang_core::{InstanceDef, OperatorDef, Result, SlangError, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by a builtin's worker.
pub type BuiltinFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// A natively implemented leaf operator.
pub trait Builtin: Send + Sync {
    /// Qualified name, e.g. `slang.fork`.
    fn name(&self) -> &str;

    /// The shared definition template. May contain generics; instances
    /// specialize a clone.
    fn template(&self) -> &OperatorDef;

    /// Hook invoked by the builder when an edge is wired into one of the
    /// operator's ports.
    fn on_connect(&self, _operator: &Arc<Operator>, _destination: &Arc<Port>) -> Result<()> {
        Ok(())
    }

    /// The worker loop, scheduled by `Operator::start`.
    ///
    /// Returning `Cancelled` is the normal way to exit after `stop`; any
    /// other error poisons the operator's downstream edges.
    fn run(&self, operator: Arc<Operator>) -> BuiltinFuture;
}

/// Name to builtin lookup.
///
/// Populated once at startup and read-only thereafter.
#[derive(Default)]
pub struct BuiltinRegistry {
    builtins: HashMap<String, Arc<dyn Builtin>>,
}

impl BuiltinRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builtin under its qualified name.
    pub fn register(&mut self, builtin: Arc<dyn Builtin>) {
        self.builtins.insert(builtin.name().to_string(), builtin);
    }

    /// Whether a name is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Look up a builtin by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Builtin>> {
        self.builtins.get(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builtins.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// A specialized clone of a builtin's template for an instance site.
    ///
    /// The loader uses this to type-check connections against builtin
    /// children without materializing them.
    pub fn template_for(&self, instance: &InstanceDef) -> Result<OperatorDef> {
        let builtin = self
            .get(&instance.operator)
            .ok_or_else(|| SlangError::NotFound(instance.operator.clone()))?;
        Ok(builtin.template().specialize(&instance.generics))
    }

    /// Materialize a builtin operator for an instance definition.
    ///
    /// Clones the template, applies the instance's generic bindings,
    /// verifies saturation and validates properties against the template's
    /// property schema.
    pub fn instantiate(&self, instance: &InstanceDef) -> Result<Arc<Operator>> {
        instance.validate()?;
        let builtin = self
            .get(&instance.operator)
            .ok_or_else(|| SlangError::NotFound(instance.operator.clone()))?
            .clone();

        for bound in instance.generics.values() {
            bound.generics_specified()?;
        }

        let def = builtin.template().specialize(&instance.generics);
        def.generics_specified()?;

        let properties = instance
            .properties
            .iter()
            .map(|(name, value)| (name.clone(), Value::from(value.clone())))
            .collect();

        tracing::debug!(operator = %instance.operator, instance = %instance.name, "builtin instantiated");
        Operator::new(&instance.name, &def, properties, Some(builtin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slang_core::PortDef;

    struct Identity {
        template: OperatorDef,
    }

    impl Identity {
        fn new() -> Self {
            Self {
                template: OperatorDef::new(PortDef::generic("T"), PortDef::generic("T")),
            }
        }
    }

    impl Builtin for Identity {
        fn name(&self) -> &str {
            "test.identity"
        }

        fn template(&self) -> &OperatorDef {
            &self.template
        }

        fn run(&self, operator: Arc<Operator>) -> BuiltinFuture {
            Box::pin(async move {
                loop {
                    let value = operator.main_in().pull().await?;
                    operator.main_out().push(value).await?;
                }
            })
        }
    }

    fn registry() -> BuiltinRegistry {
        let mut registry = BuiltinRegistry::new();
        registry.register(Arc::new(Identity::new()));
        registry
    }

    #[test]
    fn registration_and_lookup() {
        let registry = registry();
        assert!(registry.is_registered("test.identity"));
        assert!(!registry.is_registered("test.missing"));
        assert_eq!(registry.names(), vec!["test.identity"]);
    }

    #[test]
    fn template_is_specialized_per_instance() {
        let registry = registry();

        let instance =
            InstanceDef::new("id", "test.identity").with_generic("T", PortDef::Number);
        let def = registry.template_for(&instance).unwrap();
        assert_eq!(def.input, PortDef::Number);

        // the shared template stays generic
        let other = InstanceDef::new("id2", "test.identity").with_generic("T", PortDef::String);
        let def = registry.template_for(&other).unwrap();
        assert_eq!(def.input, PortDef::String);
    }

    #[test]
    fn instantiate_requires_saturation() {
        let registry = registry();
        let instance = InstanceDef::new("id", "test.identity");
        assert!(matches!(
            registry.instantiate(&instance),
            Err(SlangError::UnboundGeneric(_))
        ));
    }

    #[tokio::test]
    async fn instantiated_builtin_runs() {
        let registry = registry();
        let instance = InstanceDef::new("id", "test.identity").with_generic("T", PortDef::Number);
        let operator = registry.instantiate(&instance).unwrap();

        operator.main_out().bufferize();
        operator.start();

        operator.main_in().push(Value::from(8.0)).await.unwrap();
        assert_eq!(operator.main_out().pull().await.unwrap(), Value::from(8.0));
        operator.stop();
    }
}
