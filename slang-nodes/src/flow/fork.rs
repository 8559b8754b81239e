//! Duplicating fork (`slang.fork`).

use slang_core::{OperatorDef, PortDef, Value};
use slang_executor::{Builtin, BuiltinFuture, Operator};
use std::sync::Arc;

/// Duplicates each item to two out-ports.
///
/// # Ports
/// - in: `T`
/// - out: `map{a: T, b: T}`
pub struct ForkOp {
    template: OperatorDef,
}

impl ForkOp {
    /// Create the builtin with its shared template.
    pub fn new() -> Self {
        Self {
            template: OperatorDef::new(
                PortDef::generic("T"),
                PortDef::map([("a", PortDef::generic("T")), ("b", PortDef::generic("T"))]),
            ),
        }
    }
}

impl Default for ForkOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtin for ForkOp {
    fn name(&self) -> &str {
        "slang.fork"
    }

    fn template(&self) -> &OperatorDef {
        &self.template
    }

    fn run(&self, operator: Arc<Operator>) -> BuiltinFuture {
        Box::pin(async move {
            loop {
                let item = operator.main_in().pull().await?;
                let record = Value::object([("a", item.clone()), ("b", item)]);
                operator.main_out().push(record).await?;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slang_core::InstanceDef;
    use slang_executor::BuiltinRegistry;

    fn registry() -> BuiltinRegistry {
        let mut registry = BuiltinRegistry::new();
        registry.register(Arc::new(ForkOp::new()));
        registry
    }

    #[test]
    fn ports_follow_bindings() {
        let instance = InstanceDef::new("f", "slang.fork").with_generic("T", PortDef::String);
        let op = registry().instantiate(&instance).unwrap();

        assert_eq!(op.main_in().def(), &PortDef::String);
        assert_eq!(op.main_out().map("a").unwrap().def(), &PortDef::String);
        assert_eq!(op.main_out().map("b").unwrap().def(), &PortDef::String);
    }

    #[tokio::test]
    async fn duplicates_items() {
        let instance = InstanceDef::new("f", "slang.fork").with_generic("T", PortDef::Number);
        let op = registry().instantiate(&instance).unwrap();
        op.main_out().bufferize();
        op.start();

        op.main_in().push(Value::from(7.0)).await.unwrap();
        assert_eq!(
            op.main_out().pull().await.unwrap(),
            Value::object([("a", Value::from(7.0)), ("b", Value::from(7.0))])
        );
        op.stop();
    }
}
