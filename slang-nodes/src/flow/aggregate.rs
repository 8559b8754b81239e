//! Delegate-driven fold (`slang.aggregate`).

use slang_core::{DelegateDef, OperatorDef, PortDef, SlangError, Value};
use slang_executor::{Builtin, BuiltinFuture, Operator};
use std::sync::Arc;

const ITERATION: &str = "iteration";

/// Folds a stream of items into a single state.
///
/// Each record carries an initial state and a stream of items. For every
/// item the current state and the item are pushed out through the
/// delegate; the environment answers with the next state. The state left
/// after the last item is emitted on the out-port.
///
/// # Ports
/// - in: `map{init: S, items: stream(T)}`
/// - out: `S`
///
/// # Delegates
/// - `iteration`: out `map{item: T, state: S}`, in `S`
pub struct AggregateOp {
    template: OperatorDef,
}

impl AggregateOp {
    /// Create the builtin with its shared template.
    pub fn new() -> Self {
        Self {
            template: OperatorDef::new(
                PortDef::map([
                    ("init", PortDef::generic("stateType")),
                    ("items", PortDef::stream(PortDef::generic("itemType"))),
                ]),
                PortDef::generic("stateType"),
            )
            .with_delegate(
                ITERATION,
                DelegateDef::new(
                    PortDef::generic("stateType"),
                    PortDef::map([
                        ("item", PortDef::generic("itemType")),
                        ("state", PortDef::generic("stateType")),
                    ]),
                ),
            ),
        }
    }
}

impl Default for AggregateOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtin for AggregateOp {
    fn name(&self) -> &str {
        "slang.aggregate"
    }

    fn template(&self) -> &OperatorDef {
        &self.template
    }

    fn run(&self, operator: Arc<Operator>) -> BuiltinFuture {
        Box::pin(async move {
            loop {
                let record = operator.main_in().pull().await?;
                let mut state = record.get("init").cloned().unwrap_or(Value::Null);
                let items = record
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();

                let iteration = operator
                    .delegate(ITERATION)
                    .ok_or_else(|| SlangError::Worker {
                        operator: operator.name().to_string(),
                        cause: "iteration delegate missing".to_string(),
                    })?;

                for item in items {
                    iteration
                        .output()
                        .push(Value::object([("item", item), ("state", state)]))
                        .await?;
                    state = iteration.input().pull().await?;
                }
                operator.main_out().push(state).await?;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slang_core::InstanceDef;
    use slang_executor::BuiltinRegistry;

    fn aggregate_op() -> Arc<Operator> {
        let mut registry = BuiltinRegistry::new();
        registry.register(Arc::new(AggregateOp::new()));
        let instance = InstanceDef::new("agg", "slang.aggregate")
            .with_generic("stateType", PortDef::Number)
            .with_generic("itemType", PortDef::Number);
        registry.instantiate(&instance).unwrap()
    }

    #[test]
    fn ports_follow_bindings() {
        let op = aggregate_op();
        assert_eq!(op.main_in().map("init").unwrap().def(), &PortDef::Number);
        assert_eq!(
            op.main_in().map("items").unwrap().def(),
            &PortDef::stream(PortDef::Number)
        );

        let iteration = op.delegate(ITERATION).unwrap();
        assert_eq!(iteration.input().def(), &PortDef::Number);
        assert_eq!(
            iteration.output().map("item").unwrap().def(),
            &PortDef::Number
        );
    }

    #[tokio::test]
    async fn folds_items_through_delegate() {
        let op = aggregate_op();
        op.main_out().bufferize();
        op.start();

        op.main_in()
            .push(Value::object([
                ("init", Value::from(0.0)),
                ("items", Value::from(vec![1.0, 2.0, 3.0])),
            ]))
            .await
            .unwrap();

        // drive the delegate: sum item into state
        let iteration = op.delegate(ITERATION).unwrap();
        for _ in 0..3 {
            let request = iteration.output().pull().await.unwrap();
            let item = request.get("item").and_then(Value::as_f64).unwrap();
            let state = request.get("state").and_then(Value::as_f64).unwrap();
            iteration
                .input()
                .push(Value::from(item + state))
                .await
                .unwrap();
        }

        assert_eq!(op.main_out().pull().await.unwrap(), Value::from(6.0));
        op.stop();
    }
}
