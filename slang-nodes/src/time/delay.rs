//! Delaying pass-through (`slang.time.delay`).

use slang_core::{OperatorDef, PortDef, Value};
use slang_executor::{Builtin, BuiltinFuture, Operator};
use std::sync::Arc;
use std::time::Duration;

/// Forwards each item after a fixed delay.
///
/// # Ports
/// - in: `T`
/// - out: `T`
///
/// # Properties
/// - `delay: number` - milliseconds to wait before forwarding
pub struct DelayOp {
    template: OperatorDef,
}

impl DelayOp {
    /// Create the builtin with its shared template.
    pub fn new() -> Self {
        Self {
            template: OperatorDef::new(PortDef::generic("T"), PortDef::generic("T"))
                .with_property("delay", PortDef::Number),
        }
    }
}

impl Default for DelayOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtin for DelayOp {
    fn name(&self) -> &str {
        "slang.time.delay"
    }

    fn template(&self) -> &OperatorDef {
        &self.template
    }

    fn run(&self, operator: Arc<Operator>) -> BuiltinFuture {
        Box::pin(async move {
            let millis = operator
                .property("delay")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let delay = Duration::from_millis(millis.max(0.0) as u64);
            loop {
                let item = operator.main_in().pull().await?;
                tokio::time::sleep(delay).await;
                operator.main_out().push(item).await?;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slang_core::InstanceDef;
    use slang_executor::BuiltinRegistry;
    use std::time::Instant;

    #[tokio::test]
    async fn forwards_after_delay() {
        let mut registry = BuiltinRegistry::new();
        registry.register(Arc::new(DelayOp::new()));

        let instance = InstanceDef::new("d", "slang.time.delay")
            .with_generic("T", PortDef::Number)
            .with_property("delay", serde_json::json!(50));
        let op = registry.instantiate(&instance).unwrap();
        op.main_out().bufferize();
        op.start();

        let begin = Instant::now();
        op.main_in().push(Value::from(1.0)).await.unwrap();
        assert_eq!(op.main_out().pull().await.unwrap(), Value::from(1.0));
        assert!(begin.elapsed() >= Duration::from_millis(50));

        op.stop();
    }
}
