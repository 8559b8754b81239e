//! Constant source (`slang.const`).

use slang_core::{OperatorDef, PortDef, Value};
use slang_executor::{Builtin, BuiltinFuture, Operator};
use std::sync::Arc;

/// Emits a configured value once per trigger item.
///
/// The in-port acts as a trigger: each pulled item, regardless of its
/// content, produces one copy of the `value` property on the out-port.
///
/// # Ports
/// - in: `primitive` (trigger)
/// - out: `valueType`
///
/// # Properties
/// - `value: valueType` - the constant to emit
pub struct ConstOp {
    template: OperatorDef,
}

impl ConstOp {
    /// Create the builtin with its shared template.
    pub fn new() -> Self {
        Self {
            template: OperatorDef::new(PortDef::Primitive, PortDef::generic("valueType"))
                .with_property("value", PortDef::generic("valueType")),
        }
    }
}

impl Default for ConstOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtin for ConstOp {
    fn name(&self) -> &str {
        "slang.const"
    }

    fn template(&self) -> &OperatorDef {
        &self.template
    }

    fn run(&self, operator: Arc<Operator>) -> BuiltinFuture {
        Box::pin(async move {
            let value = operator.property("value").cloned().unwrap_or(Value::Null);
            loop {
                operator.main_in().pull().await?;
                operator.main_out().push(value.clone()).await?;
            }
        })
    }
}
