//! Selecting merge (`slang.take`).

use slang_core::{OperatorDef, PortDef, Value};
use slang_executor::{Builtin, BuiltinFuture, Operator};
use std::sync::Arc;

/// Picks one of two inputs per record.
///
/// Consumes one full record per tick and forwards `a` when `select` is
/// true, `b` otherwise.
///
/// # Ports
/// - in: `map{a: T, b: T, select: boolean}`
/// - out: `T`
pub struct TakeOp {
    template: OperatorDef,
}

impl TakeOp {
    /// Create the builtin with its shared template.
    pub fn new() -> Self {
        Self {
            template: OperatorDef::new(
                PortDef::map([
                    ("a", PortDef::generic("T")),
                    ("b", PortDef::generic("T")),
                    ("select", PortDef::Boolean),
                ]),
                PortDef::generic("T"),
            ),
        }
    }
}

impl Default for TakeOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtin for TakeOp {
    fn name(&self) -> &str {
        "slang.take"
    }

    fn template(&self) -> &OperatorDef {
        &self.template
    }

    fn run(&self, operator: Arc<Operator>) -> BuiltinFuture {
        Box::pin(async move {
            loop {
                let record = operator.main_in().pull().await?;
                let selected = if record.get("select").and_then(Value::as_bool).unwrap_or(false) {
                    "a"
                } else {
                    "b"
                };
                let value = record.get(selected).cloned().unwrap_or(Value::Null);
                operator.main_out().push(value).await?;
            }
        })
    }
}
