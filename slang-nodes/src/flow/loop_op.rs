//! Delegate-driven loop (`slang.loop`).

use slang_core::{OperatorDef, PortDef, SlangError, Value};
use slang_executor::{Builtin, BuiltinFuture, Operator};
use std::sync::Arc;

const ITERATION: &str = "iteration";

/// Iterates a state through the `iteration` delegate.
///
/// Each item pulled from the in-port becomes the initial state. The
/// current state is pushed out through the delegate; the environment
/// answers with the next state and a continuation flag. When the flag is
/// false the final state is emitted on the out-port.
///
/// # Ports
/// - in: `T` (initial state)
/// - out: `T` (final state)
///
/// # Delegates
/// - `iteration`: out `T`, in `map{state: T, continue: boolean}`
pub struct LoopOp {
    template: OperatorDef,
}

impl LoopOp {
    /// Create the builtin with its shared template.
    pub fn new() -> Self {
        Self {
            template: OperatorDef::new(PortDef::generic("T"), PortDef::generic("T"))
                .with_delegate(
                    ITERATION,
                    slang_core::DelegateDef::new(
                        PortDef::map([
                            ("continue", PortDef::Boolean),
                            ("state", PortDef::generic("T")),
                        ]),
                        PortDef::generic("T"),
                    ),
                ),
        }
    }
}

impl Default for LoopOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtin for LoopOp {
    fn name(&self) -> &str {
        "slang.loop"
    }

    fn template(&self) -> &OperatorDef {
        &self.template
    }

    fn run(&self, operator: Arc<Operator>) -> BuiltinFuture {
        Box::pin(async move {
            loop {
                let mut state = operator.main_in().pull().await?;
                loop {
                    let iteration =
                        operator
                            .delegate(ITERATION)
                            .ok_or_else(|| SlangError::Worker {
                                operator: operator.name().to_string(),
                                cause: "iteration delegate missing".to_string(),
                            })?;
                    iteration.output().push(state.clone()).await?;
                    let response = iteration.input().pull().await?;

                    state = response.get("state").cloned().unwrap_or(Value::Null);
                    let proceed = response
                        .get("continue")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    if !proceed {
                        break;
                    }
                }
                operator.main_out().push(state).await?;
            }
        })
    }
}
