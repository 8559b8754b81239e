//! Standard registry assembly.

use crate::data::ConstOp;
use crate::files::FileReadOp;
use crate::flow::{AggregateOp, ForkOp, LoopOp, TakeOp};
use crate::net::HttpServerOp;
use crate::time::DelayOp;
use slang_executor::BuiltinRegistry;
use std::sync::Arc;

/// Create a registry holding every standard builtin.
pub fn create_standard_registry() -> BuiltinRegistry {
    let mut registry = BuiltinRegistry::new();

    registry.register(Arc::new(ConstOp::new()));

    registry.register(Arc::new(ForkOp::new()));
    registry.register(Arc::new(TakeOp::new()));
    registry.register(Arc::new(LoopOp::new()));
    registry.register(Arc::new(AggregateOp::new()));

    registry.register(Arc::new(DelayOp::new()));
    registry.register(Arc::new(FileReadOp::new()));
    registry.register(Arc::new(HttpServerOp::new()));

    registry
}
