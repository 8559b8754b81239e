//! Slang Executor
//!
//! This crate turns operator definitions into running graphs. It hosts:
//!
//! - **Loader** (`loader`): reads definitions from disk or the builtin
//!   registry, applies generic bindings and detects recursive imports
//! - **Builder** (`builder`): materializes the operator tree, resolves
//!   connection references and wires ports
//! - **Transport** (`port`, `operator`): typed runtime ports with
//!   hierarchical stream markers, push/pull with blocking handoff,
//!   per-operator workers and cancellation
//! - **Registry** (`registry`): name to builtin lookup with instance-time
//!   template cloning and specialization
//!
//! # Example
//!
//! ```ignore
//! use slang_executor::prelude::*;
//!
//! let registry = Arc::new(BuiltinRegistry::new());
//! let resolver = Resolver::new(registry.clone());
//! let def = resolver.load(Path::new("project/main"))?;
//!
//! let operator = Builder::new(registry).build("main", &def)?;
//! operator.main_out().bufferize();
//! operator.start();
//! operator.main_in().push(Value::from(1.0)).await?;
//! let result = operator.main_out().pull().await?;
//! operator.stop();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod loader;
pub mod operator;
pub mod port;
pub mod prelude;
mod queue;
pub mod reference;
pub mod registry;

pub use builder::Builder;
pub use loader::Resolver;
pub use operator::{Delegate, Operator};
pub use port::{Direction, Frame, Port};
pub use registry::{Builtin, BuiltinFuture, BuiltinRegistry};
