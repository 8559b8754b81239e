//! Convenience re-exports for embedding the runtime.
//!
//! ```ignore
//! use slang_executor::prelude::*;
//! ```

pub use crate::builder::Builder;
pub use crate::loader::Resolver;
pub use crate::operator::{Delegate, Operator};
pub use crate::port::{Direction, Frame, Port, PortFuture};
pub use crate::reference::{resolve_reference, ResolvedRef};
pub use crate::registry::{Builtin, BuiltinFuture, BuiltinRegistry};
pub use slang_core::prelude::*;
