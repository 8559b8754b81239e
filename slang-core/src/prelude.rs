//! Convenience re-exports for downstream crates.
//!
//! ```ignore
//! use slang_core::prelude::*;
//! ```

pub use crate::def::{DelegateDef, InstanceDef, OperatorDef};
pub use crate::error::{Result, SlangError};
pub use crate::port::PortDef;
pub use crate::value::Value;
