//! Slang Core Library
//!
//! This crate provides the data model for the slang dataflow language:
//! the recursive port-type algebra with generic specialization, operator
//! and instance definitions as parsed from JSON/YAML documents, and the
//! dynamic value type flowing through runtime ports.
//!
//! # Overview
//!
//! A slang program is a tree of operator instances communicating over
//! typed ports. Composite operators are described by definition documents
//! that enumerate child instances and wire their ports; leaf operators
//! are builtins implemented natively by the executor.
//!
//! # Key Components
//!
//! - **Port descriptors** (`PortDef`): recursive type descriptors with
//!   validation, structural equality and generic substitution
//! - **Definitions** (`OperatorDef`, `InstanceDef`): the document model
//! - **Values** (`Value`): dynamic values pushed and pulled at runtime

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod def;
pub mod error;
pub mod port;
pub mod prelude;
pub mod value;

pub use def::{DelegateDef, InstanceDef, OperatorDef};
pub use error::{Result, SlangError};
pub use port::PortDef;
pub use value::Value;
