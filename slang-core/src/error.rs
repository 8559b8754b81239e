//! Error types shared across the slang crates.
//!
//! A single enum covers the whole pipeline from parsing a definition
//! document to tearing a running graph down. Errors carry the offending
//! name, path or descriptor so callers can report them without extra
//! context.

use crate::port::PortDef;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for slang operations.
#[derive(Error, Debug)]
pub enum SlangError {
    // =========================================================================
    // Definition validation
    // =========================================================================
    /// An instance or delegate name is empty.
    #[error("name may not be empty")]
    EmptyName,

    /// A name contains whitespace.
    #[error("name may not contain whitespace: \"{0}\"")]
    WhitespaceInName(String),

    /// A port descriptor is missing its type tag.
    #[error("port type missing")]
    EmptyType,

    /// A port descriptor carries an unrecognized type tag.
    #[error("unknown port type \"{0}\"")]
    UnknownType(String),

    /// A generic descriptor is missing its identifier.
    #[error("generic identifier missing")]
    MissingGenericIdentifier,

    /// A stream descriptor is missing its element descriptor.
    #[error("stream sub-port missing")]
    MissingStreamChild,

    /// A map descriptor has no entries.
    #[error("map must not be empty")]
    EmptyMap,

    /// Two child instances within the same parent share a name.
    #[error("colliding instance names within same parent operator: \"{0}\"")]
    DuplicateChildName(String),

    // =========================================================================
    // Typing
    // =========================================================================
    /// A generic identifier survived specialization.
    #[error("generic not replaced: \"{0}\"")]
    UnboundGeneric(String),

    /// Connection endpoints have unequal descriptors.
    #[error("port types do not match: expected {expected}, actual {actual}")]
    TypeMismatch {
        /// Descriptor of the source port.
        expected: Box<PortDef>,
        /// Descriptor of the destination port.
        actual: Box<PortDef>,
    },

    /// A connection reference addresses a port with the wrong direction
    /// for its role.
    #[error("wrong port direction in connection \"{0}\"")]
    WrongDirection(String),

    // =========================================================================
    // Resolution
    // =========================================================================
    /// No builtin and no definition file matches the operator name.
    #[error("operator not found: \"{0}\"")]
    NotFound(String),

    /// A definition file has an unsupported extension.
    #[error("unsupported definition format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// A definition file imports itself, directly or transitively.
    #[error("recursion in {}", .0.display())]
    Recursion(PathBuf),

    // =========================================================================
    // Connection references
    // =========================================================================
    /// A connection string does not match the reference grammar.
    #[error("malformed connection reference: \"{0}\"")]
    MalformedRef(String),

    /// A reference names a child the operator does not have.
    #[error("operator \"{operator}\" has no child \"{child}\"")]
    UnknownChild {
        /// The enclosing operator.
        operator: String,
        /// The missing child instance name.
        child: String,
    },

    /// A reference names a delegate the operator does not have.
    #[error("operator \"{operator}\" has no delegate \"{delegate}\"")]
    UnknownDelegate {
        /// The operator the reference addressed.
        operator: String,
        /// The missing delegate name.
        delegate: String,
    },

    /// A path segment names a map entry the port does not have.
    #[error("unknown port: \"{0}\"")]
    UnknownPort(String),

    /// A path descends below a primitive port.
    #[error("descending too deep at \"{0}\"")]
    DescentTooDeep(String),

    /// A destination port already has an incoming connection.
    #[error("port already has an incoming connection: \"{0}\"")]
    AlreadyConnected(String),

    // =========================================================================
    // Runtime
    // =========================================================================
    /// The operator owning the port was stopped while the operation was
    /// blocked, or an upstream worker died.
    #[error("operation cancelled")]
    Cancelled,

    /// Stream markers arrived out of order on an edge.
    #[error("stream framing violation: {0}")]
    StreamFramingViolation(String),

    /// A pushed value does not fit the shape of the port.
    #[error("value does not fit port of type {0}")]
    ValueMismatch(Box<PortDef>),

    /// A property value does not conform to its declared descriptor.
    #[error("property \"{name}\" does not match its declared type {expected}")]
    PropertyTypeMismatch {
        /// The property name.
        name: String,
        /// The descriptor the schema declares.
        expected: Box<PortDef>,
    },

    /// A property the schema declares was not supplied.
    #[error("missing property \"{0}\"")]
    MissingProperty(String),

    /// A builtin worker failed.
    #[error("operator \"{operator}\" failed: {cause}")]
    Worker {
        /// The operator whose worker died.
        operator: String,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Parsing and I/O
    // =========================================================================
    /// Could not read a definition file.
    #[error("could not read operator file {}: {source}", .path.display())]
    Io {
        /// Path to the unreadable file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A definition document failed to parse.
    #[error("failed to parse definition: {0}")]
    DefinitionParse(String),
}

impl SlangError {
    /// Check if this error stems from definition validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyName
                | Self::WhitespaceInName(_)
                | Self::EmptyType
                | Self::UnknownType(_)
                | Self::MissingGenericIdentifier
                | Self::MissingStreamChild
                | Self::EmptyMap
                | Self::DuplicateChildName(_)
        )
    }

    /// Check if this error reports a cancelled runtime operation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias using `SlangError`.
pub type Result<T> = std::result::Result<T, SlangError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::PortDef;

    #[test]
    fn type_mismatch_display() {
        let err = SlangError::TypeMismatch {
            expected: Box::new(PortDef::Number),
            actual: Box::new(PortDef::String),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("expected number"));
        assert!(msg.contains("actual string"));
    }

    #[test]
    fn validation_predicate() {
        assert!(SlangError::EmptyMap.is_validation());
        assert!(!SlangError::Cancelled.is_validation());
        assert!(SlangError::Cancelled.is_cancelled());
    }
}
