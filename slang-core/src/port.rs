//! Recursive port-type descriptors.
//!
//! A `PortDef` describes the structural type of a port: a scalar, an
//! unbound generic placeholder, a stream of sub-values or a named record
//! of sub-ports. Descriptors are parsed from definition documents,
//! specialized with generic bindings at instance sites and compared
//! structurally when ports are connected.

use crate::error::{Result, SlangError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Structural type of a port.
///
/// # Example
///
/// ```yaml
/// type: stream
/// stream:
///   type: map
///   map:
///     key:
///       type: string
///     value:
///       type: number
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPortDef", into = "RawPortDef")]
pub enum PortDef {
    /// Any primitive scalar.
    Primitive,
    /// A floating-point number.
    Number,
    /// A UTF-8 string.
    String,
    /// A boolean.
    Boolean,
    /// Raw bytes.
    Binary,
    /// An unbound placeholder, replaced at instance construction.
    Generic(String),
    /// An ordered sequence of sub-values.
    Stream(Box<PortDef>),
    /// A named record of sub-ports.
    Map(BTreeMap<String, PortDef>),
}

impl PortDef {
    /// Build a stream descriptor.
    pub fn stream(element: PortDef) -> Self {
        Self::Stream(Box::new(element))
    }

    /// Build a map descriptor from entries.
    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, PortDef)>,
        K: Into<String>,
    {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a generic descriptor.
    pub fn generic(identifier: impl Into<String>) -> Self {
        Self::Generic(identifier.into())
    }

    /// The type tag as it appears in definition documents.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Primitive => "primitive",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Binary => "binary",
            Self::Generic(_) => "generic",
            Self::Stream(_) => "stream",
            Self::Map(_) => "map",
        }
    }

    /// Validate the descriptor against the shape rules.
    ///
    /// A stream must carry an element descriptor, a map must be non-empty,
    /// a generic must carry a non-empty identifier, and every sub-port
    /// must itself validate.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Generic(identifier) => {
                if identifier.is_empty() {
                    return Err(SlangError::MissingGenericIdentifier);
                }
            }
            Self::Stream(element) => element.validate()?,
            Self::Map(entries) => {
                if entries.is_empty() {
                    return Err(SlangError::EmptyMap);
                }
                for entry in entries.values() {
                    entry.validate()?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Replace bound generic identifiers by their descriptors.
    ///
    /// Returns a fresh descriptor; identifiers absent from `generics` are
    /// left in place.
    pub fn specialize(&self, generics: &BTreeMap<String, PortDef>) -> PortDef {
        match self {
            Self::Generic(identifier) => match generics.get(identifier) {
                Some(bound) => bound.clone(),
                None => self.clone(),
            },
            Self::Stream(element) => PortDef::stream(element.specialize(generics)),
            Self::Map(entries) => PortDef::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.specialize(generics)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Assert that no generic placeholder remains reachable.
    pub fn generics_specified(&self) -> Result<()> {
        match self {
            Self::Generic(identifier) => Err(SlangError::UnboundGeneric(identifier.clone())),
            Self::Stream(element) => element.generics_specified(),
            Self::Map(entries) => {
                for entry in entries.values() {
                    entry.generics_specified()?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Collect the identifiers of all reachable generic placeholders.
    pub fn free_generics(&self) -> BTreeSet<String> {
        let mut identifiers = BTreeSet::new();
        self.collect_generics(&mut identifiers);
        identifiers
    }

    fn collect_generics(&self, identifiers: &mut BTreeSet<String>) {
        match self {
            Self::Generic(identifier) => {
                identifiers.insert(identifier.clone());
            }
            Self::Stream(element) => element.collect_generics(identifiers),
            Self::Map(entries) => {
                for entry in entries.values() {
                    entry.collect_generics(identifiers);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for PortDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(identifier) => write!(f, "generic<{}>", identifier),
            Self::Stream(element) => write!(f, "stream({})", element),
            Self::Map(entries) => {
                write!(f, "map{{")?;
                for (i, (key, entry)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", key, entry)?;
                }
                write!(f, "}}")
            }
            other => f.write_str(other.type_name()),
        }
    }
}

/// Wire shape of a descriptor, mirroring the document schema.
///
/// Deserializing through this mirror lets malformed documents surface the
/// validation taxonomy instead of opaque serde messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPortDef {
    #[serde(rename = "type")]
    type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stream: Option<Box<RawPortDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    map: Option<BTreeMap<String, RawPortDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generic: Option<String>,
}

impl TryFrom<RawPortDef> for PortDef {
    type Error = SlangError;

    fn try_from(raw: RawPortDef) -> Result<Self> {
        let type_name = match raw.type_name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(SlangError::EmptyType),
        };

        let def = match type_name.as_str() {
            "primitive" => Self::Primitive,
            "number" => Self::Number,
            "string" => Self::String,
            "boolean" => Self::Boolean,
            "binary" => Self::Binary,
            "generic" => match raw.generic {
                Some(identifier) if !identifier.is_empty() => Self::Generic(identifier),
                _ => return Err(SlangError::MissingGenericIdentifier),
            },
            "stream" => match raw.stream {
                Some(element) => Self::stream(PortDef::try_from(*element)?),
                None => return Err(SlangError::MissingStreamChild),
            },
            "map" => {
                let entries = raw.map.unwrap_or_default();
                if entries.is_empty() {
                    return Err(SlangError::EmptyMap);
                }
                let mut converted = BTreeMap::new();
                for (key, entry) in entries {
                    converted.insert(key, PortDef::try_from(entry)?);
                }
                Self::Map(converted)
            }
            other => return Err(SlangError::UnknownType(other.to_string())),
        };

        Ok(def)
    }
}

impl From<PortDef> for RawPortDef {
    fn from(def: PortDef) -> Self {
        let type_name = Some(def.type_name().to_string());
        match def {
            PortDef::Generic(identifier) => Self {
                type_name,
                stream: None,
                map: None,
                generic: Some(identifier),
            },
            PortDef::Stream(element) => Self {
                type_name,
                stream: Some(Box::new(RawPortDef::from(*element))),
                map: None,
                generic: None,
            },
            PortDef::Map(entries) => Self {
                type_name,
                stream: None,
                map: Some(
                    entries
                        .into_iter()
                        .map(|(k, v)| (k, RawPortDef::from(v)))
                        .collect(),
                ),
                generic: None,
            },
            _ => Self {
                type_name,
                stream: None,
                map: None,
                generic: None,
            },
        }
    }
}
