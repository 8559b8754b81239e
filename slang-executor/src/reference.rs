//! Connection reference parsing.
//!
//! A connection string addresses one port inside a composite operator.
//! It contains either `->/` (the in-port tree of the addressed operator:
//! `<port-path>->/<op-ref>`) or `/->` (the out-port tree:
//! `<op-ref>/-><port-path>`). `<op-ref>` is empty for the enclosing
//! operator itself or a child instance name, optionally suffixed
//! `.delegates.<name>` to select a delegate. The port path is
//! `.`-separated: a key descends into a map, an empty segment descends
//! into a stream's element.
//!
//! Inside a composite, the parent's own in tree and the children's out
//! trees are readable (edge sources); the parent's out tree and the
//! children's in trees are writable (edge destinations).

use crate::operator::Operator;
use crate::port::Port;
use slang_core::{PortDef, Result, SlangError};
use std::sync::Arc;

const IN_SEPARATOR: &str = "->/";
const OUT_SEPARATOR: &str = "/->";
const DELEGATE_INFIX: &str = ".delegates.";

/// A reference resolved against a composite operator.
pub struct ResolvedRef {
    /// The operator owning the port.
    pub operator: Arc<Operator>,
    /// The addressed port.
    pub port: Arc<Port>,
    /// Whether the port is readable inside the composite, i.e. legal as
    /// an edge source. Writable (destination) ports are exactly the
    /// non-readable ones.
    pub readable: bool,
}

/// Resolve a connection string against the composite it appears in.
pub fn resolve_reference(reference: &str, parent: &Arc<Operator>) -> Result<ResolvedRef> {
    if reference.is_empty() {
        return Err(SlangError::MalformedRef(reference.to_string()));
    }

    // `->/` is tested first; `/->` alone never contains it
    let (addresses_in, op_part, path_part) = if reference.contains(IN_SEPARATOR) {
        let parts: Vec<&str> = reference.split(IN_SEPARATOR).collect();
        if parts.len() != 2 {
            return Err(SlangError::MalformedRef(reference.to_string()));
        }
        (true, parts[1], parts[0])
    } else if reference.contains(OUT_SEPARATOR) {
        let parts: Vec<&str> = reference.split(OUT_SEPARATOR).collect();
        if parts.len() != 2 {
            return Err(SlangError::MalformedRef(reference.to_string()));
        }
        (false, parts[0], parts[1])
    } else {
        return Err(SlangError::MalformedRef(reference.to_string()));
    };

    let (op_name, delegate_name) = match op_part.find(DELEGATE_INFIX) {
        Some(index) => {
            let delegate = &op_part[index + DELEGATE_INFIX.len()..];
            if delegate.is_empty() {
                return Err(SlangError::MalformedRef(reference.to_string()));
            }
            (&op_part[..index], Some(delegate))
        }
        None => (op_part, None),
    };

    let (operator, is_self) = if op_name.is_empty() {
        (parent.clone(), true)
    } else {
        match parent.child(op_name) {
            Some(child) => (child, false),
            None => {
                return Err(SlangError::UnknownChild {
                    operator: parent.name().to_string(),
                    child: op_name.to_string(),
                });
            }
        }
    };

    let root = match delegate_name {
        Some(name) => {
            let delegate = operator
                .delegate(name)
                .ok_or_else(|| SlangError::UnknownDelegate {
                    operator: operator.name().to_string(),
                    delegate: name.to_string(),
                })?;
            if addresses_in {
                delegate.input().clone()
            } else {
                delegate.output().clone()
            }
        }
        None => {
            if addresses_in {
                operator.main_in().clone()
            } else {
                operator.main_out().clone()
            }
        }
    };

    let port = descend(root, path_part, reference)?;

    Ok(ResolvedRef {
        operator,
        port,
        readable: is_self == addresses_in,
    })
}

fn descend(root: Arc<Port>, path: &str, reference: &str) -> Result<Arc<Port>> {
    let segments: Vec<&str> = path.split('.').collect();
    let start = usize::from(segments.first() == Some(&""));

    let mut port = root;
    for segment in &segments[start..] {
        if segment.is_empty() {
            port = port
                .stream()
                .cloned()
                .ok_or_else(|| SlangError::DescentTooDeep(reference.to_string()))?;
            continue;
        }
        if !matches!(port.def(), PortDef::Map(_)) {
            return Err(SlangError::DescentTooDeep(reference.to_string()));
        }
        port = port
            .map(segment)
            .cloned()
            .ok_or_else(|| SlangError::UnknownPort((*segment).to_string()))?;
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slang_core::{DelegateDef, OperatorDef, PortDef};
    use std::collections::BTreeMap;

    fn composite() -> Arc<Operator> {
        let def = OperatorDef::new(
            PortDef::stream(PortDef::map([("k", PortDef::Number)])),
            PortDef::map([("a", PortDef::Number), ("b", PortDef::Number)]),
        )
        .with_delegate(
            "handler",
            DelegateDef::new(PortDef::String, PortDef::Number),
        );
        let parent = Operator::new("parent", &def, BTreeMap::new(), None).unwrap();

        let child_def = OperatorDef::new(PortDef::Number, PortDef::Number);
        let child = Operator::new("child", &child_def, BTreeMap::new(), None).unwrap();
        parent.add_child(child);
        parent
    }

    #[test]
    fn parent_in_is_readable() {
        let parent = composite();
        let resolved = resolve_reference("->/", &parent).unwrap();
        assert!(resolved.readable);
        assert_eq!(resolved.operator.name(), "parent");
        assert_eq!(
            resolved.port.def(),
            &PortDef::stream(PortDef::map([("k", PortDef::Number)]))
        );
    }

    #[test]
    fn parent_out_is_writable() {
        let parent = composite();
        let resolved = resolve_reference("/->a", &parent).unwrap();
        assert!(!resolved.readable);
        assert_eq!(resolved.port.def(), &PortDef::Number);
    }

    #[test]
    fn child_ports_reverse_roles() {
        let parent = composite();

        let source = resolve_reference("child/->", &parent).unwrap();
        assert!(source.readable);
        assert_eq!(source.operator.name(), "child");

        let destination = resolve_reference("->/child", &parent).unwrap();
        assert!(!destination.readable);
    }

    #[test]
    fn path_descends_stream_and_map() {
        // leading empty segment is skipped; the second empty segment
        // descends into the stream's element, "k" into the map
        let parent = composite();
        let resolved = resolve_reference("..k->/", &parent).unwrap();
        assert_eq!(resolved.port.def(), &PortDef::Number);
    }

    #[test]
    fn delegate_addressing() {
        let parent = composite();

        let response = resolve_reference("->/.delegates.handler", &parent).unwrap();
        assert!(response.readable);
        assert_eq!(response.port.def(), &PortDef::String);

        let request = resolve_reference(".delegates.handler/->", &parent).unwrap();
        assert!(!request.readable);
        assert_eq!(request.port.def(), &PortDef::Number);
    }

    #[test]
    fn unknown_names_are_reported() {
        let parent = composite();

        assert!(matches!(
            resolve_reference("ghost/->", &parent),
            Err(SlangError::UnknownChild { child, .. }) if child == "ghost"
        ));
        assert!(matches!(
            resolve_reference(".delegates.ghost/->", &parent),
            Err(SlangError::UnknownDelegate { delegate, .. }) if delegate == "ghost"
        ));
        assert!(matches!(
            resolve_reference("/->ghost", &parent),
            Err(SlangError::UnknownPort(key)) if key == "ghost"
        ));
    }

    #[test]
    fn malformed_references_are_rejected() {
        let parent = composite();
        for reference in ["", "child", "a->/b->/c", "a/->b/->c"] {
            assert!(matches!(
                resolve_reference(reference, &parent),
                Err(SlangError::MalformedRef(_))
            ));
        }
    }

    #[test]
    fn descending_below_primitive_fails() {
        let parent = composite();
        assert!(matches!(
            resolve_reference("/->a.deeper", &parent),
            Err(SlangError::DescentTooDeep(_))
        ));
    }
}
