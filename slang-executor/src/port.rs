//! Runtime ports and the frame transport.
//!
//! A runtime port mirrors its descriptor: primitive leaves carry frames
//! over queues, map ports aggregate named sub-ports, stream ports wrap an
//! element port. Values, and the `BOS`/`EOS` markers bracketing stream
//! payloads, travel on the primitive leaves; structured push and pull
//! translate between whole values and leaf frames.
//!
//! Connections link primitive leaves of an out-port tree to the matching
//! leaves of an in-port tree. Composite boundary ports merely forward:
//! a frame pushed into a port travels through destination links until it
//! reaches a port nothing forwards from, and settles in that port's queue.

use crate::queue::FrameQueue;
use parking_lot::RwLock;
use slang_core::{PortDef, Result, SlangError, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Boxed future type returned by port operations.
pub type PortFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// One item travelling over a primitive leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Begin-of-stream marker.
    Bos,
    /// End-of-stream marker.
    Eos,
    /// A payload value.
    Value(Value),
}

/// Direction of a port relative to its owning operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Values flow into the operator.
    In,
    /// Values flow out of the operator.
    Out,
}

struct Primitive {
    queue: FrameQueue,
    dests: RwLock<Vec<Arc<Port>>>,
    has_source: AtomicBool,
}

enum PortKind {
    Primitive(Primitive),
    Map(BTreeMap<String, Arc<Port>>),
    Stream(Arc<Port>),
}

/// A typed runtime port.
pub struct Port {
    def: PortDef,
    direction: Direction,
    owner: String,
    kind: PortKind,
}

impl Port {
    /// Build a port tree mirroring a saturated descriptor.
    pub(crate) fn from_def(def: &PortDef, direction: Direction, owner: &str) -> Arc<Port> {
        let kind = match def {
            PortDef::Stream(element) => PortKind::Stream(Port::from_def(element, direction, owner)),
            PortDef::Map(entries) => PortKind::Map(
                entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), Port::from_def(entry, direction, owner)))
                    .collect(),
            ),
            _ => PortKind::Primitive(Primitive {
                queue: FrameQueue::new(),
                dests: RwLock::new(Vec::new()),
                has_source: AtomicBool::new(false),
            }),
        };
        Arc::new(Port {
            def: def.clone(),
            direction,
            owner: owner.to_string(),
            kind,
        })
    }

    /// The descriptor this port was built from.
    pub fn def(&self) -> &PortDef {
        &self.def
    }

    /// Direction relative to the owning operator.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Name of the owning operator.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The element port, if this is a stream port.
    pub fn stream(&self) -> Option<&Arc<Port>> {
        match &self.kind {
            PortKind::Stream(element) => Some(element),
            _ => None,
        }
    }

    /// A named sub-port, if this is a map port.
    pub fn map(&self, key: &str) -> Option<&Arc<Port>> {
        match &self.kind {
            PortKind::Map(subs) => subs.get(key),
            _ => None,
        }
    }

    /// Swap synchronous handoff for unbounded buffering on every leaf.
    pub fn bufferize(&self) {
        match &self.kind {
            PortKind::Primitive(primitive) => primitive.queue.bufferize(),
            PortKind::Map(subs) => subs.values().for_each(|sub| sub.bufferize()),
            PortKind::Stream(element) => element.bufferize(),
        }
    }

    /// Connect this port to a destination port.
    ///
    /// Descriptors must be structurally equal; primitive leaves are linked
    /// pairwise. A destination leaf accepts at most one incoming link, a
    /// source leaf may broadcast to several destinations.
    pub fn connect(self: &Arc<Self>, destination: &Arc<Port>) -> Result<()> {
        if self.def != destination.def {
            return Err(SlangError::TypeMismatch {
                expected: Box::new(self.def.clone()),
                actual: Box::new(destination.def.clone()),
            });
        }
        self.link(destination)
    }

    fn link(&self, destination: &Arc<Port>) -> Result<()> {
        match (&self.kind, &destination.kind) {
            (PortKind::Primitive(source), PortKind::Primitive(sink)) => {
                if sink.has_source.swap(true, Ordering::SeqCst) {
                    return Err(SlangError::AlreadyConnected(destination.owner.clone()));
                }
                source.dests.write().push(destination.clone());
                Ok(())
            }
            (PortKind::Map(sources), PortKind::Map(sinks)) => {
                for (key, sub) in sources {
                    let Some(sink) = sinks.get(key) else {
                        return Err(SlangError::UnknownPort(key.clone()));
                    };
                    sub.link(sink)?;
                }
                Ok(())
            }
            (PortKind::Stream(source), PortKind::Stream(sink)) => source.link(sink),
            _ => Err(SlangError::TypeMismatch {
                expected: Box::new(self.def.clone()),
                actual: Box::new(destination.def.clone()),
            }),
        }
    }

    /// Cancel the queues of every leaf, waking blocked pushes and pulls.
    pub(crate) fn cancel(&self) {
        match &self.kind {
            PortKind::Primitive(primitive) => primitive.queue.cancel(),
            PortKind::Map(subs) => subs.values().for_each(|sub| sub.cancel()),
            PortKind::Stream(element) => element.cancel(),
        }
    }

    /// Cancel the terminal queues fed by this port, transitively.
    pub(crate) fn cancel_downstream(&self) {
        match &self.kind {
            PortKind::Primitive(primitive) => {
                let dests: Vec<Arc<Port>> = primitive.dests.read().clone();
                if dests.is_empty() {
                    primitive.queue.cancel();
                } else {
                    for dest in dests {
                        dest.cancel_downstream();
                    }
                }
            }
            PortKind::Map(subs) => subs.values().for_each(|sub| sub.cancel_downstream()),
            PortKind::Stream(element) => element.cancel_downstream(),
        }
    }

    /// Forward one frame along destination links; frames settle in the
    /// queue of the first port nothing forwards from.
    fn send_frame<'a>(&'a self, frame: Frame) -> PortFuture<'a, ()> {
        Box::pin(async move {
            let PortKind::Primitive(primitive) = &self.kind else {
                return Err(SlangError::ValueMismatch(Box::new(self.def.clone())));
            };
            let dests: Vec<Arc<Port>> = primitive.dests.read().clone();
            if dests.is_empty() {
                primitive.queue.send(frame).await
            } else {
                for dest in &dests {
                    dest.send_frame(frame.clone()).await?;
                }
                Ok(())
            }
        })
    }

    /// Deliver a marker to every leaf of this tree.
    fn send_marker<'a>(&'a self, marker: Frame) -> PortFuture<'a, ()> {
        Box::pin(async move {
            match &self.kind {
                PortKind::Primitive(_) => self.send_frame(marker).await,
                PortKind::Map(subs) => {
                    for sub in subs.values() {
                        sub.send_marker(marker.clone()).await?;
                    }
                    Ok(())
                }
                PortKind::Stream(element) => element.send_marker(marker).await,
            }
        })
    }

    /// Consume one frame from every leaf, asserting it is the expected
    /// marker.
    fn pull_marker<'a>(&'a self, expected: Frame) -> PortFuture<'a, ()> {
        Box::pin(async move {
            match &self.kind {
                PortKind::Primitive(primitive) => {
                    let frame = primitive.queue.recv().await?;
                    if frame == expected {
                        Ok(())
                    } else {
                        Err(SlangError::StreamFramingViolation(format!(
                            "expected {:?} on \"{}\", found {:?}",
                            expected, self.owner, frame
                        )))
                    }
                }
                PortKind::Map(subs) => {
                    for sub in subs.values() {
                        sub.pull_marker(expected.clone()).await?;
                    }
                    Ok(())
                }
                PortKind::Stream(element) => element.pull_marker(expected).await,
            }
        })
    }

    /// Whether some leaf is reachable without crossing a sub-stream.
    ///
    /// Such a leaf carries a marker exactly when the marker belongs to this
    /// level, which is what disambiguates a record from a marker when
    /// peeking.
    fn has_direct_leaf(&self) -> bool {
        match &self.kind {
            PortKind::Primitive(_) => true,
            PortKind::Map(subs) => subs.values().any(|sub| sub.has_direct_leaf()),
            PortKind::Stream(_) => false,
        }
    }

    /// Peek the next frame of a representative leaf without consuming it.
    fn peek_leaf<'a>(&'a self) -> PortFuture<'a, Frame> {
        Box::pin(async move {
            match &self.kind {
                PortKind::Primitive(primitive) => primitive.queue.peek().await,
                PortKind::Map(subs) => {
                    let sub = subs
                        .values()
                        .find(|sub| sub.has_direct_leaf())
                        .or_else(|| subs.values().next());
                    match sub {
                        Some(sub) => sub.peek_leaf().await,
                        None => Err(SlangError::ValueMismatch(Box::new(self.def.clone()))),
                    }
                }
                PortKind::Stream(element) => element.peek_leaf().await,
            }
        })
    }

    /// Pull one frame at the level of this port.
    ///
    /// For a map port, a marker present on the leaves is propagated as a
    /// single marker; otherwise one element is collected from each sub-port
    /// in key order. For a stream port, the whole bracketed sequence is
    /// collected.
    pub fn pull_frame<'a>(&'a self) -> PortFuture<'a, Frame> {
        Box::pin(async move {
            match &self.kind {
                PortKind::Primitive(primitive) => primitive.queue.recv().await,
                PortKind::Map(subs) => match self.peek_leaf().await? {
                    Frame::Bos => {
                        self.pull_marker(Frame::Bos).await?;
                        Ok(Frame::Bos)
                    }
                    Frame::Eos => {
                        self.pull_marker(Frame::Eos).await?;
                        Ok(Frame::Eos)
                    }
                    Frame::Value(_) => {
                        let mut fields = BTreeMap::new();
                        for (key, sub) in subs {
                            match sub.pull_frame().await? {
                                Frame::Value(value) => {
                                    fields.insert(key.clone(), value);
                                }
                                marker => {
                                    return Err(SlangError::StreamFramingViolation(format!(
                                        "unexpected {:?} inside record on \"{}\"",
                                        marker, self.owner
                                    )));
                                }
                            }
                        }
                        Ok(Frame::Value(Value::Object(fields)))
                    }
                },
                PortKind::Stream(element) => {
                    self.pull_marker(Frame::Bos).await?;
                    let mut items = Vec::new();
                    loop {
                        if self.peek_leaf().await? == Frame::Eos {
                            self.pull_marker(Frame::Eos).await?;
                            break;
                        }
                        match element.pull_frame().await? {
                            Frame::Value(value) => items.push(value),
                            marker => {
                                return Err(SlangError::StreamFramingViolation(format!(
                                    "unexpected {:?} inside sequence on \"{}\"",
                                    marker, self.owner
                                )));
                            }
                        }
                    }
                    Ok(Frame::Value(Value::Array(items)))
                }
            }
        })
    }

    /// Push one value through this port.
    ///
    /// A map port fans an object out to its sub-ports by key; a stream
    /// port brackets an array between `BOS` and `EOS` markers.
    pub fn push<'a>(&'a self, value: Value) -> PortFuture<'a, ()> {
        Box::pin(async move {
            match &self.kind {
                PortKind::Primitive(_) => self.send_frame(Frame::Value(value)).await,
                PortKind::Map(subs) => {
                    let Value::Object(mut fields) = value else {
                        return Err(SlangError::ValueMismatch(Box::new(self.def.clone())));
                    };
                    if fields.len() != subs.len() {
                        return Err(SlangError::ValueMismatch(Box::new(self.def.clone())));
                    }
                    for (key, sub) in subs {
                        let Some(field) = fields.remove(key) else {
                            return Err(SlangError::ValueMismatch(Box::new(self.def.clone())));
                        };
                        sub.push(field).await?;
                    }
                    Ok(())
                }
                PortKind::Stream(element) => {
                    let Value::Array(items) = value else {
                        return Err(SlangError::ValueMismatch(Box::new(self.def.clone())));
                    };
                    self.send_marker(Frame::Bos).await?;
                    for item in items {
                        element.push(item).await?;
                    }
                    self.send_marker(Frame::Eos).await
                }
            }
        })
    }

    /// Pull one value from this port.
    ///
    /// A marker at this level is a framing violation; markers belong to
    /// enclosing stream ports.
    pub fn pull<'a>(&'a self) -> PortFuture<'a, Value> {
        Box::pin(async move {
            match self.pull_frame().await? {
                Frame::Value(value) => Ok(value),
                marker => Err(SlangError::StreamFramingViolation(format!(
                    "unexpected {:?} on \"{}\"",
                    marker, self.owner
                ))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(def: &PortDef, direction: Direction) -> Arc<Port> {
        let port = Port::from_def(def, direction, "test");
        port.bufferize();
        port
    }

    #[tokio::test]
    async fn primitive_roundtrip() {
        let p = port(&PortDef::Number, Direction::In);
        p.push(Value::from(1.5)).await.unwrap();
        assert_eq!(p.pull().await.unwrap(), Value::from(1.5));
    }

    #[tokio::test]
    async fn map_fans_out_and_reassembles() {
        let def = PortDef::map([("a", PortDef::Number), ("b", PortDef::String)]);
        let p = port(&def, Direction::In);

        p.push(Value::object([
            ("a", Value::from(1.0)),
            ("b", Value::from("x")),
        ]))
        .await
        .unwrap();

        // each sub-port carries its slice
        assert_eq!(p.map("a").unwrap().pull().await.unwrap(), Value::from(1.0));
        assert_eq!(p.map("b").unwrap().pull().await.unwrap(), Value::from("x"));
    }

    #[tokio::test]
    async fn map_push_rejects_key_mismatch() {
        let def = PortDef::map([("a", PortDef::Number)]);
        let p = port(&def, Direction::In);

        let missing = p.push(Value::object([("b", Value::from(1.0))])).await;
        assert!(matches!(missing, Err(SlangError::ValueMismatch(_))));

        let extra = p
            .push(Value::object([
                ("a", Value::from(1.0)),
                ("b", Value::from(2.0)),
            ]))
            .await;
        assert!(matches!(extra, Err(SlangError::ValueMismatch(_))));
    }

    #[tokio::test]
    async fn stream_brackets_sequence() {
        let def = PortDef::stream(PortDef::Number);
        let p = port(&def, Direction::In);

        p.push(Value::from(vec![1.0, 2.0, 3.0])).await.unwrap();

        // frames on the element port: BOS, 1, 2, 3, EOS
        let element = p.stream().unwrap();
        assert_eq!(element.pull_frame().await.unwrap(), Frame::Bos);
        for expected in [1.0, 2.0, 3.0] {
            assert_eq!(
                element.pull_frame().await.unwrap(),
                Frame::Value(Value::from(expected))
            );
        }
        assert_eq!(element.pull_frame().await.unwrap(), Frame::Eos);
    }

    #[tokio::test]
    async fn stream_pull_reconstructs_sequence() {
        let def = PortDef::stream(PortDef::Number);
        let p = port(&def, Direction::In);

        p.push(Value::from(vec![1.0, 2.0])).await.unwrap();
        assert_eq!(p.pull().await.unwrap(), Value::from(vec![1.0, 2.0]));
    }

    #[tokio::test]
    async fn nested_streams_nest_marker_pairs() {
        let def = PortDef::stream(PortDef::stream(PortDef::Number));
        let p = port(&def, Direction::In);

        let payload = Value::Array(vec![
            Value::from(vec![1.0]),
            Value::from(vec![2.0, 3.0]),
            Value::Array(vec![]),
        ]);
        p.push(payload.clone()).await.unwrap();
        assert_eq!(p.pull().await.unwrap(), payload);
    }

    #[tokio::test]
    async fn stream_of_maps_roundtrip() {
        let def = PortDef::stream(PortDef::map([("k", PortDef::Number)]));
        let p = port(&def, Direction::In);

        let payload = Value::Array(vec![
            Value::object([("k", Value::from(1.0))]),
            Value::object([("k", Value::from(2.0))]),
        ]);
        p.push(payload.clone()).await.unwrap();
        assert_eq!(p.pull().await.unwrap(), payload);
    }

    #[tokio::test]
    async fn map_pull_frame_propagates_markers() {
        let def = PortDef::stream(PortDef::map([("k", PortDef::Number)]));
        let p = port(&def, Direction::In);

        p.push(Value::Array(vec![Value::object([("k", Value::from(7.0))])]))
            .await
            .unwrap();

        let element = p.stream().unwrap();
        assert_eq!(element.pull_frame().await.unwrap(), Frame::Bos);
        assert_eq!(
            element.pull_frame().await.unwrap(),
            Frame::Value(Value::object([("k", Value::from(7.0))]))
        );
        assert_eq!(element.pull_frame().await.unwrap(), Frame::Eos);
    }

    #[tokio::test]
    async fn connect_requires_equal_descriptors() {
        let out = Port::from_def(&PortDef::Number, Direction::Out, "src");
        let sink = Port::from_def(&PortDef::String, Direction::In, "dst");
        assert!(matches!(
            out.connect(&sink),
            Err(SlangError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn connect_forwards_frames() {
        let out = Port::from_def(&PortDef::Number, Direction::Out, "src");
        let sink = port(&PortDef::Number, Direction::In);
        out.connect(&sink).unwrap();

        out.push(Value::from(9.0)).await.unwrap();
        assert_eq!(sink.pull().await.unwrap(), Value::from(9.0));
    }

    #[tokio::test]
    async fn broadcast_reaches_every_destination() {
        let out = Port::from_def(&PortDef::Number, Direction::Out, "src");
        let first = port(&PortDef::Number, Direction::In);
        let second = port(&PortDef::Number, Direction::In);
        out.connect(&first).unwrap();
        out.connect(&second).unwrap();

        out.push(Value::from(4.0)).await.unwrap();
        assert_eq!(first.pull().await.unwrap(), Value::from(4.0));
        assert_eq!(second.pull().await.unwrap(), Value::from(4.0));
    }

    #[tokio::test]
    async fn destination_accepts_single_source() {
        let a = Port::from_def(&PortDef::Number, Direction::Out, "a");
        let b = Port::from_def(&PortDef::Number, Direction::Out, "b");
        let sink = port(&PortDef::Number, Direction::In);

        a.connect(&sink).unwrap();
        assert!(matches!(
            b.connect(&sink),
            Err(SlangError::AlreadyConnected(_))
        ));
    }

    #[tokio::test]
    async fn forwarding_is_transitive() {
        // src -> boundary -> sink, mimicking a composite boundary port
        let src = Port::from_def(&PortDef::Number, Direction::Out, "src");
        let boundary = Port::from_def(&PortDef::Number, Direction::In, "composite");
        let sink = port(&PortDef::Number, Direction::In);

        src.connect(&boundary).unwrap();
        boundary.connect(&sink).unwrap();

        src.push(Value::from(3.0)).await.unwrap();
        assert_eq!(sink.pull().await.unwrap(), Value::from(3.0));
    }

    #[tokio::test]
    async fn pull_value_rejects_marker() {
        let def = PortDef::stream(PortDef::Number);
        let p = port(&def, Direction::In);
        p.push(Value::Array(vec![])).await.unwrap();

        let result = p.stream().unwrap().pull().await;
        assert!(matches!(
            result,
            Err(SlangError::StreamFramingViolation(_))
        ));
    }
}
