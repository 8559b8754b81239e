//! Runtime operators and their lifecycle.
//!
//! An operator is either composite (a tree of named children wired
//! together) or builtin (a native worker loop). Every operator owns its
//! main in/out port pair, a map of delegates, and validated properties.
//!
//! `start` spawns one worker task per builtin, children first; `stop` is
//! idempotent and propagates depth-first, cancelling port queues so that
//! blocked pushes and pulls unwind with `Cancelled`. A running operator
//! must not be mutated; the builder finishes all wiring before `start`.

use crate::port::{Direction, Port};
use crate::registry::Builtin;
use parking_lot::{Mutex, RwLock};
use slang_core::{OperatorDef, Result, SlangError, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

/// A named side-channel on an operator.
///
/// The endpoints are reversed relative to the main pair: the environment
/// pushes responses into `input` and pulls requests from `output`, while
/// the owning operator's worker does the opposite.
pub struct Delegate {
    input: Arc<Port>,
    output: Arc<Port>,
}

impl Delegate {
    /// The delegate's in-port.
    pub fn input(&self) -> &Arc<Port> {
        &self.input
    }

    /// The delegate's out-port.
    pub fn output(&self) -> &Arc<Port> {
        &self.output
    }
}

/// A runtime operator instance.
pub struct Operator {
    name: String,
    parent: RwLock<Weak<Operator>>,
    children: RwLock<BTreeMap<String, Arc<Operator>>>,
    main_in: Arc<Port>,
    main_out: Arc<Port>,
    delegates: BTreeMap<String, Delegate>,
    properties: BTreeMap<String, Value>,
    builtin: Option<Arc<dyn Builtin>>,
    started: AtomicBool,
    stopped: AtomicBool,
    stop_notify: tokio::sync::Notify,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Operator {
    /// Create an operator from a saturated definition.
    ///
    /// Supplied properties are validated against the definition's property
    /// schema. Passing a builtin makes this a leaf operator whose worker
    /// is scheduled on `start`; without one the operator is composite and
    /// delegates all work to its children.
    pub fn new(
        name: &str,
        def: &OperatorDef,
        properties: BTreeMap<String, Value>,
        builtin: Option<Arc<dyn Builtin>>,
    ) -> Result<Arc<Operator>> {
        def.generics_specified()?;

        for (prop_name, prop_def) in &def.properties {
            let value = properties
                .get(prop_name)
                .ok_or_else(|| SlangError::MissingProperty(prop_name.clone()))?;
            value.check_property(prop_name, prop_def)?;
        }

        let delegates = def
            .delegates
            .iter()
            .map(|(delegate_name, delegate)| {
                (
                    delegate_name.clone(),
                    Delegate {
                        input: Port::from_def(&delegate.input, Direction::In, name),
                        output: Port::from_def(&delegate.output, Direction::Out, name),
                    },
                )
            })
            .collect();

        Ok(Arc::new(Operator {
            name: name.to_string(),
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(BTreeMap::new()),
            main_in: Port::from_def(&def.input, Direction::In, name),
            main_out: Port::from_def(&def.output, Direction::Out, name),
            delegates,
            properties,
            builtin,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stop_notify: tokio::sync::Notify::new(),
            workers: Mutex::new(Vec::new()),
        }))
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The main in-port.
    pub fn main_in(&self) -> &Arc<Port> {
        &self.main_in
    }

    /// The main out-port.
    pub fn main_out(&self) -> &Arc<Port> {
        &self.main_out
    }

    /// A delegate by name.
    pub fn delegate(&self, name: &str) -> Option<&Delegate> {
        self.delegates.get(name)
    }

    /// A child operator by instance name.
    pub fn child(&self, name: &str) -> Option<Arc<Operator>> {
        self.children.read().get(name).cloned()
    }

    /// The parent operator, while it is alive.
    pub fn parent(&self) -> Option<Arc<Operator>> {
        self.parent.read().upgrade()
    }

    /// A property value by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub(crate) fn builtin(&self) -> Option<&Arc<dyn Builtin>> {
        self.builtin.as_ref()
    }

    /// Attach a child, wiring its parent back-reference.
    pub(crate) fn add_child(self: &Arc<Self>, child: Arc<Operator>) {
        *child.parent.write() = Arc::downgrade(self);
        self.children.write().insert(child.name.clone(), child);
    }

    /// Whether `stop` has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolve once `stop` has been called.
    ///
    /// Workers that block on anything other than a port operation (e.g. a
    /// network accept loop) select on this to observe cancellation.
    pub async fn until_stopped(&self) {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            let notified = self.stop_notify.notified();
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    /// Start the operator: children first, then this operator's worker.
    ///
    /// Must be called within a tokio runtime. Calling `start` twice is a
    /// no-op.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        for child in self.children.read().values() {
            child.start();
        }

        if let Some(builtin) = &self.builtin {
            let operator = self.clone();
            let builtin = builtin.clone();
            let handle = tokio::spawn(async move {
                tracing::debug!(operator = %operator.name(), "worker started");
                match builtin.run(operator.clone()).await {
                    Ok(()) => {
                        tracing::debug!(operator = %operator.name(), "worker finished");
                    }
                    Err(err) if err.is_cancelled() => {
                        tracing::debug!(operator = %operator.name(), "worker cancelled");
                    }
                    Err(err) => {
                        tracing::error!(operator = %operator.name(), error = %err, "worker failed");
                        operator.stop();
                    }
                }
            });
            self.workers.lock().push(handle);
        }
    }

    /// Stop the operator and everything below it.
    ///
    /// Idempotent. Propagates depth-first through children and delegates,
    /// then cancels this operator's queues and the terminal queues its
    /// out-ports feed, so that downstream pulls report `Cancelled`.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(operator = %self.name, "stopping");

        for child in self.children.read().values() {
            child.stop();
        }

        for delegate in self.delegates.values() {
            delegate.input.cancel();
            delegate.output.cancel();
            delegate.output.cancel_downstream();
        }
        self.main_in.cancel();
        self.main_out.cancel();
        self.main_out.cancel_downstream();

        self.stop_notify.notify_waiters();
    }
}
