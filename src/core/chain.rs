//! Dispatch precondition chain.
//!
//! A chain is an ordered list of [`Gate`]s. Each gate may veto the dispatch
//! by returning `false`; the first veto halts the chain. The default chain is
//! connectivity, then endpoint reachability, then the actual send (see
//! [`crate::infra`]), but callers may compose their own.

use std::sync::Arc;

use tracing::{debug, trace};

use super::listener::{DispatchId, EventListener, OutcomeSink};
use super::registry::EventRegistry;

/// One stage of the precondition chain.
pub trait Gate: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Run the stage. Returning `false` halts the chain as a failure.
    fn execute(&mut self, ctx: &mut DispatchContext<'_>) -> bool;

    /// Release resources held by the stage.
    fn teardown(&mut self) {}
}

/// What a gate may see of the dispatch being attempted.
pub struct DispatchContext<'a> {
    registry: &'a mut EventRegistry,
    sink: Option<OutcomeSink>,
}

impl<'a> DispatchContext<'a> {
    pub(crate) fn new(registry: &'a mut EventRegistry, sink: OutcomeSink) -> Self {
        Self {
            registry,
            sink: Some(sink),
        }
    }

    /// Listener of the source selected for this dispatch, if still registered.
    pub fn current_listener(&mut self) -> Option<Arc<dyn EventListener>> {
        self.registry.listener_for_current()
    }

    /// Take the outcome sink. Only the first call gets it.
    pub fn take_sink(&mut self) -> Option<OutcomeSink> {
        self.sink.take()
    }

    /// Id of the dispatch being attempted.
    #[must_use]
    pub fn dispatch_id(&self) -> Option<DispatchId> {
        self.sink.as_ref().map(OutcomeSink::dispatch_id)
    }
}

/// Ordered pipeline of gates.
#[derive(Default)]
pub struct DispatchChain {
    gates: Vec<Box<dyn Gate>>,
}

impl DispatchChain {
    /// Create an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a gate.
    #[must_use]
    pub fn with_gate(mut self, gate: impl Gate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    /// Append a boxed gate.
    pub fn push(&mut self, gate: Box<dyn Gate>) {
        self.gates.push(gate);
    }

    /// Number of gates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// Whether the chain has no gates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Gate names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Run every gate in order.
    ///
    /// The last gate's result is the chain's result; an empty chain fails
    /// because nothing was dispatched.
    pub fn execute(&mut self, ctx: &mut DispatchContext<'_>) -> bool {
        if self.gates.is_empty() {
            debug!("Empty dispatch chain, nothing to run");
            return false;
        }
        for gate in &mut self.gates {
            if !gate.execute(ctx) {
                debug!(gate = gate.name(), "Gate vetoed dispatch");
                return false;
            }
            trace!(gate = gate.name(), "Gate passed");
        }
        true
    }

    /// Tear down every gate in order.
    pub fn teardown(&mut self) {
        for gate in &mut self.gates {
            gate.teardown();
        }
    }
}

impl std::fmt::Debug for DispatchChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchChain")
            .field("gates", &self.names())
            .finish()
    }
}
