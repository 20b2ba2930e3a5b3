//! Keyed round-robin registry of work sources.
//!
//! Two structures cooperate: a map from key to listener, and a fair-order
//! queue of keys still to be served in the current sweep. Sources are only
//! ever referenced by key, so a withdrawn source can never be dispatched
//! through a dangling handle. When the queue runs dry a sweep asks every
//! listener whether it still has work, refills the queue with those that do
//! and prunes those that don't.
//!
//! The registry is owned by the worker thread and is not synchronized.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};

use super::listener::{EventListener, SourceKey};

/// Round-robin working set of sources.
#[derive(Default)]
pub struct EventRegistry {
    /// Key to listener binding.
    listeners: HashMap<SourceKey, Arc<dyn EventListener>>,
    /// Registration order, used to make sweeps deterministic.
    roster: Vec<SourceKey>,
    /// Keys still to be served in the current pass.
    order: VecDeque<SourceKey>,
    /// Key most recently returned by [`next`](Self::next).
    current: Option<SourceKey>,
}

impl EventRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source.
    ///
    /// Blank keys are ignored, and so is a key that is already tracked: its
    /// first listener stays bound. Otherwise the key is bound and queued
    /// for service.
    pub fn submit(&mut self, key: SourceKey, listener: Arc<dyn EventListener>) {
        if key.is_blank() {
            debug!("Ignoring submission with blank source key");
            return;
        }
        if self.listeners.contains_key(&key) {
            trace!(key = %key, "Source already tracked");
            return;
        }
        self.roster.push(key.clone());
        self.listeners.insert(key.clone(), listener);
        self.order.push_back(key);
    }

    /// Remove a source from every structure. Idempotent.
    pub fn withdraw(&mut self, key: &SourceKey) {
        self.order.retain(|k| k != key);
        self.roster.retain(|k| k != key);
        self.listeners.remove(key);
    }

    /// Whether any source has work.
    ///
    /// True straight away if keys are queued; otherwise listeners are asked
    /// in registration order until one reports work, pruning every listener
    /// found idle along the way.
    pub fn has_any_pending(&mut self) -> bool {
        if !self.order.is_empty() {
            return true;
        }
        let mut idle = Vec::new();
        let mut found = false;
        for key in &self.roster {
            match self.listeners.get(key) {
                Some(listener) if listener.has_pending() => {
                    found = true;
                    break;
                }
                _ => idle.push(key.clone()),
            }
        }
        for key in &idle {
            self.prune(key);
        }
        found
    }

    /// Pop the next key to serve, sweeping listeners when the queue is empty.
    ///
    /// The returned key becomes current until the next call.
    pub fn next(&mut self) -> Option<SourceKey> {
        if self.order.is_empty() {
            self.sweep();
        }
        self.current = self.order.pop_front();
        self.current.clone()
    }

    /// Listener bound to the current key, pulling a key first if none is current.
    ///
    /// Returns `None` when the current key was withdrawn in the meantime.
    pub fn listener_for_current(&mut self) -> Option<Arc<dyn EventListener>> {
        let key = match self.current.clone() {
            Some(key) => key,
            None => self.next()?,
        };
        self.listeners.get(&key).cloned()
    }

    /// Key most recently returned by [`next`](Self::next).
    #[must_use]
    pub const fn current(&self) -> Option<&SourceKey> {
        self.current.as_ref()
    }

    /// Whether `key` currently has a listener bound.
    #[must_use]
    pub fn contains(&self, key: &SourceKey) -> bool {
        self.listeners.contains_key(key)
    }

    /// Number of tracked sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no sources are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of keys waiting in the current pass.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.order.len()
    }

    /// Drop every source.
    pub fn clear(&mut self) {
        self.listeners.clear();
        self.roster.clear();
        self.order.clear();
        self.current = None;
    }

    /// Refill the fair-order queue with every source reporting work.
    fn sweep(&mut self) {
        let mut idle = Vec::new();
        for key in &self.roster {
            match self.listeners.get(key) {
                Some(listener) if listener.has_pending() => self.order.push_back(key.clone()),
                _ => idle.push(key.clone()),
            }
        }
        for key in &idle {
            self.prune(key);
        }
        trace!(queued = self.order.len(), pruned = idle.len(), "Registry sweep");
    }

    fn prune(&mut self, key: &SourceKey) {
        debug!(key = %key, "Pruning idle source");
        self.listeners.remove(key);
        self.roster.retain(|k| k != key);
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("roster", &self.roster)
            .field("order", &self.order)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}
