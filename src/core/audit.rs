//! Audit sinks for scheduler state transitions.
//!
//! The worker records one [`TransitionRecord`] per state change. The
//! in-memory sink keeps a bounded tail of them for tests and diagnostics.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::machine::{Event, State};
use crate::util::clock::now_ms;

/// What caused a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    /// A source was submitted.
    Submitted,
    /// Registry pending check finished.
    Checked,
    /// Dispatch rejected before reaching an adapter.
    Rejected,
    /// Adapter reported success.
    Succeeded,
    /// Adapter reported failure.
    Failed,
    /// Timeout guard elapsed.
    Timeout,
    /// Back-off timer fired.
    RetryDue,
    /// Transient state advanced.
    Advance,
    /// Forced recovery after an unexpected event.
    Recovery,
    /// Teardown.
    Destroy,
}

impl From<Event> for Cause {
    fn from(event: Event) -> Self {
        match event {
            Event::Submitted => Self::Submitted,
            Event::Checked { .. } => Self::Checked,
            Event::Rejected => Self::Rejected,
            Event::Outcome { success: true, .. } => Self::Succeeded,
            Event::Outcome { success: false, .. } => Self::Failed,
            Event::TimeoutElapsed { .. } => Self::Timeout,
            Event::RetryDue => Self::RetryDue,
            Event::Advance => Self::Advance,
            Event::Destroy => Self::Destroy,
        }
    }
}

/// One recorded state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRecord {
    /// Sequence number, starting at zero per engine.
    pub seq: u64,
    /// State left.
    pub from: State,
    /// State entered.
    pub to: State,
    /// Why.
    pub cause: Cause,
    /// Wall-clock timestamp in milliseconds since epoch.
    pub at_ms: u128,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record a transition.
    fn record(&mut self, record: TransitionRecord);
}

/// Bounded in-memory sink. Clones share the same buffer.
#[derive(Clone)]
pub struct InMemoryAuditSink {
    records: Arc<Mutex<VecDeque<TransitionRecord>>>,
    max_records: usize,
}

impl InMemoryAuditSink {
    /// Create a sink keeping at most `max_records` (oldest dropped first).
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(VecDeque::with_capacity(max_records.min(1024)))),
            max_records: max_records.max(1),
        }
    }

    /// Snapshot of stored records.
    #[must_use]
    pub fn records(&self) -> Vec<TransitionRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Entered states in order.
    #[must_use]
    pub fn states(&self) -> Vec<State> {
        self.records.lock().iter().map(|r| r.to).collect()
    }

    /// Drop every stored record.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, record: TransitionRecord) {
        let mut records = self.records.lock();
        if records.len() >= self.max_records {
            records.pop_front();
        }
        records.push_back(record);
    }
}

impl std::fmt::Debug for InMemoryAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAuditSink")
            .field("len", &self.records.lock().len())
            .field("max_records", &self.max_records)
            .finish()
    }
}

/// Helper to build a record stamped with the current time.
#[must_use]
pub fn build_transition_record(seq: u64, from: State, to: State, cause: Cause) -> TransitionRecord {
    TransitionRecord {
        seq,
        from,
        to,
        cause,
        at_ms: now_ms(),
    }
}
