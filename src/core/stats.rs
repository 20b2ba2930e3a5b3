//! Lock-free engine counters and their snapshot.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

use serde::Serialize;

use super::machine::State;

/// Point-in-time view of engine activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Submissions with a non-blank key accepted by the facade.
    pub submitted: u64,
    /// Dispatches handed to an adapter.
    pub dispatched: u64,
    /// Dispatches that completed successfully.
    pub completed: u64,
    /// Failures, including vetoes and timeouts.
    pub failed: u64,
    /// Dispatches that produced no outcome in time.
    pub timed_out: u64,
    /// Outcomes ignored because they arrived late or for a withdrawn source.
    pub stale_outcomes: u64,
    /// Back-off cursor position.
    pub retry_cursor: usize,
}

/// Counters shared between the worker (writer) and the facade (reader).
#[derive(Debug)]
pub(crate) struct EngineCounters {
    pub state: AtomicU8,
    pub submitted: AtomicU64,
    pub dispatched: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub timed_out: AtomicU64,
    pub stale_outcomes: AtomicU64,
    pub retry_cursor: AtomicUsize,
}

impl Default for EngineCounters {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(State::Normal as u8),
            submitted: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            stale_outcomes: AtomicU64::new(0),
            retry_cursor: AtomicUsize::new(0),
        }
    }
}

impl EngineCounters {
    pub fn state(&self) -> State {
        State::from_repr(self.state.load(Ordering::Acquire)).unwrap_or(State::Destroyed)
    }

    pub fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            stale_outcomes: self.stale_outcomes.load(Ordering::Relaxed),
            retry_cursor: self.retry_cursor.load(Ordering::Relaxed),
        }
    }
}
