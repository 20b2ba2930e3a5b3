//! Scheduler states, events, and the pure transition function.
//!
//! ```text
//!   NORMAL --submit--> CHECKING --pending--> EXECUTING --success--> COMPLETED
//!     ^                   |  ^                 |    |                  |
//!     +------ idle -------+  |              fail  timeout              |
//!                            |                 v    v                  |
//!                            |              FAILED <-- TIMED_OUT       |
//!                            |                 |                       |
//!                            +-- timer --- DELAYING                    |
//!                            +-----------------------------------------+
//! ```
//!
//! [`transition`] decides what a single event does to the current state;
//! [`State::entry_effects`] lists what the worker performs on entering a
//! state. Neither performs I/O.

use serde::{Deserialize, Serialize};

use super::listener::DispatchId;

/// Engine-wide scheduler state. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum State {
    /// Idle; waiting for a submission.
    Normal = 0,
    /// Asking the registry whether any source has work.
    Checking = 1,
    /// One dispatch is in flight.
    Executing = 2,
    /// The in-flight dispatch succeeded.
    Completed = 3,
    /// The dispatch failed or was vetoed.
    Failed = 4,
    /// Waiting for the back-off timer before re-checking.
    Delaying = 5,
    /// The in-flight dispatch produced no outcome in time.
    TimedOut = 6,
    /// Torn down. Terminal.
    Destroyed = 7,
}

impl State {
    /// Decode the representation used for lock-free snapshots.
    #[must_use]
    pub const fn from_repr(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Normal,
            1 => Self::Checking,
            2 => Self::Executing,
            3 => Self::Completed,
            4 => Self::Failed,
            5 => Self::Delaying,
            6 => Self::TimedOut,
            7 => Self::Destroyed,
            _ => return None,
        })
    }

    /// Work the worker performs on entering this state, in order.
    #[must_use]
    pub const fn entry_effects(self) -> &'static [Effect] {
        match self {
            Self::Normal => &[],
            Self::Checking => &[Effect::CheckPending],
            Self::Executing => &[Effect::Dispatch],
            Self::Completed => &[Effect::CancelTimeout, Effect::Relax, Effect::Advance],
            Self::Failed => &[Effect::CancelTimeout, Effect::Escalate, Effect::Advance],
            Self::Delaying => &[Effect::ScheduleRetry],
            Self::TimedOut => &[Effect::Advance],
            Self::Destroyed => &[Effect::CancelTimeout, Effect::Teardown],
        }
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A source was submitted through the facade.
    Submitted,
    /// Result of the registry pending check.
    Checked {
        /// Whether any source reported work.
        pending: bool,
    },
    /// No source could be resolved or a gate vetoed the dispatch.
    Rejected,
    /// An adapter reported the result of a dispatch.
    Outcome {
        /// Dispatch the result belongs to.
        dispatch: DispatchId,
        /// Whether delivery succeeded.
        success: bool,
    },
    /// The timeout guard for a dispatch elapsed.
    TimeoutElapsed {
        /// Dispatch the guard was armed for.
        dispatch: DispatchId,
    },
    /// The back-off timer fired.
    RetryDue,
    /// A transient state finished its entry work.
    Advance,
    /// Teardown requested.
    Destroy,
}

/// Side effects the worker performs when entering a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Ask the registry for pending work; yields [`Event::Checked`].
    CheckPending,
    /// Pick the next source and run the precondition chain; yields
    /// [`Event::Rejected`] or arms the timeout guard.
    Dispatch,
    /// Disarm the timeout guard and forget the in-flight dispatch.
    CancelTimeout,
    /// Relax the back-off cursor by one rung.
    Relax,
    /// Take the back-off delay and escalate the cursor.
    Escalate,
    /// Arm the retry timer with the delay taken by [`Effect::Escalate`].
    ScheduleRetry,
    /// Yield [`Event::Advance`].
    Advance,
    /// Release registry, chain, and timers.
    Teardown,
}

/// Outcome of feeding one event to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Move to a new state and run its entry effects.
    Enter(State),
    /// Guarded no-op: the event does not apply to the current state.
    Ignore,
    /// The event cannot occur in the current state in correct operation.
    Unexpected,
}

/// Decide what `event` does in `state`.
///
/// `in_flight` is the dispatch currently awaiting an outcome, if any.
/// Outcomes and timeouts for any other dispatch are ignored, so whichever of
/// a racing timeout and outcome is processed first wins.
#[must_use]
pub const fn transition(state: State, in_flight: Option<DispatchId>, event: Event) -> Step {
    use State::{Checking, Completed, Delaying, Destroyed, Executing, Failed, Normal, TimedOut};

    if let State::Destroyed = state {
        return Step::Ignore;
    }
    match (state, event) {
        (_, Event::Destroy) => Step::Enter(Destroyed),

        (Normal, Event::Submitted) => Step::Enter(Checking),
        (_, Event::Submitted) => Step::Ignore,

        (Checking, Event::Checked { pending: true }) => Step::Enter(Executing),
        (Checking, Event::Checked { pending: false }) => Step::Enter(Normal),

        (Executing, Event::Rejected) => Step::Enter(Failed),

        (Executing | TimedOut, Event::Outcome { dispatch, success: true })
            if matches_in_flight(in_flight, dispatch) =>
        {
            Step::Enter(Completed)
        }
        (Executing, Event::Outcome { dispatch, success: false })
            if matches_in_flight(in_flight, dispatch) =>
        {
            Step::Enter(Failed)
        }
        (_, Event::Outcome { .. }) => Step::Ignore,

        (Executing, Event::TimeoutElapsed { dispatch }) if matches_in_flight(in_flight, dispatch) => {
            Step::Enter(TimedOut)
        }
        (_, Event::TimeoutElapsed { .. }) => Step::Ignore,

        (Delaying, Event::RetryDue) => Step::Enter(Checking),

        (TimedOut, Event::Advance) => Step::Enter(Failed),
        (Failed, Event::Advance) => Step::Enter(Delaying),
        (Completed, Event::Advance) => Step::Enter(Checking),

        _ => Step::Unexpected,
    }
}

const fn matches_in_flight(in_flight: Option<DispatchId>, dispatch: DispatchId) -> bool {
    match in_flight {
        Some(id) => id == dispatch,
        None => false,
    }
}
