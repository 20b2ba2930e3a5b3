//! Scheduling core: registry, state machine, chain, and worker.

pub mod audit;
pub mod backoff;
pub mod chain;
pub mod engine;
pub mod error;
pub mod listener;
pub mod machine;
pub mod registry;
pub mod stats;
pub(crate) mod worker;

pub use audit::{build_transition_record, AuditSink, Cause, InMemoryAuditSink, TransitionRecord};
pub use backoff::{Backoff, DEFAULT_LADDER_MS};
pub use chain::{DispatchChain, DispatchContext, Gate};
pub use engine::{Engine, EngineHandle};
pub use error::EngineError;
pub use listener::{DispatchId, EventListener, OutcomeSink, SourceKey};
pub use machine::{transition, Effect, Event, State, Step};
pub use registry::EventRegistry;
pub use stats::EngineStats;
