//! # Offline Dispatch
//!
//! A single-flight scheduler for delivering work that piled up while a
//! device was offline.
//!
//! Any number of independently registered *sources* (for example tables of
//! unsent records) are served by one cooperative worker thread:
//!
//! - **Single-flight**: at most one dispatch is in progress engine-wide.
//! - **Fair rotation**: sources are served round-robin, one item per visit,
//!   so a large backlog cannot starve the others.
//! - **Gated dispatch**: every attempt passes a precondition chain
//!   (network connectivity, endpoint reachability, then the send itself).
//! - **Escalating back-off**: failures wait on a ladder of delays that
//!   relaxes one rung per success.
//! - **Timeout guard**: a dispatch that never reports is failed after a
//!   configurable timeout.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use offline_dispatch::{Engine, EngineConfig, EventListener, OutcomeSink};
//!
//! struct Uploads;
//!
//! impl EventListener for Uploads {
//!     fn has_pending(&self) -> bool { true }
//!     fn dispatch(&self, sink: OutcomeSink) {
//!         std::thread::spawn(move || sink.success());
//!     }
//! }
//!
//! let engine = Engine::builder(EngineConfig {
//!     base_endpoint: Some("https://api.example.com".into()),
//!     ..EngineConfig::default()
//! })
//! .build()?;
//! engine.submit("uploads", Arc::new(Uploads))?;
//! ```
//!
//! For storage-backed sources, see [`adapter::BufferedSource`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Reusable adapters between storage and the engine.
pub mod adapter;
/// Builders to construct an engine from configuration.
pub mod builders;
/// Configuration models and loaders.
pub mod config;
/// Scheduling core: registry, state machine, chain, worker, and facade.
pub mod core;
/// Built-in dispatch gates and reachability probes.
pub mod infra;
/// Shared utilities.
pub mod util;

pub use crate::adapter::{BufferedOptions, BufferedSource, FailurePolicy, ItemOutcome, PendingSource};
pub use crate::builders::EngineBuilder;
pub use crate::config::EngineConfig;
pub use crate::core::{
    DispatchChain, DispatchContext, Engine, EngineError, EngineHandle, EngineStats, EventListener,
    Gate, OutcomeSink, SourceKey, State,
};
pub use crate::infra::{ConnectivityHandle, ConnectivityOracle};
