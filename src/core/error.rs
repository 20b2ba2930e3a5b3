//! Error types for engine operations.

use thiserror::Error;

/// Errors produced by the dispatch engine.
///
/// Dispatch failures never surface here: they are absorbed by the state
/// machine and retried. These errors cover construction and misuse.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// The default reachability probe could not be initialized.
    #[error("probe initialization failed: {0}")]
    Probe(String),
    /// The engine has been destroyed and no longer accepts work.
    #[error("engine destroyed")]
    Destroyed,
    /// Internal failure (worker vanished, handshake lost, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}
