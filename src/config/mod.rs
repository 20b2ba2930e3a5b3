//! Engine configuration.

pub mod engine;

pub use engine::{EngineConfig, ENV_PREFIX};
