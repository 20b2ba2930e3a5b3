//! Reusable per-source adapters.

pub mod buffered;

pub use buffered::{BufferedOptions, BufferedSource, FailurePolicy, ItemOutcome, PendingSource};
