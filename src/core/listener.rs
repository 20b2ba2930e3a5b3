//! Source keys, per-source listeners, and the outcome sink handed to a dispatch.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::Sender;
use tracing::debug;

use super::worker::Command;

/// Identifier of a single dispatch attempt.
///
/// Ids increase monotonically per engine; an outcome carrying an id other
/// than the one in flight is stale and ignored.
pub type DispatchId = u64;

/// Opaque, caller-chosen identifier naming one registered work source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(Arc<str>);

impl SourceKey {
    /// Create a key from any string-like value.
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// Key derived from a type name, the conventional choice for adapters.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self(Arc::from(std::any::type_name::<T>()))
    }

    /// Borrow the key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Per-source capability pair supplied by an adapter at submission time.
///
/// Both methods are called on the engine's worker thread. Neither may block
/// for long: a slow `has_pending` stalls every source, and `dispatch` must
/// hand the real send off and report later through the sink.
pub trait EventListener: Send + Sync + 'static {
    /// Whether this source still has work. Must be side-effect free.
    fn has_pending(&self) -> bool;

    /// Start sending one item and eventually report exactly one outcome.
    ///
    /// The sink may be moved to another thread. Dropping it without
    /// reporting leaves the cycle pinned until the engine's timeout fires.
    fn dispatch(&self, sink: OutcomeSink);
}

/// Channel through which an adapter reports the result of one dispatch.
///
/// Consumed by [`success`](Self::success) or [`failure`](Self::failure), so
/// each dispatch can be reported at most once.
#[must_use = "an unreported dispatch is only released by the engine timeout"]
pub struct OutcomeSink {
    tx: Sender<Command>,
    dispatch: DispatchId,
}

impl OutcomeSink {
    pub(crate) const fn new(tx: Sender<Command>, dispatch: DispatchId) -> Self {
        Self { tx, dispatch }
    }

    /// Dispatch id this sink reports for.
    #[must_use]
    pub const fn dispatch_id(&self) -> DispatchId {
        self.dispatch
    }

    /// Report that the item was delivered.
    pub fn success(self) {
        self.report(true);
    }

    /// Report that the attempt failed and should be retried later.
    pub fn failure(self) {
        self.report(false);
    }

    fn report(self, success: bool) {
        let outcome = Command::Outcome {
            dispatch: self.dispatch,
            success,
        };
        if self.tx.send(outcome).is_err() {
            debug!(dispatch = self.dispatch, success, "Engine gone, outcome discarded");
        }
    }
}

impl fmt::Debug for OutcomeSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeSink")
            .field("dispatch", &self.dispatch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    struct Probe;

    #[test]
    fn test_key_of_type_uses_type_name() {
        let key = SourceKey::of::<Probe>();
        assert!(key.as_str().ends_with("Probe"));
        assert_eq!(key, SourceKey::of::<Probe>());
    }

    #[test]
    fn test_blank_keys() {
        assert!(SourceKey::from("").is_blank());
        assert!(SourceKey::from("   ").is_blank());
        assert!(!SourceKey::from("users").is_blank());
    }

    #[test]
    fn test_sink_posts_tagged_outcome() {
        let (tx, rx) = unbounded();
        OutcomeSink::new(tx.clone(), 7).success();
        OutcomeSink::new(tx, 8).failure();

        match rx.try_recv().unwrap() {
            Command::Outcome { dispatch, success } => {
                assert_eq!(dispatch, 7);
                assert!(success);
            }
            _ => panic!("expected outcome"),
        }
        match rx.try_recv().unwrap() {
            Command::Outcome { dispatch, success } => {
                assert_eq!(dispatch, 8);
                assert!(!success);
            }
            _ => panic!("expected outcome"),
        }
    }

    #[test]
    fn test_sink_tolerates_closed_engine() {
        let (tx, rx) = unbounded();
        drop(rx);
        OutcomeSink::new(tx, 1).success();
    }
}
