//! Buffered source adapter.
//!
//! [`BufferedSource`] turns a storage-backed [`PendingSource`] into an
//! [`EventListener`]. It keeps a batch of loaded items in memory and sends
//! the head item on every dispatch. When the batch is drained it reloads
//! from storage, resubmitting itself if more work appeared and withdrawing
//! otherwise.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::engine::EngineHandle;
use crate::core::listener::{EventListener, OutcomeSink, SourceKey};

/// Storage side of a buffered source.
pub trait PendingSource: Sized + Send + Sync + 'static {
    /// One unit of work.
    type Item: Clone + Send + 'static;

    /// Load the next batch of unsent items. An empty batch means no work.
    fn load(&self) -> Vec<Self::Item>;

    /// Send `item` and report through `outcome`, possibly from another
    /// thread. Must not block the caller.
    fn send(&self, item: Self::Item, outcome: ItemOutcome<Self>);
}

/// What happens to the head item when its send fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep the item and retry it after back-off.
    #[default]
    KeepOnFailure,
    /// Discard the item.
    DropOnFailure,
}

/// Options for a [`BufferedSource`].
#[derive(Debug, Clone, Default)]
pub struct BufferedOptions {
    /// Registration key; defaults to the source's type name.
    pub key: Option<SourceKey>,
    /// Failure handling for the head item.
    pub failure_policy: FailurePolicy,
    /// Discard an item after this many failed attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

struct Entry<T> {
    item: T,
    attempts: u32,
}

struct Shared<S: PendingSource> {
    me: Weak<Self>,
    source: S,
    buffer: Mutex<VecDeque<Entry<S::Item>>>,
    /// Serializes reloads so a stale empty load cannot clobber a newer batch.
    reloading: Mutex<()>,
    engine: EngineHandle,
    key: SourceKey,
    failure_policy: FailurePolicy,
    max_attempts: Option<u32>,
}

/// Adapter serving a [`PendingSource`] through the engine.
pub struct BufferedSource<S: PendingSource> {
    shared: Arc<Shared<S>>,
}

impl<S: PendingSource> Clone for BufferedSource<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: PendingSource> BufferedSource<S> {
    /// Adapter with default options.
    pub fn new(source: S, engine: EngineHandle) -> Self {
        Self::with_options(source, engine, BufferedOptions::default())
    }

    /// Adapter with explicit options.
    pub fn with_options(source: S, engine: EngineHandle, options: BufferedOptions) -> Self {
        let key = options.key.unwrap_or_else(SourceKey::of::<S>);
        let shared = Arc::new_cyclic(|me| Shared {
            me: me.clone(),
            source,
            buffer: Mutex::new(VecDeque::new()),
            reloading: Mutex::new(()),
            engine,
            key,
            failure_policy: options.failure_policy,
            max_attempts: options.max_attempts,
        });
        Self { shared }
    }

    /// Load the first batch and register with the engine.
    pub fn start(&self) {
        self.shared.reload();
    }

    /// Reload from storage if the buffer is drained; otherwise the new items
    /// are picked up when the current batch runs out.
    pub fn notify_new_items(&self) {
        if self.shared.buffer.lock().is_empty() {
            self.shared.reload();
        }
    }

    /// Withdraw from the engine and drop buffered items.
    pub fn shutdown(&self) {
        if let Err(e) = self.shared.engine.withdraw(self.shared.key.clone()) {
            debug!(key = %self.shared.key, error = %e, "Withdraw on shutdown skipped");
        }
        self.shared.buffer.lock().clear();
    }

    /// Registration key.
    #[must_use]
    pub fn key(&self) -> &SourceKey {
        &self.shared.key
    }

    /// Number of buffered items.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    /// Underlying source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.shared.source
    }
}

impl<S: PendingSource> Shared<S> {
    fn reload(&self) {
        let _reloading = self.reloading.lock();
        let items = self.source.load();
        let loaded = items.len();
        {
            let mut buffer = self.buffer.lock();
            buffer.clear();
            buffer.extend(items.into_iter().map(|item| Entry { item, attempts: 0 }));
        }

        let result = if loaded == 0 {
            self.engine.withdraw(self.key.clone())
        } else {
            match self.me.upgrade() {
                Some(me) => self.engine.submit(self.key.clone(), me),
                None => return,
            }
        };
        match result {
            Ok(()) => debug!(key = %self.key, loaded, "Source reloaded"),
            Err(e) => debug!(key = %self.key, error = %e, "Engine unavailable, reload not registered"),
        }
    }

    fn on_success(&self, sink: OutcomeSink) {
        let drained = {
            let mut buffer = self.buffer.lock();
            buffer.pop_front();
            buffer.is_empty()
        };
        sink.success();
        if drained {
            self.reload();
        }
    }

    fn on_failure(&self, sink: OutcomeSink) {
        {
            let mut buffer = self.buffer.lock();
            if let Some(head) = buffer.front() {
                let exhausted = self.max_attempts.is_some_and(|max| head.attempts >= max);
                if self.failure_policy == FailurePolicy::DropOnFailure || exhausted {
                    warn!(key = %self.key, attempts = head.attempts, "Dropping item after failed send");
                    buffer.pop_front();
                }
            }
        }
        sink.failure();
    }
}

impl<S: PendingSource> EventListener for Shared<S> {
    fn has_pending(&self) -> bool {
        !self.buffer.lock().is_empty()
    }

    fn dispatch(&self, sink: OutcomeSink) {
        let head = self.buffer.lock().front_mut().map(|entry| {
            entry.attempts += 1;
            entry.item.clone()
        });
        match (head, self.me.upgrade()) {
            (Some(item), Some(shared)) => self.source.send(item, ItemOutcome { shared, sink }),
            _ => sink.failure(),
        }
    }
}

/// Reports the result of sending one item. Consumed on use.
#[must_use = "an unreported item is only released by the engine timeout"]
pub struct ItemOutcome<S: PendingSource> {
    shared: Arc<Shared<S>>,
    sink: OutcomeSink,
}

impl<S: PendingSource> ItemOutcome<S> {
    /// The item was delivered.
    pub fn success(self) {
        self.shared.on_success(self.sink);
    }

    /// The item was not delivered.
    pub fn failure(self) {
        self.shared.on_failure(self.sink);
    }
}

impl<S: PendingSource> std::fmt::Debug for ItemOutcome<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemOutcome")
            .field("key", &self.shared.key)
            .field("sink", &self.sink)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::chain::DispatchChain;
    use crate::core::engine::Engine;
    use crate::core::machine::State;
    use crate::infra::send::SendGate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Store {
        unsent: Mutex<Vec<u32>>,
        sent: Mutex<Vec<u32>>,
        attempts: AtomicUsize,
        loads: AtomicUsize,
        fail: bool,
    }

    impl Store {
        fn with(items: &[u32], fail: bool) -> Self {
            Self {
                unsent: Mutex::new(items.to_vec()),
                fail,
                ..Self::default()
            }
        }
    }

    impl PendingSource for Store {
        type Item = u32;

        fn load(&self) -> Vec<u32> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            std::mem::take(&mut *self.unsent.lock())
        }

        fn send(&self, item: u32, outcome: ItemOutcome<Self>) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                outcome.failure();
            } else {
                self.sent.lock().push(item);
                outcome.success();
            }
        }
    }

    fn engine() -> Engine {
        let config = EngineConfig {
            backoff_ladder_ms: vec![5, 5],
            ..EngineConfig::default()
        };
        Engine::builder(config)
            .custom_chain(DispatchChain::new().with_gate(SendGate))
            .build()
            .unwrap()
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_drains_batch_then_withdraws() {
        let engine = engine();
        let source = BufferedSource::new(Store::with(&[1, 2, 3], false), engine.handle());
        source.start();

        assert!(wait_until(|| source.source().sent.lock().len() == 3));
        assert_eq!(*source.source().sent.lock(), vec![1, 2, 3]);
        assert!(wait_until(|| engine.state() == State::Normal));
        assert_eq!(source.buffered(), 0);
        engine.destroy().unwrap();
    }

    #[test]
    fn test_reload_picks_up_new_batch() {
        let engine = engine();
        let source = BufferedSource::new(Store::with(&[1], false), engine.handle());
        source.start();
        assert!(wait_until(|| source.source().sent.lock().len() == 1));
        // Drained batch triggers a second, empty load.
        assert!(wait_until(|| source.source().loads.load(Ordering::SeqCst) == 2));

        source.source().unsent.lock().extend([2, 3]);
        source.notify_new_items();
        assert!(wait_until(|| source.source().sent.lock().len() == 3));
        engine.destroy().unwrap();
    }

    #[test]
    fn test_drop_on_failure_discards_items() {
        let engine = engine();
        let options = BufferedOptions {
            failure_policy: FailurePolicy::DropOnFailure,
            ..BufferedOptions::default()
        };
        let source =
            BufferedSource::with_options(Store::with(&[1, 2], true), engine.handle(), options);
        source.start();

        assert!(wait_until(|| source.buffered() == 0));
        assert_eq!(source.source().attempts.load(Ordering::SeqCst), 2);
        engine.destroy().unwrap();
    }

    #[test]
    fn test_attempt_cap_discards_poison_item() {
        let engine = engine();
        let options = BufferedOptions {
            max_attempts: Some(3),
            ..BufferedOptions::default()
        };
        let source =
            BufferedSource::with_options(Store::with(&[9], true), engine.handle(), options);
        source.start();

        assert!(wait_until(|| source.buffered() == 0));
        assert_eq!(source.source().attempts.load(Ordering::SeqCst), 3);
        engine.destroy().unwrap();
    }

    #[test]
    fn test_notify_ignored_while_buffer_non_empty() {
        let engine = engine();
        engine.destroy().unwrap();
        let source = BufferedSource::new(Store::with(&[1, 2], false), engine.handle());
        source.start();
        assert_eq!(source.buffered(), 2);

        source.notify_new_items();
        assert_eq!(source.source().loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_clears_buffer() {
        let engine = engine();
        engine.destroy().unwrap();
        let source = BufferedSource::new(Store::with(&[1, 2], false), engine.handle());
        source.start();
        source.shutdown();
        assert_eq!(source.buffered(), 0);
    }
}
