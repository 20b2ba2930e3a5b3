//! Engine facade.
//!
//! An [`Engine`] owns the worker thread. Every operation posts a message to
//! the worker's inbox and returns immediately; the worker applies them one
//! at a time in posting order. [`EngineHandle`] is the cloneable, send-only
//! half handed to adapters.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::audit::AuditSink;
use super::chain::DispatchChain;
use super::error::EngineError;
use super::listener::{EventListener, SourceKey};
use super::machine::State;
use super::stats::{EngineCounters, EngineStats};
use super::worker::{spawn_worker, Command, WorkerSettings};
use crate::builders::EngineBuilder;
use crate::infra::connectivity::ConnectivityHandle;
use crate::util::signal::ShutdownSignal;

/// How long [`Engine::destroy`] waits for the worker to exit.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Cloneable handle for submitting and withdrawing sources.
#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<Command>,
    counters: Arc<EngineCounters>,
    shutdown: Arc<ShutdownSignal>,
}

impl EngineHandle {
    /// Register `listener` under `key` and wake the scheduler if idle.
    ///
    /// Submitting a key that is still tracked is a no-op; the first listener
    /// stays bound until the source is withdrawn or found idle. A blank key
    /// is rejected with [`EngineError::InvalidConfig`] and never counted.
    pub fn submit(
        &self,
        key: impl Into<SourceKey>,
        listener: Arc<dyn EventListener>,
    ) -> Result<(), EngineError> {
        self.ensure_live()?;
        let key = key.into();
        if key.is_blank() {
            return Err(EngineError::InvalidConfig("blank source key".into()));
        }
        self.tx
            .send(Command::Submit { key, listener })
            .map_err(|_| EngineError::Destroyed)?;
        EngineCounters::bump(&self.counters.submitted);
        Ok(())
    }

    /// Remove the source registered under `key`.
    ///
    /// An in-flight dispatch for that source is not interrupted; its outcome
    /// is dropped and the cycle is released by the timeout guard.
    pub fn withdraw(&self, key: impl Into<SourceKey>) -> Result<(), EngineError> {
        self.ensure_live()?;
        self.tx
            .send(Command::Withdraw(key.into()))
            .map_err(|_| EngineError::Destroyed)
    }

    /// Scheduler state as last published by the worker.
    #[must_use]
    pub fn state(&self) -> State {
        self.counters.state()
    }

    /// Whether the engine has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shutdown.is_triggered()
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.shutdown.is_triggered() {
            Err(EngineError::Destroyed)
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    pub(crate) fn post(&self, command: Command) {
        let _ = self.tx.send(command);
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("state", &self.state())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Offline delivery scheduler.
///
/// Serializes dispatch across every submitted source: one dispatch in
/// flight at a time, sources served round-robin, failures retried after an
/// escalating back-off.
///
/// ```rust,ignore
/// use offline_dispatch::{Engine, EngineConfig};
///
/// let engine = Engine::builder(EngineConfig::default())
///     .connectivity_oracle(|| true)
///     .build()?;
/// engine.submit("uploads", listener)?;
/// engine.destroy()?;
/// ```
pub struct Engine {
    id: Uuid,
    handle: EngineHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
    connectivity: ConnectivityHandle,
}

impl Engine {
    /// Start configuring an engine.
    #[must_use]
    pub fn builder(config: crate::config::EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Spawn the worker and wait until its chain is built.
    pub(crate) fn launch<F>(
        thread_name: &str,
        settings: WorkerSettings,
        build_chain: F,
        connectivity: ConnectivityHandle,
        shutdown: Arc<ShutdownSignal>,
        audit: Option<Box<dyn AuditSink>>,
    ) -> Result<Self, EngineError>
    where
        F: FnOnce() -> Result<DispatchChain, EngineError> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let (tx, rx) = crossbeam_channel::unbounded();
        let counters = Arc::new(EngineCounters::default());
        let dispatch_timeout = settings.dispatch_timeout;
        let ladder_len = settings.backoff.len();

        let worker = spawn_worker(
            thread_name,
            settings,
            build_chain,
            tx.clone(),
            rx,
            Arc::clone(&counters),
            audit,
        )?;

        info!(
            engine_id = %id,
            thread = thread_name,
            dispatch_timeout_ms = dispatch_timeout.as_millis(),
            ladder_len,
            "Dispatch engine started"
        );

        Ok(Self {
            id,
            handle: EngineHandle {
                tx,
                counters,
                shutdown,
            },
            worker: Mutex::new(Some(worker)),
            connectivity,
        })
    }

    /// Unique id of this engine instance, used in logs.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Cloneable handle for adapters.
    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// See [`EngineHandle::submit`].
    pub fn submit(
        &self,
        key: impl Into<SourceKey>,
        listener: Arc<dyn EventListener>,
    ) -> Result<(), EngineError> {
        self.handle.submit(key, listener)
    }

    /// See [`EngineHandle::withdraw`].
    pub fn withdraw(&self, key: impl Into<SourceKey>) -> Result<(), EngineError> {
        self.handle.withdraw(key)
    }

    /// Handle for reporting network changes to the connectivity gate.
    #[must_use]
    pub fn connectivity(&self) -> ConnectivityHandle {
        self.connectivity.clone()
    }

    /// Scheduler state as last published by the worker.
    #[must_use]
    pub fn state(&self) -> State {
        self.handle.state()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.handle.counters.snapshot()
    }

    /// Tear the engine down and wait briefly for the worker to exit.
    ///
    /// Interrupts a blocked reachability wait. An in-flight dispatch is not
    /// cancelled; its outcome is discarded. Calling this again, or after the
    /// engine was dropped elsewhere, is a no-op.
    pub fn destroy(&self) -> Result<(), EngineError> {
        if self.handle.shutdown.is_triggered() {
            return Ok(());
        }
        info!(engine_id = %self.id, "Destroying dispatch engine");
        self.signal_destroy();

        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        if worker.thread().id() == thread::current().id() {
            debug!("Destroy requested from the worker thread, not joining");
            return Ok(());
        }

        let (tx, rx) = std::sync::mpsc::channel();
        let joiner = thread::spawn(move || {
            let _ = tx.send(worker.join().is_ok());
        });
        match rx.recv_timeout(JOIN_TIMEOUT) {
            Ok(true) => {
                debug!(engine_id = %self.id, "Worker joined");
                let _ = joiner.join();
                Ok(())
            }
            Ok(false) => {
                let _ = joiner.join();
                Err(EngineError::Internal("worker thread panicked".into()))
            }
            Err(_) => {
                warn!(engine_id = %self.id, "Worker did not exit within timeout, detaching");
                Ok(())
            }
        }
    }

    /// Whether the engine has been destroyed.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.handle.is_destroyed()
    }

    fn signal_destroy(&self) {
        self.handle.shutdown.trigger();
        let _ = self.handle.tx.send(Command::Destroy);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Signal only; joining here could hang on a stalled probe.
        if !self.handle.shutdown.is_triggered() {
            self.signal_destroy();
            debug!(engine_id = %self.id, "Engine dropped without destroy, worker detached");
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
