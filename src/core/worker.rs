//! Single-threaded worker loop driving the scheduler state machine.
//!
//! The worker owns every piece of scheduling state: the registry, the chain,
//! the back-off cursor, and the timers. Other threads reach it only by
//! posting a [`Command`] into its private FIFO inbox, so no locks guard any
//! of that state.
//!
//! Timers live inside the worker as well. The loop waits on the inbox until
//! the nearest deadline (retry timer or timeout guard) and fires due timers
//! as events. Transient states advance within the same message, so a state
//! visible between messages is always one of `NORMAL`, `EXECUTING`,
//! `DELAYING` or `DESTROYED`.
//!
//! The reachability gate may block this thread; while it does, every
//! command simply waits in the inbox.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, trace};

use super::audit::{build_transition_record, AuditSink, Cause};
use super::backoff::Backoff;
use super::chain::{DispatchChain, DispatchContext};
use super::error::EngineError;
use super::listener::{DispatchId, EventListener, OutcomeSink, SourceKey};
use super::machine::{transition, Effect, Event, State, Step};
use super::registry::EventRegistry;
use super::stats::EngineCounters;

/// Messages accepted by the worker inbox.
pub(crate) enum Command {
    /// Register a source and nudge the state machine.
    Submit {
        key: SourceKey,
        listener: Arc<dyn EventListener>,
    },
    /// Remove a source.
    Withdraw(SourceKey),
    /// Outcome reported through an [`OutcomeSink`].
    Outcome { dispatch: DispatchId, success: bool },
    /// Feed a raw event to the machine.
    #[cfg(test)]
    Inject(Event),
    /// Tear everything down and exit the loop.
    Destroy,
}

/// Deadlines owned by the worker.
#[derive(Debug, Default)]
pub(crate) struct Timers {
    retry_at: Option<Instant>,
    timeout: Option<(Instant, DispatchId)>,
}

impl Timers {
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.retry_at, self.timeout.map(|(at, _)| at)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn arm_retry(&mut self, at: Instant) {
        self.retry_at = Some(at);
    }

    pub fn arm_timeout(&mut self, at: Instant, dispatch: DispatchId) {
        self.timeout = Some((at, dispatch));
    }

    pub fn cancel_timeout(&mut self) {
        self.timeout = None;
    }

    pub fn clear(&mut self) {
        self.retry_at = None;
        self.timeout = None;
    }

    /// Remove and return the events of every timer due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<Event> {
        let mut due = Vec::new();
        if let Some((at, dispatch)) = self.timeout {
            if at <= now {
                self.timeout = None;
                due.push(Event::TimeoutElapsed { dispatch });
            }
        }
        if let Some(at) = self.retry_at {
            if at <= now {
                self.retry_at = None;
                due.push(Event::RetryDue);
            }
        }
        due
    }
}

/// Worker-side settings.
#[derive(Debug, Clone)]
pub(crate) struct WorkerSettings {
    pub dispatch_timeout: Duration,
    pub backoff: Backoff,
}

/// State owned by the worker thread.
pub(crate) struct Worker {
    state: State,
    registry: EventRegistry,
    chain: DispatchChain,
    backoff: Backoff,
    timers: Timers,
    dispatch_timeout: Duration,
    in_flight: Option<DispatchId>,
    last_dispatch: DispatchId,
    retry_delay: Duration,
    tx: Sender<Command>,
    counters: Arc<EngineCounters>,
    audit: Option<Box<dyn AuditSink>>,
    audit_seq: u64,
}

impl Worker {
    pub fn new(
        settings: WorkerSettings,
        chain: DispatchChain,
        tx: Sender<Command>,
        counters: Arc<EngineCounters>,
        audit: Option<Box<dyn AuditSink>>,
    ) -> Self {
        counters.set_state(State::Normal);
        Self {
            state: State::Normal,
            registry: EventRegistry::new(),
            chain,
            backoff: settings.backoff,
            timers: Timers::default(),
            dispatch_timeout: settings.dispatch_timeout,
            in_flight: None,
            last_dispatch: 0,
            retry_delay: Duration::ZERO,
            tx,
            counters,
            audit,
            audit_seq: 0,
        }
    }

    #[cfg(test)]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Drain the inbox until destroyed or every sender is gone.
    pub fn run(mut self, rx: &Receiver<Command>) {
        debug!(gates = ?self.chain.names(), "Worker loop started");
        while self.state != State::Destroyed {
            let received = match self.timers.next_deadline() {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(command) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Worker inbox closed");
                    self.handle_event(Event::Destroy);
                    break;
                }
            }
            self.fire_due_timers(Instant::now());
        }
        debug!("Worker loop exited");
    }

    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::Submit { key, listener } => {
                if self.state == State::Destroyed {
                    return;
                }
                trace!(key = %key, "Source submitted");
                self.registry.submit(key, listener);
                self.handle_event(Event::Submitted);
            }
            Command::Withdraw(key) => {
                trace!(key = %key, "Source withdrawn");
                self.registry.withdraw(&key);
            }
            Command::Outcome { dispatch, success } => {
                if self.in_flight == Some(dispatch) && !self.current_source_registered() {
                    debug!(dispatch, success, "Outcome for withdrawn source dropped");
                    EngineCounters::bump(&self.counters.stale_outcomes);
                    return;
                }
                self.handle_event(Event::Outcome { dispatch, success });
            }
            #[cfg(test)]
            Command::Inject(event) => self.handle_event(event),
            Command::Destroy => self.handle_event(Event::Destroy),
        }
    }

    pub fn fire_due_timers(&mut self, now: Instant) {
        for event in self.timers.take_due(now) {
            self.handle_event(event);
        }
    }

    /// Feed an event and every follow-up it yields to the machine.
    fn handle_event(&mut self, event: Event) {
        let mut next = Some(event);
        while let Some(event) = next.take() {
            next = match transition(self.state, self.in_flight, event) {
                Step::Enter(to) => self.enter(to, Cause::from(event)),
                Step::Ignore => {
                    if let Event::Outcome { dispatch, success } = event {
                        debug!(dispatch, success, state = ?self.state, "Stale outcome ignored");
                        EngineCounters::bump(&self.counters.stale_outcomes);
                    } else {
                        trace!(?event, state = ?self.state, "Event ignored");
                    }
                    None
                }
                Step::Unexpected => self.recover(event),
            };
        }
    }

    /// Force one pass through `COMPLETED` after an impossible event.
    fn recover(&mut self, event: Event) -> Option<Event> {
        if self.state == State::Completed {
            error!(?event, "Unexpected event during recovery, dropping");
            return None;
        }
        error!(?event, state = ?self.state, "Unexpected event, forcing completion");
        self.enter(State::Completed, Cause::Recovery)
    }

    fn enter(&mut self, to: State, cause: Cause) -> Option<Event> {
        let from = self.state;
        self.state = to;
        self.counters.set_state(to);
        debug!(from = ?from, to = ?to, cause = ?cause, "State transition");

        match to {
            State::Completed => EngineCounters::bump(&self.counters.completed),
            State::Failed => EngineCounters::bump(&self.counters.failed),
            State::TimedOut => EngineCounters::bump(&self.counters.timed_out),
            _ => {}
        }
        if let Some(audit) = self.audit.as_mut() {
            audit.record(build_transition_record(self.audit_seq, from, to, cause));
            self.audit_seq += 1;
        }

        let mut follow_up = None;
        for effect in to.entry_effects() {
            if let Some(event) = self.apply(*effect) {
                follow_up = Some(event);
            }
        }
        follow_up
    }

    fn apply(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::CheckPending => Some(Event::Checked {
                pending: self.registry.has_any_pending(),
            }),
            Effect::Dispatch => self.dispatch(),
            Effect::CancelTimeout => {
                self.timers.cancel_timeout();
                self.in_flight = None;
                None
            }
            Effect::Relax => {
                self.backoff.on_success_or_complete();
                self.publish_cursor();
                None
            }
            Effect::Escalate => {
                self.retry_delay = self.backoff.escalate();
                self.publish_cursor();
                None
            }
            Effect::ScheduleRetry => {
                debug!(delay_ms = self.retry_delay.as_millis(), "Retry scheduled");
                self.timers.arm_retry(Instant::now() + self.retry_delay);
                None
            }
            Effect::Advance => Some(Event::Advance),
            Effect::Teardown => {
                self.chain.teardown();
                self.registry.clear();
                self.timers.clear();
                self.in_flight = None;
                info!("Engine torn down");
                None
            }
        }
    }

    /// Pick the next source and run the chain. `None` means the dispatch is
    /// in flight and the timeout guard is armed.
    fn dispatch(&mut self) -> Option<Event> {
        let Some(key) = self.registry.next() else {
            debug!("No source left to dispatch");
            return Some(Event::Rejected);
        };

        self.last_dispatch += 1;
        let dispatch = self.last_dispatch;
        let sink = OutcomeSink::new(self.tx.clone(), dispatch);
        let accepted = {
            let mut ctx = DispatchContext::new(&mut self.registry, sink);
            self.chain.execute(&mut ctx)
        };
        if !accepted {
            debug!(key = %key, dispatch, "Dispatch rejected by chain");
            return Some(Event::Rejected);
        }

        self.in_flight = Some(dispatch);
        self.timers
            .arm_timeout(Instant::now() + self.dispatch_timeout, dispatch);
        EngineCounters::bump(&self.counters.dispatched);
        debug!(key = %key, dispatch, "Dispatch handed to source");
        None
    }

    fn current_source_registered(&self) -> bool {
        self.registry
            .current()
            .is_some_and(|key| self.registry.contains(key))
    }

    fn publish_cursor(&self) {
        self.counters
            .retry_cursor
            .store(self.backoff.cursor(), std::sync::atomic::Ordering::Relaxed);
    }
}

/// Spawn the worker thread.
///
/// `build_chain` runs on the new thread; its result is reported back before
/// this function returns so construction errors surface to the caller.
pub(crate) fn spawn_worker<F>(
    name: &str,
    settings: WorkerSettings,
    build_chain: F,
    tx: Sender<Command>,
    rx: Receiver<Command>,
    counters: Arc<EngineCounters>,
    audit: Option<Box<dyn AuditSink>>,
) -> Result<JoinHandle<()>, EngineError>
where
    F: FnOnce() -> Result<DispatchChain, EngineError> + Send + 'static,
{
    let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), EngineError>>(1);

    let handle = thread::Builder::new().name(name.to_owned()).spawn(move || {
        let chain = match build_chain() {
            Ok(chain) => chain,
            Err(e) => {
                error!(error = %e, "Failed to build dispatch chain");
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let worker = Worker::new(settings, chain, tx, counters, audit);
        let _ = ready_tx.send(Ok(()));
        worker.run(&rx);
    })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => Err(EngineError::Internal(
            "worker exited before reporting readiness".into(),
        )),
    }
}
