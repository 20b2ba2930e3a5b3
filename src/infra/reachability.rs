//! Endpoint reachability gate.
//!
//! This is the one stage allowed to block the worker thread. While the
//! endpoint is unreachable it re-probes every `retry_interval` until it
//! succeeds or the engine shuts down, so dispatch for every source stalls
//! until reachability returns.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::core::chain::{DispatchContext, Gate};
use crate::util::signal::ShutdownSignal;

/// Answers whether the remote endpoint can currently be reached.
///
/// Called synchronously on the worker thread.
pub trait ConnectivityOracle: Send {
    /// Whether the endpoint is reachable right now.
    fn is_connected(&self) -> bool;
}

impl<F> ConnectivityOracle for F
where
    F: Fn() -> bool + Send,
{
    fn is_connected(&self) -> bool {
        self()
    }
}

/// Second gate: confirms the endpoint is reachable before sending.
pub struct EndpointGate {
    oracle: Box<dyn ConnectivityOracle>,
    cooldown: Duration,
    retry_interval: Duration,
    last_success: Option<Instant>,
    shutdown: Arc<ShutdownSignal>,
}

impl EndpointGate {
    /// Gate over `oracle`. A success is trusted for `cooldown`; while
    /// unreachable the oracle is re-polled every three cooldowns.
    pub fn new(
        oracle: Box<dyn ConnectivityOracle>,
        cooldown: Duration,
        shutdown: Arc<ShutdownSignal>,
    ) -> Self {
        Self {
            oracle,
            cooldown,
            retry_interval: cooldown.saturating_mul(3),
            last_success: None,
            shutdown,
        }
    }

    /// Override the unreachable retry interval.
    #[must_use]
    pub const fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    fn recently_confirmed(&self) -> bool {
        self.last_success
            .is_some_and(|at| at.elapsed() <= self.cooldown)
    }
}

impl Gate for EndpointGate {
    fn name(&self) -> &'static str {
        "reachability"
    }

    fn execute(&mut self, _ctx: &mut DispatchContext<'_>) -> bool {
        if self.shutdown.is_triggered() {
            return false;
        }
        if self.recently_confirmed() {
            trace!("Endpoint confirmed within cooldown, skipping probe");
            return true;
        }

        let mut attempts = 0_u32;
        loop {
            if self.oracle.is_connected() {
                self.last_success = Some(Instant::now());
                if attempts > 0 {
                    info!(attempts, "Endpoint reachable again");
                }
                return true;
            }
            self.last_success = None;
            attempts += 1;
            warn!(
                attempts,
                retry_ms = self.retry_interval.as_millis(),
                "Endpoint unreachable, waiting before next probe"
            );
            if self.shutdown.wait_timeout(self.retry_interval) {
                debug!("Reachability wait interrupted by shutdown");
                return false;
            }
        }
    }

    fn teardown(&mut self) {
        self.last_success = None;
    }
}

impl std::fmt::Debug for EndpointGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointGate")
            .field("cooldown", &self.cooldown)
            .field("retry_interval", &self.retry_interval)
            .field("last_success", &self.last_success)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::listener::OutcomeSink;
    use crate::core::registry::EventRegistry;
    use crossbeam_channel::unbounded;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn run(gate: &mut EndpointGate) -> bool {
        let mut registry = EventRegistry::new();
        let (tx, _rx) = unbounded();
        let mut ctx = DispatchContext::new(&mut registry, OutcomeSink::new(tx, 1));
        gate.execute(&mut ctx)
    }

    fn counting(results: Vec<bool>) -> (Box<dyn ConnectivityOracle>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let oracle = move || {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            results.get(n).copied().unwrap_or(true)
        };
        (Box::new(oracle), calls)
    }

    #[test]
    fn test_success_cached_within_cooldown() {
        let (oracle, calls) = counting(vec![true]);
        let mut gate = EndpointGate::new(
            oracle,
            Duration::from_secs(60),
            Arc::new(ShutdownSignal::new()),
        );
        assert!(run(&mut gate));
        assert!(run(&mut gate));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reprobes_after_cooldown() {
        let (oracle, calls) = counting(vec![true, true]);
        let mut gate = EndpointGate::new(
            oracle,
            Duration::from_millis(5),
            Arc::new(ShutdownSignal::new()),
        );
        assert!(run(&mut gate));
        thread::sleep(Duration::from_millis(15));
        assert!(run(&mut gate));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_retries_until_reachable() {
        let (oracle, calls) = counting(vec![false, false, true]);
        let mut gate = EndpointGate::new(
            oracle,
            Duration::from_millis(1),
            Arc::new(ShutdownSignal::new()),
        );
        assert!(run(&mut gate));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unreachable_reprobes_every_three_cooldowns() {
        let probes = Arc::new(Mutex::new(Vec::new()));
        let oracle = {
            let probes = Arc::clone(&probes);
            move || {
                let mut probes = probes.lock();
                probes.push(Instant::now());
                probes.len() >= 3
            }
        };
        let cooldown = Duration::from_millis(20);
        let mut gate =
            EndpointGate::new(Box::new(oracle), cooldown, Arc::new(ShutdownSignal::new()));
        assert!(run(&mut gate));

        let probes = probes.lock();
        assert_eq!(probes.len(), 3);
        for pair in probes.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= cooldown * 3, "re-probed after {gap:?}");
            assert!(gap < cooldown * 3 + Duration::from_secs(1), "re-probed after {gap:?}");
        }
    }

    #[test]
    fn test_shutdown_interrupts_wait() {
        let shutdown = Arc::new(ShutdownSignal::new());
        let mut gate = EndpointGate::new(
            Box::new(|| false),
            Duration::from_secs(60),
            Arc::clone(&shutdown),
        );
        let trigger = {
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                shutdown.trigger();
            })
        };
        let start = Instant::now();
        assert!(!run(&mut gate));
        assert!(start.elapsed() < Duration::from_secs(10));
        trigger.join().unwrap();
    }
}
