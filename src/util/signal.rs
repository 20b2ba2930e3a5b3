//! Shutdown signal that can interrupt a timed wait.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// One-shot shutdown flag paired with a Condvar so sleepers wake immediately.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    triggered: Mutex<bool>,
    condvar: Condvar,
}

impl ShutdownSignal {
    /// Create an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the signal and wake every waiter.
    pub fn trigger(&self) {
        let mut triggered = self.triggered.lock();
        *triggered = true;
        self.condvar.notify_all();
    }

    /// Whether the signal has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock()
    }

    /// Sleep for up to `timeout`, returning early if triggered.
    ///
    /// Returns `true` if the signal was triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut triggered = self.triggered.lock();
        while !*triggered {
            if self.condvar.wait_until(&mut triggered, deadline).timed_out() {
                break;
            }
        }
        *triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_times_out_when_untriggered() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();
        assert!(!signal.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_trigger_wakes_waiter() {
        let signal = Arc::new(ShutdownSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait_timeout(Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        signal.trigger();
        assert!(waiter.join().unwrap());
        assert!(signal.is_triggered());
    }
}
