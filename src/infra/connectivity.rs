//! Network connectivity gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::core::chain::{DispatchContext, Gate};

/// Thread-safe switch fed by a platform network-change observer.
///
/// Clones share the same flag. Writes may come from any thread; the worker
/// only reads.
#[derive(Debug, Clone)]
pub struct ConnectivityHandle {
    online: Arc<AtomicBool>,
}

impl ConnectivityHandle {
    /// Create a handle with the given initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    /// Record a network change.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::AcqRel);
        if previous != online {
            debug!(online, "Connectivity changed");
        }
    }

    /// Current network state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }
}

impl Default for ConnectivityHandle {
    fn default() -> Self {
        Self::new(true)
    }
}

/// First gate: passes only while the network is reported up.
#[derive(Debug, Clone)]
pub struct ConnectivityGate {
    handle: ConnectivityHandle,
}

impl ConnectivityGate {
    /// Gate reading `handle`.
    #[must_use]
    pub const fn new(handle: ConnectivityHandle) -> Self {
        Self { handle }
    }
}

impl Gate for ConnectivityGate {
    fn name(&self) -> &'static str {
        "connectivity"
    }

    fn execute(&mut self, _ctx: &mut DispatchContext<'_>) -> bool {
        self.handle.is_online()
    }
}
