//! Back-off ladder with a gradually relaxing retry cursor.
//!
//! Every failure moves the cursor one rung up the ladder (saturating at the
//! top); every completion moves it one rung down. Recovery therefore relaxes
//! the delay step by step instead of snapping back to the first rung.

use std::time::Duration;

/// Default ladder in milliseconds.
pub const DEFAULT_LADDER_MS: [u64; 9] = [
    5_000, 5_000, 10_000, 15_000, 25_000, 40_000, 75_000, 105_000, 170_000,
];

/// Fixed ascending ladder of retry delays indexed by a failure cursor.
#[derive(Debug, Clone)]
pub struct Backoff {
    ladder: Vec<Duration>,
    cursor: usize,
}

impl Backoff {
    /// Create a policy over `ladder`.
    ///
    /// The ladder must be non-empty; [`crate::config::EngineConfig::validate`]
    /// enforces this (and ascending order) before an engine is built.
    #[must_use]
    pub fn new(ladder: Vec<Duration>) -> Self {
        debug_assert!(!ladder.is_empty(), "back-off ladder must not be empty");
        Self { ladder, cursor: 0 }
    }

    /// Build a policy from millisecond values.
    #[must_use]
    pub fn from_millis(ladder_ms: &[u64]) -> Self {
        Self::new(ladder_ms.iter().copied().map(Duration::from_millis).collect())
    }

    /// Delay to wait before the next re-check.
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        let last = self.ladder.len().saturating_sub(1);
        self.ladder
            .get(self.cursor.min(last))
            .copied()
            .unwrap_or_default()
    }

    /// Record a failure: move up one rung, saturating at the top.
    pub fn on_failure(&mut self) {
        self.cursor = (self.cursor + 1).min(self.ladder.len().saturating_sub(1));
    }

    /// Take the delay for the failure being recorded, then escalate.
    ///
    /// Over a run of consecutive failures this yields the ladder in order:
    /// the K-th failure waits `ladder[min(K - 1, len - 1)]`.
    pub fn escalate(&mut self) -> Duration {
        let delay = self.current_delay();
        self.on_failure();
        delay
    }

    /// Record a success or completion: relax by one rung, floored at zero.
    pub fn on_success_or_complete(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Current cursor position.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of rungs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ladder.len()
    }

    /// Whether the ladder has no rungs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ladder.is_empty()
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_millis(&DEFAULT_LADDER_MS)
    }
}
