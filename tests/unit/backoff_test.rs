//! Tests for the back-off ladder through the public API

use std::time::Duration;

use offline_dispatch::core::Backoff;

#[test]
fn test_escalate_yields_ladder_in_order_then_saturates() {
    let mut backoff = Backoff::from_millis(&[10, 20, 40]);
    let delays: Vec<u64> = (0..5)
        .map(|_| u64::try_from(backoff.escalate().as_millis()).unwrap())
        .collect();
    assert_eq!(delays, vec![10, 20, 40, 40, 40]);
    assert_eq!(backoff.cursor(), 2);
}

#[test]
fn test_recovery_relaxes_one_rung_per_success() {
    let mut backoff = Backoff::from_millis(&[10, 20, 40, 80]);
    for _ in 0..3 {
        backoff.escalate();
    }
    assert_eq!(backoff.current_delay(), Duration::from_millis(80));

    backoff.on_success_or_complete();
    assert_eq!(backoff.current_delay(), Duration::from_millis(40));
    backoff.on_success_or_complete();
    backoff.on_success_or_complete();
    backoff.on_success_or_complete();
    assert_eq!(backoff.cursor(), 0);
    assert_eq!(backoff.current_delay(), Duration::from_millis(10));
}
