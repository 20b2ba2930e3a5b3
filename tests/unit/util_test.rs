//! Tests for utility functions

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use offline_dispatch::util::{init_tracing, now_ms, ShutdownSignal};

#[test]
fn test_now_ms_advances() {
    let a = now_ms();
    thread::sleep(Duration::from_millis(2));
    assert!(now_ms() >= a);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
}

#[test]
fn test_shutdown_signal_wakes_sleeper() {
    let signal = Arc::new(ShutdownSignal::new());
    let sleeper = {
        let signal = Arc::clone(&signal);
        thread::spawn(move || {
            let start = Instant::now();
            let triggered = signal.wait_timeout(Duration::from_secs(30));
            (triggered, start.elapsed())
        })
    };
    thread::sleep(Duration::from_millis(10));
    signal.trigger();
    let (triggered, elapsed) = sleeper.join().unwrap();
    assert!(triggered);
    assert!(elapsed < Duration::from_secs(5));
}
