//! Tests for audit sink

use offline_dispatch::core::{build_transition_record, AuditSink, Cause, Event, InMemoryAuditSink, State};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);

    let record = build_transition_record(0, State::Normal, State::Checking, Cause::Submitted);
    sink.record(record.clone());
    assert_eq!(sink.records().len(), 1);

    let records = sink.records();
    assert_eq!(records[0].seq, 0);
    assert_eq!(records[0].from, State::Normal);
    assert_eq!(records[0].to, State::Checking);
    assert_eq!(records[0].cause, Cause::Submitted);
    assert!(records[0].at_ms > 0);
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);

    sink.record(build_transition_record(0, State::Normal, State::Checking, Cause::Submitted));
    sink.record(build_transition_record(1, State::Checking, State::Executing, Cause::Checked));
    sink.record(build_transition_record(2, State::Executing, State::Failed, Cause::Rejected));

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].seq, 1);
    assert_eq!(records[1].seq, 2);
}

#[test]
fn test_clones_share_buffer() {
    let reader = InMemoryAuditSink::new(8);
    let mut writer = reader.clone();
    writer.record(build_transition_record(0, State::Delaying, State::Checking, Cause::RetryDue));
    assert_eq!(reader.states(), vec![State::Checking]);
    reader.clear();
    assert!(writer.records().is_empty());
}

#[test]
fn test_cause_from_event() {
    assert_eq!(
        Cause::from(Event::Outcome { dispatch: 1, success: true }),
        Cause::Succeeded
    );
    assert_eq!(
        Cause::from(Event::Outcome { dispatch: 1, success: false }),
        Cause::Failed
    );
    assert_eq!(Cause::from(Event::TimeoutElapsed { dispatch: 1 }), Cause::Timeout);
}

#[test]
fn test_record_serializes() {
    let record = build_transition_record(3, State::TimedOut, State::Failed, Cause::Advance);
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["from"], "timed_out");
    assert_eq!(json["to"], "failed");
    assert_eq!(json["cause"], "advance");
}
