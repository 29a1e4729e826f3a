//! Tests for the proximity filter

use std::collections::HashMap;

use traceclean::{remove_nearby_pings, RawPing, Trace, TracePayload, UpdateStatus};

// ~3 m and ~6.7 m of latitude at the equator
const LAT_3M: f64 = 0.000027;
const LAT_6M7: f64 = 0.00006;

fn trace_from(points: Vec<(f64, f64, i64)>) -> Trace {
    let pings = points
        .into_iter()
        .map(|(lat, lng, ts)| RawPing::new(lat, lng, ts))
        .collect();
    Trace::new(TracePayload::from_pings(pings)).unwrap()
}

fn null_ping(ts: i64) -> RawPing {
    RawPing {
        ping_id: None,
        latitude: None,
        longitude: None,
        timestamp: ts,
        error_radius: None,
        event_type: None,
        force_retain: false,
        metadata: HashMap::new(),
    }
}

#[test]
fn test_drops_ping_within_threshold() {
    // Two pings ~3 m apart with a 5 m threshold: the second is dropped
    let mut trace = trace_from(vec![(12.9716, 77.5946, 1_000), (12.9716 + LAT_3M, 77.5946, 2_000)]);

    remove_nearby_pings(&mut trace, 5.0).unwrap();

    let second = &trace.pings()[1];
    assert_eq!(second.cleaned_latitude, None);
    assert_eq!(second.cleaned_longitude, None);
    assert_eq!(second.update_status, UpdateStatus::Dropped);
    assert_eq!(second.last_updated_by, "remove_nearby_pings");

    // Input coordinates survive the drop
    assert_eq!(second.input_latitude, Some(12.9716 + LAT_3M));
}

#[test]
fn test_keeps_ping_beyond_threshold() {
    let mut trace = trace_from(vec![(0.0, 0.0, 1_000), (LAT_6M7, 0.0, 2_000)]);

    remove_nearby_pings(&mut trace, 5.0).unwrap();

    assert_eq!(trace.pings()[1].update_status, UpdateStatus::Unchanged);
    assert!(trace.pings()[1].cleaned_latitude.is_some());
}

#[test]
fn test_force_retain_wins_over_threshold() {
    let pings = vec![
        RawPing::new(0.0, 0.0, 1_000),
        RawPing::new(LAT_3M, 0.0, 2_000).with_force_retain(),
    ];
    let mut trace = Trace::new(TracePayload::from_pings(pings)).unwrap();

    remove_nearby_pings(&mut trace, 5.0).unwrap();

    assert_eq!(trace.pings()[1].update_status, UpdateStatus::Unchanged);
    assert!(trace.pings()[1].cleaned_latitude.is_some());
}

#[test]
fn test_anchor_does_not_advance_over_dropped_pings() {
    // Three pings each ~3 m past the previous one. The anchor stays on the
    // first, so the second is 3 m from it (dropped) and the third 6 m from
    // it (kept), even though consecutive spacing is uniformly 3 m.
    let mut trace = trace_from(vec![
        (0.0, 0.0, 1_000),
        (LAT_3M, 0.0, 2_000),
        (2.0 * LAT_3M, 0.0, 3_000),
    ]);

    remove_nearby_pings(&mut trace, 5.0).unwrap();

    assert_eq!(trace.pings()[1].update_status, UpdateStatus::Dropped);
    assert_eq!(trace.pings()[2].update_status, UpdateStatus::Unchanged);
}

#[test]
fn test_idempotent_with_same_threshold() {
    let mut trace = trace_from(vec![
        (0.0, 0.0, 1_000),
        (LAT_3M, 0.0, 2_000),
        (LAT_6M7, 0.0, 3_000),
        (2.0 * LAT_6M7, 0.0, 4_000),
    ]);

    remove_nearby_pings(&mut trace, 5.0).unwrap();
    let dropped_after_first: usize = trace
        .pings()
        .iter()
        .filter(|p| p.update_status == UpdateStatus::Dropped)
        .count();

    remove_nearby_pings(&mut trace, 5.0).unwrap();
    let dropped_after_second: usize = trace
        .pings()
        .iter()
        .filter(|p| p.update_status == UpdateStatus::Dropped)
        .count();

    assert_eq!(dropped_after_first, dropped_after_second);
}

#[test]
fn test_null_pings_neither_drop_nor_advance() {
    let pings = vec![
        RawPing::new(0.0, 0.0, 1_000),
        null_ping(2_000),
        RawPing::new(LAT_3M, 0.0, 3_000),
    ];
    let mut trace = Trace::new(TracePayload::from_pings(pings)).unwrap();

    remove_nearby_pings(&mut trace, 5.0).unwrap();

    // The null ping is untouched; the third is still within 3 m of the
    // anchor (the first ping) and gets dropped.
    assert_eq!(trace.pings()[1].update_status, UpdateStatus::Unchanged);
    assert_eq!(trace.pings()[2].update_status, UpdateStatus::Dropped);
}

#[test]
fn test_zero_threshold_drops_nothing() {
    let mut trace = trace_from(vec![(0.0, 0.0, 1_000), (0.0, 0.0, 2_000)]);
    remove_nearby_pings(&mut trace, 0.0).unwrap();
    assert!(trace
        .pings()
        .iter()
        .all(|p| p.update_status == UpdateStatus::Unchanged));
}

#[test]
fn test_rejects_negative_threshold() {
    let mut trace = trace_from(vec![(0.0, 0.0, 1_000)]);
    let result = remove_nearby_pings(&mut trace, -1.0);
    assert!(result.is_err());
    // No mutation happened
    assert_eq!(trace.pings()[0].update_status, UpdateStatus::Unchanged);
}
