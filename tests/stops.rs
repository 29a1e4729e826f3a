//! Tests for stop-event detection

use traceclean::{
    add_stop_events_info, add_stop_events_info_with, RawPing, StopConfig, StopLabeler, StopPoint,
    Trace, TraceCleanError, TracePayload,
};

const BASE_MS: i64 = 1_700_000_000_000;

fn trace_from(points: Vec<(f64, f64, i64)>) -> Trace {
    let pings = points
        .into_iter()
        .map(|(lat, lng, ts)| RawPing::new(lat, lng, ts))
        .collect();
    Trace::new(TracePayload::from_pings(pings)).unwrap()
}

struct FailingLabeler;

impl StopLabeler for FailingLabeler {
    fn label(&self, _points: &[StopPoint]) -> traceclean::Result<Vec<i64>> {
        Err(TraceCleanError::Inconsistent(
            "no stop could be derived".to_string(),
        ))
    }
}

struct FixedLabeler(Vec<i64>);

impl StopLabeler for FixedLabeler {
    fn label(&self, _points: &[StopPoint]) -> traceclean::Result<Vec<i64>> {
        Ok(self.0.clone())
    }
}

#[test]
fn test_single_stop_detected() {
    // Three pings at one spot over 180 s, then the vehicle drives off
    let mut trace = trace_from(vec![
        (12.0, 77.0, BASE_MS),
        (12.0, 77.0, BASE_MS + 90_000),
        (12.0, 77.0, BASE_MS + 180_000),
        (12.002, 77.0, BASE_MS + 240_000),
        (12.004, 77.0, BASE_MS + 300_000),
    ]);

    add_stop_events_info(&mut trace, &StopConfig::default()).unwrap();

    for ping in &trace.pings()[..3] {
        assert!(ping.stop_event_status);
        assert_eq!(ping.stop_event_sequence_number, 1);
        assert_eq!(ping.representative_stop_event_latitude, Some(12.0));
        assert_eq!(ping.representative_stop_event_longitude, Some(77.0));
    }
    for ping in &trace.pings()[3..] {
        assert!(!ping.stop_event_status);
        assert_eq!(ping.stop_event_sequence_number, -1);
        assert_eq!(ping.representative_stop_event_latitude, None);
    }
}

#[test]
fn test_cumulative_stop_time_accumulates_within_run() {
    let mut trace = trace_from(vec![
        (12.0, 77.0, BASE_MS),
        (12.0, 77.0, BASE_MS + 90_000),
        (12.0, 77.0, BASE_MS + 180_000),
        (12.002, 77.0, BASE_MS + 240_000),
        (12.004, 77.0, BASE_MS + 300_000),
    ]);

    add_stop_events_info(&mut trace, &StopConfig::default()).unwrap();

    let times: Vec<&str> = trace.pings()[..3]
        .iter()
        .map(|p| p.cumulative_stop_event_time.as_str())
        .collect();
    assert_eq!(
        times,
        vec![
            "0 minutes and 0 seconds",
            "1 minutes and 30 seconds",
            "3 minutes and 0 seconds",
        ]
    );
}

#[test]
fn test_too_short_dwell_is_not_a_stop() {
    // Only 60 s at the spot: below the 120 s minimum dwell
    let mut trace = trace_from(vec![
        (12.0, 77.0, BASE_MS),
        (12.0, 77.0, BASE_MS + 60_000),
        (12.002, 77.0, BASE_MS + 120_000),
        (12.004, 77.0, BASE_MS + 180_000),
    ]);

    add_stop_events_info(&mut trace, &StopConfig::default()).unwrap();

    assert!(trace.pings().iter().all(|p| !p.stop_event_status));
}

#[test]
fn test_moving_trace_has_no_stops() {
    let mut trace = trace_from(vec![
        (12.0, 77.0, BASE_MS),
        (12.002, 77.0, BASE_MS + 60_000),
        (12.004, 77.0, BASE_MS + 120_000),
        (12.006, 77.0, BASE_MS + 180_000),
    ]);

    add_stop_events_info(&mut trace, &StopConfig::default()).unwrap();

    assert!(trace.pings().iter().all(|p| !p.stop_event_status));
    assert!(trace
        .pings()
        .iter()
        .all(|p| p.stop_event_sequence_number == -1));
}

#[test]
fn test_two_stops_get_ascending_sequence_numbers() {
    let mut trace = trace_from(vec![
        (12.0, 77.0, BASE_MS),
        (12.0, 77.0, BASE_MS + 130_000),
        (12.01, 77.0, BASE_MS + 200_000),
        (12.02, 77.0, BASE_MS + 260_000),
        (12.02, 77.0, BASE_MS + 390_000),
    ]);

    add_stop_events_info(&mut trace, &StopConfig::default()).unwrap();

    assert_eq!(trace.pings()[0].stop_event_sequence_number, 1);
    assert_eq!(trace.pings()[1].stop_event_sequence_number, 1);
    assert_eq!(trace.pings()[2].stop_event_sequence_number, -1);
    assert_eq!(trace.pings()[3].stop_event_sequence_number, 2);
    assert_eq!(trace.pings()[4].stop_event_sequence_number, 2);
}

#[test]
fn test_revisited_location_gets_two_sequence_numbers() {
    // The vehicle stops, leaves, and returns to the same spot. Both runs
    // merge into one cluster label, yet each contiguous run is its own stop
    // event.
    let mut trace = trace_from(vec![
        (12.0, 77.0, BASE_MS),
        (12.0, 77.0, BASE_MS + 130_000),
        (12.005, 77.0, BASE_MS + 190_000),
        (12.0, 77.0, BASE_MS + 250_000),
        (12.0, 77.0, BASE_MS + 380_000),
    ]);

    add_stop_events_info(&mut trace, &StopConfig::default()).unwrap();

    assert_eq!(trace.pings()[0].stop_event_sequence_number, 1);
    assert_eq!(trace.pings()[3].stop_event_sequence_number, 2);

    // Shared label means shared representative location
    assert_eq!(
        trace.pings()[0].representative_stop_event_latitude,
        trace.pings()[3].representative_stop_event_latitude
    );

    // The cumulative time restarts with the second run
    assert_eq!(
        trace.pings()[3].cumulative_stop_event_time,
        "0 minutes and 0 seconds"
    );
}

#[test]
fn test_failing_labeler_degrades_to_no_stops() {
    let mut trace = trace_from(vec![
        (12.0, 77.0, BASE_MS),
        (12.0, 77.0, BASE_MS + 130_000),
    ]);

    add_stop_events_info_with(&mut trace, &FailingLabeler).unwrap();

    assert!(trace.pings().iter().all(|p| !p.stop_event_status));
    assert!(trace
        .pings()
        .iter()
        .all(|p| p.stop_event_sequence_number == -1));
}

#[test]
fn test_mismatched_label_count_degrades_to_no_stops() {
    let mut trace = trace_from(vec![
        (12.0, 77.0, BASE_MS),
        (12.0, 77.0, BASE_MS + 130_000),
    ]);

    add_stop_events_info_with(&mut trace, &FixedLabeler(vec![0])).unwrap();

    assert!(trace.pings().iter().all(|p| !p.stop_event_status));
}

#[test]
fn test_rerun_resets_stale_stop_fields() {
    let mut trace = trace_from(vec![
        (12.0, 77.0, BASE_MS),
        (12.0, 77.0, BASE_MS + 130_000),
    ]);

    add_stop_events_info(&mut trace, &StopConfig::default()).unwrap();
    assert!(trace.pings()[0].stop_event_status);

    // A second run that finds nothing must clear the previous results
    add_stop_events_info_with(&mut trace, &FailingLabeler).unwrap();
    assert!(!trace.pings()[0].stop_event_status);
    assert_eq!(trace.pings()[0].stop_event_sequence_number, -1);
    assert_eq!(trace.pings()[0].representative_stop_event_latitude, None);
    assert_eq!(
        trace.pings()[0].cumulative_stop_event_time,
        "0 minutes and 0 seconds"
    );
}

#[test]
fn test_custom_labels_drive_sequencing() {
    // Labels A, A, B, B produce two runs even without a non-stop gap
    let mut trace = trace_from(vec![
        (12.0, 77.0, BASE_MS),
        (12.0, 77.0, BASE_MS + 60_000),
        (12.1, 77.0, BASE_MS + 120_000),
        (12.1, 77.0, BASE_MS + 180_000),
    ]);

    add_stop_events_info_with(&mut trace, &FixedLabeler(vec![0, 0, 1, 1])).unwrap();

    assert_eq!(trace.pings()[0].stop_event_sequence_number, 1);
    assert_eq!(trace.pings()[1].stop_event_sequence_number, 1);
    assert_eq!(trace.pings()[2].stop_event_sequence_number, 2);
    assert_eq!(trace.pings()[3].stop_event_sequence_number, 2);

    // Representative locations are per label
    assert_eq!(trace.pings()[0].representative_stop_event_latitude, Some(12.0));
    assert_eq!(trace.pings()[2].representative_stop_event_latitude, Some(12.1));
}

#[test]
fn test_rejects_invalid_parameters() {
    let mut trace = trace_from(vec![(12.0, 77.0, BASE_MS)]);

    let small_group = StopConfig {
        min_size: 1,
        ..StopConfig::default()
    };
    assert!(add_stop_events_info(&mut trace, &small_group).is_err());

    let zero_radius = StopConfig {
        linkage_radius: 0.0,
        ..StopConfig::default()
    };
    assert!(add_stop_events_info(&mut trace, &zero_radius).is_err());

    let zero_dwell = StopConfig {
        min_duration_secs: 0,
        ..StopConfig::default()
    };
    assert!(add_stop_events_info(&mut trace, &zero_dwell).is_err());
}
