//! Tests for the distortion imputers

use traceclean::{
    impute_distorted_pings_with_angle, impute_distorted_pings_with_distance, RawPing, Trace,
    TracePayload, UpdateStatus,
};

fn trace_from(points: Vec<(f64, f64, i64)>) -> Trace {
    let pings = points
        .into_iter()
        .map(|(lat, lng, ts)| RawPing::new(lat, lng, ts))
        .collect();
    Trace::new(TracePayload::from_pings(pings)).unwrap()
}

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

#[test]
fn test_distance_spike_replaced_by_line_interpolation() {
    // Neighbors ~11 m apart on the meridian, the middle point ~111 m off to
    // the side: d1 + d2 far exceeds 3 × d0.
    let mut trace = trace_from(vec![
        (0.0, 0.0, 1_000),
        (0.00005, 0.001, 2_000),
        (0.0001, 0.0, 3_000),
    ]);

    impute_distorted_pings_with_distance(&mut trace, 3.0).unwrap();

    let middle = &trace.pings()[1];
    assert_eq!(middle.update_status, UpdateStatus::Updated);
    assert_eq!(middle.last_updated_by, "impute_distorted_pings_with_distance");
    // Replaced by the straight-line midpoint of its neighbors
    assert!(approx_eq(middle.cleaned_latitude.unwrap(), 0.00005, 1e-12));
    assert!(approx_eq(middle.cleaned_longitude.unwrap(), 0.0, 1e-12));
    // The input coordinates are untouched
    assert_eq!(middle.input_longitude, Some(0.001));
}

#[test]
fn test_no_imputation_below_ratio() {
    // A gentle bend: d1 + d2 barely exceeds d0
    let mut trace = trace_from(vec![
        (0.0, 0.0, 1_000),
        (0.00005, 0.00001, 2_000),
        (0.0001, 0.0, 3_000),
    ]);

    impute_distorted_pings_with_distance(&mut trace, 3.0).unwrap();

    assert_eq!(trace.pings()[1].update_status, UpdateStatus::Unchanged);
}

#[test]
fn test_degenerate_window_with_identical_neighbors_is_skipped() {
    // First and third point coincide, so d0 == 0; the middle point must not
    // be imputed against a zero-length baseline.
    let mut trace = trace_from(vec![
        (0.0, 0.0, 1_000),
        (0.001, 0.0, 2_000),
        (0.0, 0.0, 3_000),
    ]);

    impute_distorted_pings_with_distance(&mut trace, 3.0).unwrap();

    assert_eq!(trace.pings()[1].update_status, UpdateStatus::Unchanged);
}

#[test]
fn test_distance_imputer_skips_interpolated_pings() {
    let mut trace = trace_from(vec![
        (0.0, 0.0, 1_000),
        (0.00005, 0.001, 2_000),
        (0.0001, 0.0, 3_000),
    ]);

    // Hand-mark the spike as interpolated through the sanctioned write path
    trace.merge_coordinate_updates(&[traceclean::trace::CoordinateUpdate {
        ping_id: "2".to_string(),
        cleaned_latitude: Some(0.00005),
        cleaned_longitude: Some(0.001),
        update_status: UpdateStatus::Interpolated,
        last_updated_by: "interpolate_trace",
    }]);

    impute_distorted_pings_with_distance(&mut trace, 3.0).unwrap();

    let middle = &trace.pings()[1];
    assert_eq!(middle.update_status, UpdateStatus::Interpolated);
    assert_eq!(middle.cleaned_longitude, Some(0.001));
}

#[test]
fn test_distance_imputer_second_pass_catches_two_point_spikes() {
    // Five points: the straight path is along the meridian, with points 2
    // and 3 thrown far off course. The half_window=2 pass compares points
    // two positions apart and pulls the pair back onto the line.
    let mut trace = trace_from(vec![
        (0.0, 0.0, 1_000),
        (0.00005, 0.002, 2_000),
        (0.0001, 0.002, 3_000),
        (0.00015, 0.0, 4_000),
        (0.0002, 0.0, 5_000),
    ]);

    impute_distorted_pings_with_distance(&mut trace, 3.0).unwrap();

    // Both spike points end up updated
    assert_eq!(trace.pings()[1].update_status, UpdateStatus::Updated);
    assert_eq!(trace.pings()[2].update_status, UpdateStatus::Updated);
    assert!(trace.pings()[1].cleaned_longitude.unwrap() < 0.002);
    assert!(trace.pings()[2].cleaned_longitude.unwrap() < 0.002);
}

#[test]
fn test_distance_imputer_rejects_ratio_below_one() {
    let mut trace = trace_from(vec![(0.0, 0.0, 1_000)]);
    assert!(impute_distorted_pings_with_distance(&mut trace, 0.5).is_err());
    assert!(impute_distorted_pings_with_distance(&mut trace, f64::NAN).is_err());
}

#[test]
fn test_angle_spike_replaced_by_midpoint() {
    // Interior point c reverses direction completely: both bearings from c
    // point south, so the change in direction is 180 degrees.
    let mut trace = trace_from(vec![
        (0.0, 0.0, 1_000),
        (0.0001, 0.0, 2_000),
        (0.0003, 0.0, 3_000),
        (0.00015, 0.0, 4_000),
        (0.0005, 0.0, 5_000),
    ]);

    impute_distorted_pings_with_angle(&mut trace, 120.0).unwrap();

    let spike = &trace.pings()[2];
    assert_eq!(spike.update_status, UpdateStatus::Updated);
    assert_eq!(spike.last_updated_by, "impute_distorted_pings_with_angle");
    // Midpoint of its neighbors (0.0001 and 0.00015)
    assert!(approx_eq(spike.cleaned_latitude.unwrap(), 0.000125, 1e-12));
    assert!(approx_eq(spike.cleaned_longitude.unwrap(), 0.0, 1e-12));
}

#[test]
fn test_angle_imputer_leaves_straight_path_alone() {
    let mut trace = trace_from(vec![
        (0.0, 0.0, 1_000),
        (0.0001, 0.0, 2_000),
        (0.0002, 0.0, 3_000),
        (0.0003, 0.0, 4_000),
        (0.0004, 0.0, 5_000),
    ]);

    impute_distorted_pings_with_angle(&mut trace, 120.0).unwrap();

    assert!(trace
        .pings()
        .iter()
        .all(|p| p.update_status == UpdateStatus::Unchanged));
}

#[test]
fn test_angle_imputer_skips_interpolated_pings() {
    let mut trace = trace_from(vec![
        (0.0, 0.0, 1_000),
        (0.0001, 0.0, 2_000),
        (0.0003, 0.0, 3_000),
        (0.00015, 0.0, 4_000),
        (0.0005, 0.0, 5_000),
    ]);

    trace.merge_coordinate_updates(&[traceclean::trace::CoordinateUpdate {
        ping_id: "3".to_string(),
        cleaned_latitude: Some(0.0003),
        cleaned_longitude: Some(0.0),
        update_status: UpdateStatus::Interpolated,
        last_updated_by: "interpolate_trace",
    }]);

    impute_distorted_pings_with_angle(&mut trace, 120.0).unwrap();

    assert_eq!(trace.pings()[2].update_status, UpdateStatus::Interpolated);
    assert_eq!(trace.pings()[2].cleaned_latitude, Some(0.0003));
}

#[test]
fn test_angle_imputer_rejects_out_of_range_angle() {
    let mut trace = trace_from(vec![(0.0, 0.0, 1_000)]);
    assert!(impute_distorted_pings_with_angle(&mut trace, -5.0).is_err());
    assert!(impute_distorted_pings_with_angle(&mut trace, 181.0).is_err());
}
