//! Geographic utilities: great-circle distance, bearings and simple
//! straight-line constructions used by the cleaning heuristics.

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle (haversine) distance between two lat/lng points, in meters.
///
/// # Example
/// ```
/// use traceclean::geo_utils::haversine_distance;
/// assert_eq!(haversine_distance(0.0, 0.0, 0.0, 0.0), 0.0);
/// ```
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Total haversine distance along a sequence of `(lat, lng)` points.
pub fn trace_distance(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(w[0].0, w[0].1, w[1].0, w[1].1))
        .sum()
}

/// Initial compass bearing from the first point to the second, in degrees
/// normalized to `[0, 360)`.
pub fn initial_compass_bearing(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let delta_lng = (lng2 - lng1).to_radians();
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();

    let x = delta_lng.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lng.cos();

    (x.atan2(y).to_degrees() + 360.0) % 360.0
}

/// Change in direction at `center` with respect to `prev` and `next`, in
/// degrees within `[0, 180]`, independent of turn orientation.
///
/// Returns `None` when any coordinate is missing, so callers can skip the
/// point instead of failing.
pub fn change_in_direction(
    prev: (Option<f64>, Option<f64>),
    center: (Option<f64>, Option<f64>),
    next: (Option<f64>, Option<f64>),
) -> Option<f64> {
    let (p_lat, p_lng) = (prev.0?, prev.1?);
    let (c_lat, c_lng) = (center.0?, center.1?);
    let (n_lat, n_lng) = (next.0?, next.1?);

    let bearing_to_prev = initial_compass_bearing(c_lat, c_lng, p_lat, p_lng);
    let bearing_to_next = initial_compass_bearing(c_lat, c_lng, n_lat, n_lng);

    let angle = (bearing_to_next - bearing_to_prev + 360.0) % 360.0;
    if angle < 180.0 {
        Some(180.0 - angle)
    } else {
        Some(angle - 180.0)
    }
}

/// Insert `n` evenly spaced points on the straight line between two
/// coordinates. The returned sequence includes both endpoints.
pub fn points_between(start: (f64, f64), end: (f64, f64), n: usize) -> Vec<(f64, f64)> {
    let mut points = Vec::with_capacity(n + 2);
    points.push(start);

    let lat_step = (end.0 - start.0) / (n as f64 + 1.0);
    let lng_step = (end.1 - start.1) / (n as f64 + 1.0);

    for i in 1..=n {
        points.push((start.0 + i as f64 * lat_step, start.1 + i as f64 * lng_step));
    }

    points.push(end);
    points
}

/// Convert a distance in meters to the equivalent longitude span in degrees
/// at the given latitude.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let meters_per_degree = 111_320.0 * latitude.to_radians().cos();
    if meters_per_degree <= 0.0 {
        return f64::INFINITY;
    }
    meters / meters_per_degree
}
