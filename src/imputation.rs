//! Distortion imputers: repair locally distorted pings by distance-ratio and
//! angle-deviation heuristics.
//!
//! Both imputers operate on the subsequence of pings with valid cleaned
//! coordinates and never touch interpolated pings — those are treated as
//! ground truth.

use std::time::Instant;

use log::debug;

use crate::error::{Result, TraceCleanError};
use crate::geo_utils::{change_in_direction, haversine_distance, points_between};
use crate::trace::CoordinateUpdate;
use crate::{Trace, UpdateStatus};

/// Operation name recorded in `last_updated_by` by the distance imputer.
pub const IMPUTE_DISTORTED_PINGS_WITH_DISTANCE: &str = "impute_distorted_pings_with_distance";

/// Operation name recorded in `last_updated_by` by the angle imputer.
pub const IMPUTE_DISTORTED_PINGS_WITH_ANGLE: &str = "impute_distorted_pings_with_angle";

/// Snapshot of one valid-coordinate ping taken before a pass; updates within
/// a pass read these original values, not each other's output.
struct Candidate {
    ping_id: String,
    lat: f64,
    lng: f64,
    interpolated: bool,
}

fn valid_candidates(trace: &Trace) -> Vec<Candidate> {
    trace
        .pings()
        .iter()
        .filter_map(|p| {
            let (lat, lng) = p.cleaned_position()?;
            Some(Candidate {
                ping_id: p.ping_id.clone(),
                lat,
                lng,
                interpolated: p.is_interpolated(),
            })
        })
        .collect()
}

/// Impute pings whose detour against their neighbors exceeds a ratio.
///
/// For a candidate at offset `i` with neighbors `half_window` positions away,
/// let `d1`/`d2` be the distances from the neighbors to the candidate and
/// `d0` the direct distance between the neighbors. When `d1 + d2` exceeds
/// `max_ratio × d0`, the candidate (and, for the wider window, the points
/// between the neighbors) is replaced by evenly spaced points on the
/// straight line between the neighbors.
///
/// Runs twice: once with `half_window = 1` at `max_ratio`, then with
/// `half_window = 2` at `max_ratio + 1`, so both single-point and two-point
/// spikes are caught. A window whose neighbors coincide (`d0 == 0`) is
/// degenerate, not a spike, and is skipped.
pub fn impute_distorted_pings_with_distance(trace: &mut Trace, max_ratio: f64) -> Result<()> {
    let started = Instant::now();

    if !max_ratio.is_finite() || max_ratio < 1.0 {
        return Err(TraceCleanError::invalid_parameter(
            "max_ratio",
            format!("must be a finite number >= 1, got {max_ratio}"),
        ));
    }

    let first = distance_pass(trace, max_ratio, 1);
    trace.merge_coordinate_updates(&first);

    // The second, wider pass sees the first pass's repairs.
    let second = distance_pass(trace, max_ratio + 1.0, 2);
    trace.merge_coordinate_updates(&second);

    debug!(
        "impute_distorted_pings_with_distance: {} + {} updates (max_ratio {max_ratio})",
        first.len(),
        second.len()
    );

    trace.record_runtime(IMPUTE_DISTORTED_PINGS_WITH_DISTANCE, started.elapsed());
    Ok(())
}

fn distance_pass(trace: &Trace, max_ratio: f64, half_window: usize) -> Vec<CoordinateUpdate> {
    let candidates = valid_candidates(trace);
    let mut updates = Vec::new();

    if candidates.len() < 2 * half_window + 1 {
        return updates;
    }

    for i in half_window..candidates.len() - half_window {
        if candidates[i].interpolated {
            continue;
        }

        let prev = &candidates[i - half_window];
        let current = &candidates[i];
        let next = &candidates[i + half_window];

        let d1 = haversine_distance(prev.lat, prev.lng, current.lat, current.lng);
        let d2 = haversine_distance(current.lat, current.lng, next.lat, next.lng);
        let d0 = haversine_distance(prev.lat, prev.lng, next.lat, next.lng);

        if d0 <= 0.0 || d1 + d2 <= max_ratio * d0 {
            continue;
        }

        // Replace everything strictly between the two neighbors with points
        // on the straight line connecting them.
        let interior = 2 * half_window - 1;
        let line = points_between((prev.lat, prev.lng), (next.lat, next.lng), interior);
        for (j, point) in line[1..line.len() - 1].iter().enumerate() {
            let idx = i - half_window + 1 + j;
            if idx >= candidates.len() || candidates[idx].interpolated {
                continue;
            }
            updates.push(CoordinateUpdate {
                ping_id: candidates[idx].ping_id.clone(),
                cleaned_latitude: Some(point.0),
                cleaned_longitude: Some(point.1),
                update_status: UpdateStatus::Updated,
                last_updated_by: IMPUTE_DISTORTED_PINGS_WITH_DISTANCE,
            });
        }
    }

    updates
}

/// Impute pings where the direction of travel reverses too sharply.
///
/// For each interior candidate the turn angle with respect to its immediate
/// neighbors is derived from the initial compass bearings candidate→prev and
/// candidate→next, normalized into `[0, 180]`. A turn sharper than
/// `max_delta_angle` replaces the candidate with the midpoint of its
/// neighbors. Missing coordinates yield no angle and the point is skipped.
pub fn impute_distorted_pings_with_angle(trace: &mut Trace, max_delta_angle: f64) -> Result<()> {
    let started = Instant::now();

    if !max_delta_angle.is_finite() || !(0.0..=180.0).contains(&max_delta_angle) {
        return Err(TraceCleanError::invalid_parameter(
            "max_delta_angle",
            format!("must be within [0, 180] degrees, got {max_delta_angle}"),
        ));
    }

    let candidates = valid_candidates(trace);
    let mut updates = Vec::new();

    for i in 2..candidates.len().saturating_sub(2) {
        if candidates[i].interpolated {
            continue;
        }

        let prev = &candidates[i - 1];
        let current = &candidates[i];
        let next = &candidates[i + 1];

        let delta = change_in_direction(
            (Some(prev.lat), Some(prev.lng)),
            (Some(current.lat), Some(current.lng)),
            (Some(next.lat), Some(next.lng)),
        );

        match delta {
            Some(delta) if delta > max_delta_angle => {
                updates.push(CoordinateUpdate {
                    ping_id: current.ping_id.clone(),
                    cleaned_latitude: Some((prev.lat + next.lat) / 2.0),
                    cleaned_longitude: Some((prev.lng + next.lng) / 2.0),
                    update_status: UpdateStatus::Updated,
                    last_updated_by: IMPUTE_DISTORTED_PINGS_WITH_ANGLE,
                });
            }
            _ => {}
        }
    }

    debug!(
        "impute_distorted_pings_with_angle: {} updates (max_delta_angle {max_delta_angle})",
        updates.len()
    );

    trace.merge_coordinate_updates(&updates);
    trace.record_runtime(IMPUTE_DISTORTED_PINGS_WITH_ANGLE, started.elapsed());
    Ok(())
}
