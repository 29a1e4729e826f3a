//! Interpolation engine: synthesize pings along the road between two
//! map-matched pings that are far apart, using the OSRM route service.

use std::collections::HashMap;
use std::time::Instant;

use log::debug;

use crate::error::{check_strictly_positive, Result, TraceCleanError};
use crate::geo_utils::haversine_distance;
use crate::map_matching::MAP_MATCH_TRACE;
use crate::osrm::{build_client, get_osrm_route, OsrmRoute};
use crate::timefmt::format_duration_ms;
use crate::{Ping, Trace, UpdateStatus};

/// Operation name recorded in `last_updated_by`.
pub const INTERPOLATE_TRACE: &str = "interpolate_trace";

/// Shortest segment travel time worth interpolating, in seconds.
const MIN_ROUTE_TIME_SECS: f64 = 1.0;

/// A route longer than this multiple of the direct distance is a detour the
/// vehicle cannot plausibly have taken.
const MAX_ROUTE_TO_DIRECT_RATIO: f64 = 1.5;

/// Slowest implied speed worth interpolating, in meters per second.
const MIN_ROUTE_SPEED_MPS: f64 = 1.0;

/// Configuration for [`interpolate_trace`].
#[derive(Debug, Clone)]
pub struct InterpolateConfig {
    /// Route service endpoint, e.g. `http://127.0.0.1:5000/route/v1/driving/`
    pub osrm_url: String,
    /// Minimum gap in meters between consecutive map-matched pings before
    /// interpolation kicks in
    pub min_gap: f64,
    /// Maximum gap in meters that is still bridged by interpolation
    pub max_gap: f64,
}

impl Default for InterpolateConfig {
    fn default() -> Self {
        Self {
            osrm_url: "http://127.0.0.1:5000/route/v1/driving/".to_string(),
            min_gap: 10.0,
            max_gap: 250.0,
        }
    }
}

/// Fill gaps between consecutive map-matched pings with synthetic pings
/// along the fetched driving route.
///
/// Scans consecutive pairs where **both** pings were last updated by map
/// matching and the direct distance lies within `[min_gap, max_gap]`. For
/// each such pair a driving route is fetched and, when it passes the
/// plausibility checks of [`synthesize_gap_pings`], one synthetic ping per
/// interior route vertex is spliced between the pair. All original pings are
/// retained and timestamp order is preserved.
pub fn interpolate_trace(trace: &mut Trace, config: &InterpolateConfig) -> Result<()> {
    let started = Instant::now();

    check_strictly_positive("min_gap", config.min_gap)?;
    check_strictly_positive("max_gap", config.max_gap)?;
    if config.min_gap >= config.max_gap {
        return Err(TraceCleanError::invalid_parameter(
            "min_gap",
            format!(
                "must be smaller than max_gap ({} >= {})",
                config.min_gap, config.max_gap
            ),
        ));
    }

    let client = build_client(&config.osrm_url)?;
    let mut insertions: Vec<(usize, Vec<Ping>)> = Vec::new();

    for i in 1..trace.len() {
        let prev = &trace.pings()[i - 1];
        let curr = &trace.pings()[i];

        // Only bridge between two road-snapped pings.
        if prev.last_updated_by != MAP_MATCH_TRACE || curr.last_updated_by != MAP_MATCH_TRACE {
            continue;
        }
        let (Some(prev_pos), Some(curr_pos)) = (prev.cleaned_position(), curr.cleaned_position())
        else {
            continue;
        };

        let direct = haversine_distance(prev_pos.0, prev_pos.1, curr_pos.0, curr_pos.1);
        if direct < config.min_gap || direct > config.max_gap {
            continue;
        }

        let Some(route) = get_osrm_route(&client, &config.osrm_url, &[prev_pos, curr_pos])? else {
            continue;
        };

        if let Some(pings) = synthesize_gap_pings(prev, curr, &route, direct) {
            insertions.push((i - 1, pings));
        }
    }

    debug!(
        "interpolate_trace: splicing {} synthetic pings into {} gaps",
        insertions.iter().map(|(_, p)| p.len()).sum::<usize>(),
        insertions.len()
    );

    trace.splice_after(insertions);
    trace.record_runtime(INTERPOLATE_TRACE, started.elapsed());
    Ok(())
}

/// Build the synthetic pings bridging one gap, or `None` when the route is
/// not usable.
///
/// The route is rejected when the segment travel time is at most
/// [`MIN_ROUTE_TIME_SECS`], the total route distance (snap-to-start + route
/// length + snap-to-end) exceeds [`MAX_ROUTE_TO_DIRECT_RATIO`] times the
/// direct distance, the implied speed is at most [`MIN_ROUTE_SPEED_MPS`], or
/// the geometry holds nothing beyond the two snapped endpoints.
///
/// Accepted routes yield one ping per interior vertex: coordinates from the
/// route; timestamps walked vertex to vertex at the implied constant speed,
/// clamped to the segment end; ids derived from the preceding real ping
/// (`"{id}_1"`, `"{id}_2"`, …); null input coordinates; interpolated status.
pub fn synthesize_gap_pings(
    prev: &Ping,
    curr: &Ping,
    route: &OsrmRoute,
    direct_distance: f64,
) -> Option<Vec<Ping>> {
    let (prev_lat, prev_lng) = prev.cleaned_position()?;
    let (curr_lat, curr_lng) = curr.cleaned_position()?;

    let segment_secs = (curr.timestamp - prev.timestamp) as f64 / 1000.0;
    if segment_secs <= MIN_ROUTE_TIME_SECS {
        return None;
    }

    let first = route.geometry.first()?;
    let last = route.geometry.last()?;
    let snap_in = haversine_distance(prev_lat, prev_lng, first.0, first.1);
    let snap_out = haversine_distance(curr_lat, curr_lng, last.0, last.1);
    let total_distance = snap_in + route.distance + snap_out;

    if total_distance > MAX_ROUTE_TO_DIRECT_RATIO * direct_distance {
        return None;
    }

    let speed = total_distance / segment_secs;
    if speed <= MIN_ROUTE_SPEED_MPS {
        return None;
    }

    // The first and last vertices are just the snapped endpoints.
    if route.geometry.len() <= 2 {
        return None;
    }
    let interior = &route.geometry[1..route.geometry.len() - 1];

    let mut pings = Vec::with_capacity(interior.len());
    let mut cursor = (prev_lat, prev_lng);
    let mut cursor_time = prev.timestamp;

    for (n, &(lat, lng)) in interior.iter().enumerate() {
        let step = haversine_distance(cursor.0, cursor.1, lat, lng);
        let timestamp =
            (cursor_time + ((step / speed) * 1000.0) as i64).min(curr.timestamp);

        pings.push(Ping {
            ping_id: format!("{}_{}", prev.ping_id, n + 1),
            timestamp,
            input_latitude: None,
            input_longitude: None,
            cleaned_latitude: Some(lat),
            cleaned_longitude: Some(lng),
            error_radius: None,
            event_type: None,
            force_retain: false,
            metadata: HashMap::new(),
            update_status: UpdateStatus::Interpolated,
            last_updated_by: INTERPOLATE_TRACE.to_string(),
            stop_event_status: false,
            stop_event_sequence_number: -1,
            representative_stop_event_latitude: None,
            representative_stop_event_longitude: None,
            cumulative_stop_event_time: format_duration_ms(0),
        });

        cursor = (lat, lng);
        cursor_time = timestamp;
    }

    Some(pings)
}
