//! Map matching: snap trace pings onto the road network through the OSRM
//! match service, batch by batch, with an accept/reject heuristic per point.

use std::time::Instant;

use log::{debug, warn};

use crate::error::{check_non_negative, Result, TraceCleanError};
use crate::geo_utils::haversine_distance;
use crate::interpolation::INTERPOLATE_TRACE;
use crate::osrm::{build_client, get_osrm_match, OsrmMatch};
use crate::trace::CoordinateUpdate;
use crate::{Trace, UpdateStatus};

/// Operation name recorded in `last_updated_by`.
pub const MAP_MATCH_TRACE: &str = "map_match_trace";

/// Configuration for [`map_match_trace`].
#[derive(Debug, Clone)]
pub struct MapMatchConfig {
    /// Match service endpoint, e.g. `http://127.0.0.1:5000/match/v1/driving/`
    pub osrm_url: String,
    /// Pings per match request. Keep at or below what the OSRM server
    /// accepts (100 on a default install).
    pub batch_size: usize,
    /// Search radius in meters around each ping; a ping only matches when a
    /// road lies within this radius
    pub match_radius: f64,
    /// Average snap distance in meters deciding whether a batch matched
    /// tightly (per-edge rule) or loosely (per-point rule)
    pub avg_snap_distance: f64,
    /// Maximum ratio of matched-edge distance to raw-edge distance before a
    /// point is rejected in the per-edge rule
    pub max_matched_to_raw_ratio: f64,
}

impl Default for MapMatchConfig {
    fn default() -> Self {
        Self {
            osrm_url: "http://127.0.0.1:5000/match/v1/driving/".to_string(),
            batch_size: 5,
            match_radius: 20.0,
            avg_snap_distance: 12.0,
            max_matched_to_raw_ratio: 1.3,
        }
    }
}

/// One ping inside a match batch.
#[derive(Debug, Clone)]
pub struct BatchPoint {
    /// Id of the source ping
    pub ping_id: String,
    /// Raw (cleaned) latitude
    pub latitude: f64,
    /// Raw (cleaned) longitude
    pub longitude: f64,
    /// `last_updated_by` of the source ping, used to protect interpolated
    /// pings from re-snapping
    pub last_updated_by: String,
}

/// Outcome of the acceptance walk for one point of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Id of the source ping
    pub ping_id: String,
    /// Latitude to carry forward (matched when accepted, raw otherwise)
    pub latitude: f64,
    /// Longitude to carry forward
    pub longitude: f64,
    /// Whether the matched location was accepted
    pub accepted: bool,
}

/// Snap every valid ping of the trace onto the road network.
///
/// Pings with valid coordinates are partitioned into consecutive batches of
/// `batch_size` and each batch is matched with one request. Within a batch
/// the acceptance rule depends on how tightly the batch snapped overall (see
/// [`select_matched_points`]). Accepted points get their cleaned location
/// overwritten, `update_status = updated` and `last_updated_by =
/// "map_match_trace"`; rejected points are left untouched — map matching
/// never drops a ping.
///
/// A batch for which the service reports no match keeps its raw coordinates.
/// Only a transport failure aborts the whole operation.
pub fn map_match_trace(trace: &mut Trace, config: &MapMatchConfig) -> Result<()> {
    let started = Instant::now();

    if config.batch_size < 2 {
        return Err(TraceCleanError::invalid_parameter(
            "batch_size",
            format!("must be at least 2, got {}", config.batch_size),
        ));
    }
    check_non_negative("match_radius", config.match_radius)?;
    check_non_negative("avg_snap_distance", config.avg_snap_distance)?;
    check_non_negative("max_matched_to_raw_ratio", config.max_matched_to_raw_ratio)?;

    let points: Vec<BatchPoint> = trace
        .pings()
        .iter()
        .filter_map(|p| {
            let (latitude, longitude) = p.cleaned_position()?;
            Some(BatchPoint {
                ping_id: p.ping_id.clone(),
                latitude,
                longitude,
                last_updated_by: p.last_updated_by.clone(),
            })
        })
        .collect();

    let client = build_client(&config.osrm_url)?;
    let mut updates: Vec<CoordinateUpdate> = Vec::new();
    let mut matched_batches = 0usize;

    for batch in points.chunks(config.batch_size) {
        // The match service needs at least two coordinates; a trailing
        // single-ping batch cannot match.
        if batch.len() < 2 {
            continue;
        }

        let coords: Vec<(f64, f64)> = batch.iter().map(|p| (p.latitude, p.longitude)).collect();
        let matched = get_osrm_match(&client, &config.osrm_url, &coords, config.match_radius)?;

        let Some(matched) = matched else {
            warn!(
                "map_match_trace: no match for batch starting at ping {}, keeping raw coordinates",
                batch[0].ping_id
            );
            continue;
        };

        matched_batches += 1;
        for outcome in select_matched_points(batch, &matched, config) {
            if outcome.accepted {
                updates.push(CoordinateUpdate {
                    ping_id: outcome.ping_id,
                    cleaned_latitude: Some(outcome.latitude),
                    cleaned_longitude: Some(outcome.longitude),
                    update_status: UpdateStatus::Updated,
                    last_updated_by: MAP_MATCH_TRACE,
                });
            }
        }
    }

    debug!(
        "map_match_trace: accepted {} points from {matched_batches} matched batches",
        updates.len()
    );

    trace.merge_coordinate_updates(&updates);
    trace.record_runtime(MAP_MATCH_TRACE, started.elapsed());
    Ok(())
}

/// Decide, point by point, whether a batch's matched locations are kept.
///
/// When the batch snapped tightly overall (`total_snap_distance <
/// avg_snap_distance × batch_len`) the walk compares consecutive pairs: the
/// later point of each pair is accepted unless it is an interpolated ping or
/// the matched-edge distance exceeds `max_matched_to_raw_ratio ×` the
/// raw-edge distance. A rejected point re-anchors the matched cursor on its
/// raw coordinate.
///
/// A loosely snapped batch falls back to a per-point rule: accept only
/// points whose individual snap distance is below half of
/// `avg_snap_distance` and that are not interpolated.
pub fn select_matched_points(
    batch: &[BatchPoint],
    matched: &OsrmMatch,
    config: &MapMatchConfig,
) -> Vec<MatchOutcome> {
    let mut outcomes = Vec::with_capacity(batch.len());
    if batch.is_empty() || matched.matched.is_empty() {
        return outcomes;
    }

    let tight = matched.total_snap_distance < config.avg_snap_distance * batch.len() as f64;

    if tight {
        let mut prev_matched = matched.matched[0];
        let mut prev_raw = (batch[0].latitude, batch[0].longitude);

        for (point, &snapped) in batch.iter().zip(&matched.matched) {
            let raw = (point.latitude, point.longitude);
            let matched_edge =
                haversine_distance(prev_matched.0, prev_matched.1, snapped.0, snapped.1);
            let raw_edge = haversine_distance(prev_raw.0, prev_raw.1, raw.0, raw.1);

            let reject = point.last_updated_by == INTERPOLATE_TRACE
                || matched_edge > config.max_matched_to_raw_ratio * raw_edge;

            if reject {
                prev_matched = raw;
                outcomes.push(MatchOutcome {
                    ping_id: point.ping_id.clone(),
                    latitude: raw.0,
                    longitude: raw.1,
                    accepted: false,
                });
            } else {
                prev_matched = snapped;
                outcomes.push(MatchOutcome {
                    ping_id: point.ping_id.clone(),
                    latitude: snapped.0,
                    longitude: snapped.1,
                    accepted: true,
                });
            }

            prev_raw = raw;
        }
    } else {
        for (point, &snapped) in batch.iter().zip(&matched.matched) {
            let raw = (point.latitude, point.longitude);
            let snap = haversine_distance(snapped.0, snapped.1, raw.0, raw.1);
            let accepted = snap < config.avg_snap_distance / 2.0
                && point.last_updated_by != INTERPOLATE_TRACE;

            let (latitude, longitude) = if accepted { snapped } else { raw };
            outcomes.push(MatchOutcome {
                ping_id: point.ping_id.clone(),
                latitude,
                longitude,
                accepted,
            });
        }
    }

    outcomes
}
