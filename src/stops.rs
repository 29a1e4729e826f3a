//! Stop-event detection: classify stationary periods of the trace and write
//! per-ping stop information back into the state.
//!
//! The clustering itself sits behind the [`StopLabeler`] trait so any
//! spatiotemporal clustering implementation can be plugged in. The built-in
//! [`RadiusStopLabeler`] grows groups of consecutive near-stationary pings
//! and merges groups whose centers fall within a merge radius, using an
//! R-tree prefilter and Union-Find.

use std::collections::HashMap;
use std::time::Instant;

use log::{debug, warn};
use rstar::{primitives::GeomWithData, RTree, AABB};

use crate::error::{check_strictly_positive, Result, TraceCleanError};
use crate::geo_utils::{haversine_distance, meters_to_degrees};
use crate::timefmt::format_duration_ms;
use crate::trace::StopUpdate;
use crate::union_find::UnionFind;
use crate::Trace;

/// Operation name recorded in the runtime ledger.
pub const ADD_STOP_EVENTS_INFO: &str = "add_stop_events_info";

/// One valid, time-ordered sample fed to a [`StopLabeler`].
#[derive(Debug, Clone, Copy)]
pub struct StopPoint {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Unix timestamp in seconds
    pub timestamp_secs: i64,
}

/// Clustering oracle for stop detection.
///
/// Implementations return one label per input point: `-1` for "not part of a
/// stop", otherwise a non-negative cluster label. A failing oracle is
/// tolerated by the caller — every point is then treated as non-stop.
pub trait StopLabeler {
    /// Label every point of a valid, time-sorted trace.
    fn label(&self, points: &[StopPoint]) -> Result<Vec<i64>>;
}

/// Configuration for stop detection.
#[derive(Debug, Clone)]
pub struct StopConfig {
    /// Maximum distance in meters between a ping and the running center of
    /// its group for the ping to count as stationary
    pub linkage_radius: f64,
    /// Maximum distance in meters between two group centers for the groups
    /// to merge into one stop cluster
    pub merge_radius: f64,
    /// Minimum number of pings that can constitute a stop
    pub min_size: usize,
    /// Shortest dwell time in seconds that can constitute a stop
    pub min_duration_secs: i64,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            linkage_radius: 10.0,
            merge_radius: 0.001,
            min_size: 2,
            min_duration_secs: 120,
        }
    }
}

fn validate_config(config: &StopConfig) -> Result<()> {
    check_strictly_positive("linkage_radius", config.linkage_radius)?;
    check_strictly_positive("merge_radius", config.merge_radius)?;
    if config.min_size < 2 {
        return Err(TraceCleanError::invalid_parameter(
            "min_size",
            format!("must be at least 2, got {}", config.min_size),
        ));
    }
    if config.min_duration_secs <= 0 {
        return Err(TraceCleanError::invalid_parameter(
            "min_duration_secs",
            format!("must be positive, got {}", config.min_duration_secs),
        ));
    }
    Ok(())
}

/// Built-in radius/dwell clustering.
///
/// Pass 1 walks the time-sorted points and grows a group while each next
/// point stays within `linkage_radius` meters of the group's running
/// centroid; groups with at least `min_size` points and a dwell of at least
/// `min_duration_secs` become stop candidates. Pass 2 merges candidates
/// whose centroids lie within `merge_radius` meters of each other; merged
/// clusters share one label, assigned in order of first appearance.
#[derive(Debug, Clone)]
pub struct RadiusStopLabeler {
    config: StopConfig,
}

impl RadiusStopLabeler {
    /// Create a labeler from a stop configuration.
    pub fn new(config: StopConfig) -> Self {
        Self { config }
    }
}

/// A candidate stationary group: index range plus centroid.
struct CandidateGroup {
    start: usize,
    end: usize,
    center: (f64, f64),
}

impl StopLabeler for RadiusStopLabeler {
    fn label(&self, points: &[StopPoint]) -> Result<Vec<i64>> {
        let mut labels = vec![-1i64; points.len()];
        if points.is_empty() {
            return Ok(labels);
        }

        let candidates = self.stationary_groups(points);
        if candidates.is_empty() {
            return Ok(labels);
        }

        // Merge candidate groups whose centers are close; an R-tree keeps the
        // candidate pairing near-linear on long traces.
        let tree: RTree<GeomWithData<[f64; 2], usize>> = RTree::bulk_load(
            candidates
                .iter()
                .enumerate()
                .map(|(i, g)| GeomWithData::new([g.center.0, g.center.1], i))
                .collect(),
        );

        let mut uf: UnionFind<usize> = UnionFind::new();
        for (i, group) in candidates.iter().enumerate() {
            uf.make_set(i);
            let (lat, lng) = group.center;
            let d_lat = self.config.merge_radius / 111_320.0;
            let d_lng = meters_to_degrees(self.config.merge_radius, lat);
            let envelope =
                AABB::from_corners([lat - d_lat, lng - d_lng], [lat + d_lat, lng + d_lng]);

            for neighbor in tree.locate_in_envelope(&envelope) {
                let j = neighbor.data;
                if j == i {
                    continue;
                }
                let other = candidates[j].center;
                if haversine_distance(lat, lng, other.0, other.1) <= self.config.merge_radius {
                    uf.union(&i, &j);
                }
            }
        }

        // Assign labels per merged root, ascending by first appearance.
        let mut label_by_root: HashMap<usize, i64> = HashMap::new();
        let mut next_label = 0i64;
        for (i, group) in candidates.iter().enumerate() {
            let root = uf.find(&i);
            let label = *label_by_root.entry(root).or_insert_with(|| {
                let label = next_label;
                next_label += 1;
                label
            });
            for item in labels.iter_mut().take(group.end + 1).skip(group.start) {
                *item = label;
            }
        }

        Ok(labels)
    }
}

impl RadiusStopLabeler {
    fn stationary_groups(&self, points: &[StopPoint]) -> Vec<CandidateGroup> {
        let mut groups = Vec::new();

        let mut start = 0usize;
        let mut sum_lat = points[0].latitude;
        let mut sum_lng = points[0].longitude;
        let mut count = 1usize;

        let mut close_group = |start: usize, end: usize, sum_lat: f64, sum_lng: f64| {
            let size = end - start + 1;
            let dwell = points[end].timestamp_secs - points[start].timestamp_secs;
            if size >= self.config.min_size && dwell >= self.config.min_duration_secs {
                groups.push(CandidateGroup {
                    start,
                    end,
                    center: (sum_lat / size as f64, sum_lng / size as f64),
                });
            }
        };

        for (i, point) in points.iter().enumerate().skip(1) {
            let center = (sum_lat / count as f64, sum_lng / count as f64);
            let distance =
                haversine_distance(center.0, center.1, point.latitude, point.longitude);

            if distance <= self.config.linkage_radius {
                sum_lat += point.latitude;
                sum_lng += point.longitude;
                count += 1;
            } else {
                close_group(start, i - 1, sum_lat, sum_lng);
                start = i;
                sum_lat = point.latitude;
                sum_lng = point.longitude;
                count = 1;
            }
        }
        close_group(start, points.len() - 1, sum_lat, sum_lng);

        groups
    }
}

/// Detect stop events with the built-in [`RadiusStopLabeler`].
pub fn add_stop_events_info(trace: &mut Trace, config: &StopConfig) -> Result<()> {
    validate_config(config)?;
    let labeler = RadiusStopLabeler::new(config.clone());
    add_stop_events_info_with(trace, &labeler)
}

/// Detect stop events with a caller-provided clustering oracle.
///
/// Valid pings (non-null cleaned coordinates) are fed to the labeler in time
/// order. Labels are post-processed into per-ping stop fields: a
/// representative location (mean lat/lng per label), ascending sequence
/// numbers per contiguous run of identically-labeled stop pings (a non-stop
/// ping or a label change breaks the run), and a running per-run stop time.
/// A failing labeler degrades to "no stops anywhere" instead of erroring.
pub fn add_stop_events_info_with(trace: &mut Trace, labeler: &dyn StopLabeler) -> Result<()> {
    let started = Instant::now();

    let valid: Vec<(String, StopPoint)> = trace
        .pings()
        .iter()
        .filter_map(|p| {
            let (latitude, longitude) = p.cleaned_position()?;
            Some((
                p.ping_id.clone(),
                StopPoint {
                    latitude,
                    longitude,
                    timestamp_secs: p.timestamp / 1000,
                },
            ))
        })
        .collect();

    let points: Vec<StopPoint> = valid.iter().map(|(_, p)| *p).collect();

    let labels = match labeler.label(&points) {
        Ok(labels) if labels.len() == points.len() => labels,
        Ok(labels) => {
            warn!(
                "stop labeler returned {} labels for {} points, treating every ping as non-stop",
                labels.len(),
                points.len()
            );
            vec![-1; points.len()]
        }
        Err(err) => {
            warn!("stop labeling failed ({err}), treating every ping as non-stop");
            vec![-1; points.len()]
        }
    };

    // Representative location: mean lat/lng over every ping sharing a label.
    let mut sums: HashMap<i64, (f64, f64, usize)> = HashMap::new();
    for ((_, point), &label) in valid.iter().zip(&labels) {
        if label >= 0 {
            let entry = sums.entry(label).or_insert((0.0, 0.0, 0));
            entry.0 += point.latitude;
            entry.1 += point.longitude;
            entry.2 += 1;
        }
    }
    let representative: HashMap<i64, (f64, f64)> = sums
        .into_iter()
        .map(|(label, (lat, lng, n))| (label, (lat / n as f64, lng / n as f64)))
        .collect();

    let mut updates = Vec::with_capacity(valid.len());
    let mut sequence = 0i64;
    let mut prev_label = -1i64;
    let mut prev_secs = 0i64;
    let mut run_secs = 0i64;

    for ((ping_id, point), &label) in valid.iter().zip(&labels) {
        if label < 0 {
            prev_label = -1;
            updates.push(StopUpdate {
                ping_id: ping_id.clone(),
                stop_event_status: false,
                stop_event_sequence_number: -1,
                representative_stop_event_latitude: None,
                representative_stop_event_longitude: None,
                cumulative_stop_event_time: format_duration_ms(0),
            });
            continue;
        }

        if label != prev_label {
            sequence += 1;
            run_secs = 0;
        } else {
            run_secs += point.timestamp_secs - prev_secs;
        }

        let (rep_lat, rep_lng) = representative[&label];
        updates.push(StopUpdate {
            ping_id: ping_id.clone(),
            stop_event_status: true,
            stop_event_sequence_number: sequence,
            representative_stop_event_latitude: Some(rep_lat),
            representative_stop_event_longitude: Some(rep_lng),
            cumulative_stop_event_time: format_duration_ms(run_secs),
        });

        prev_label = label;
        prev_secs = point.timestamp_secs;
    }

    debug!(
        "add_stop_events_info: {} stop pings across {sequence} stop events",
        updates.iter().filter(|u| u.stop_event_status).count()
    );

    trace.merge_stop_updates(updates);
    trace.record_runtime(ADD_STOP_EVENTS_INFO, started.elapsed());
    Ok(())
}
