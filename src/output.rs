//! Output aggregation: derive per-ping travel fields, assemble the cleaning,
//! distance and stop summaries, and validate the result before handing it to
//! the caller.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{Result, TraceCleanError};
use crate::geo_utils::haversine_distance;
use crate::timefmt::{format_duration_hms, format_timestamp};
use crate::validation::validate_output;
use crate::{Trace, UpdateStatus};

/// One ping of the cleaned trace, including the derived travel fields.
#[derive(Debug, Clone, Serialize)]
pub struct CleanedPing {
    /// Unique identifier of the ping
    pub ping_id: String,
    /// Original latitude; `None` for interpolated pings
    pub input_latitude: Option<f64>,
    /// Original longitude; `None` for interpolated pings
    pub input_longitude: Option<f64>,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// GPS error radius in meters
    pub error_radius: Option<f64>,
    /// Event that occurred at this ping
    pub event_type: Option<String>,
    /// Whether the proximity filter was forbidden from dropping the ping
    pub force_retain: bool,
    /// Cleaned latitude; `None` when the ping was dropped
    pub cleaned_latitude: Option<f64>,
    /// Cleaned longitude; `None` when the ping was dropped
    pub cleaned_longitude: Option<f64>,
    /// How the ping relates to its input state
    pub update_status: UpdateStatus,
    /// Name of the operation that last modified the ping
    pub last_updated_by: String,
    /// Whether the ping belongs to a stop event
    pub stop_event_status: bool,
    /// Cumulative stop time within the event up to this ping
    pub cumulative_stop_event_time: String,
    /// Representative latitude of the stop event
    pub representative_stop_event_latitude: Option<f64>,
    /// Representative longitude of the stop event
    pub representative_stop_event_longitude: Option<f64>,
    /// Sequence number of the stop event, −1 when not a stop ping
    pub stop_event_sequence_number: i64,
    /// Milliseconds since the previous ping (0 for the first)
    pub time_since_prev_ping: i64,
    /// Meters from the previous valid cleaned location (0 when unknown)
    pub dist_from_prev_ping: f64,
    /// Running cleaned distance up to this ping, meters
    pub cleaned_trace_cumulative_dist: f64,
    /// Running time up to this ping, milliseconds
    pub cleaned_trace_cumulative_time: i64,
    /// Caller-defined metadata, passed through
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Counts and percentages describing what cleaning did to the trace.
#[derive(Debug, Clone, Serialize)]
pub struct CleaningSummary {
    /// Pings in the input payload
    pub total_pings_in_input: usize,
    /// Input pings with non-null coordinates
    pub total_non_null_pings_in_input: usize,
    /// Output pings with non-null cleaned coordinates
    pub total_non_null_pings_in_output: usize,
    /// Total trace time, human readable
    pub total_trace_time: String,
    /// Percentage of non-null input pings left unchanged
    pub unchanged_percentage: f64,
    /// Percentage of non-null input pings dropped
    pub drop_percentage: f64,
    /// Percentage of non-null input pings updated
    pub updation_percentage: f64,
    /// Percentage of interpolated pings w.r.t. non-null input pings
    pub interpolation_percentage: f64,
    /// Wall-clock seconds spent in construction plus cleaning operations
    pub total_execution_time: f64,
}

/// Raw vs cleaned cumulative distance.
#[derive(Debug, Clone, Serialize)]
pub struct DistanceSummary {
    /// Total distance of the raw trace in meters, null-coordinate pings
    /// ignored
    pub cumulative_distance_of_raw_trace: f64,
    /// Total distance of the cleaned trace in meters
    pub cumulative_distance_of_clean_trace: f64,
    /// Percentage reduction of cleaned vs raw distance, floored at zero
    pub percent_reduction_in_dist: f64,
}

/// Aggregate description of one stop event.
#[derive(Debug, Clone, Serialize)]
pub struct StopEventInfo {
    /// Sequence number of the stop event
    pub stop_event_sequence_number: i64,
    /// When the stop started, `YYYY-MM-DD HH:MM:SS` UTC
    pub start_time: String,
    /// When the stop ended, `YYYY-MM-DD HH:MM:SS` UTC
    pub end_time: String,
    /// Dwell time of the event, human readable
    pub total_stop_event_time: String,
    /// Number of pings in the event
    pub number_of_pings: usize,
    /// Representative latitude of the event
    pub representative_latitude: Option<f64>,
    /// Representative longitude of the event
    pub representative_longitude: Option<f64>,
}

/// Stop metrics for the whole trace.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStopEventsInfo {
    /// Total trace time, human readable
    pub total_trace_time: String,
    /// Total time spent stopped, human readable
    pub total_stop_events_time: String,
    /// Stop time as a percentage of the trace time
    pub stop_event_percentage: f64,
}

/// Stop summary: per-event entries plus global totals.
#[derive(Debug, Clone, Serialize)]
pub struct StopSummary {
    /// One entry per stop event, in sequence order
    pub stop_events_info: Vec<StopEventInfo>,
    /// Trace-level stop metrics
    pub global_stop_events_info: GlobalStopEventsInfo,
}

/// The complete result of trace cleaning.
#[derive(Debug, Clone, Serialize)]
pub struct CleanTraceOutput {
    /// The cleaned trace with derived travel fields
    pub cleaned_trace: Vec<CleanedPing>,
    /// Counts and percentages of cleaning effects
    pub cleaning_summary: CleaningSummary,
    /// Raw vs cleaned distance metrics
    pub distance_summary: DistanceSummary,
    /// Stop event metrics
    pub stop_summary: StopSummary,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

/// Assemble and validate the cleaning output from the current trace state.
///
/// Derives per-ping travel fields, the cleaning summary (percentages w.r.t.
/// the count of non-null *input* pings), the distance summary and the stop
/// summary, then runs the full output validation. Validation failures are
/// hard errors, not warnings.
pub fn trace_cleaning_output(trace: &Trace) -> Result<CleanTraceOutput> {
    let cleaned_trace = build_cleaned_trace(trace);
    let output = CleanTraceOutput {
        cleaning_summary: build_cleaning_summary(trace, &cleaned_trace),
        distance_summary: build_distance_summary(trace, &cleaned_trace),
        stop_summary: build_stop_summary(trace)?,
        cleaned_trace,
    };

    validate_output(&output, trace.raw_ping_count())?;
    Ok(output)
}

fn build_cleaned_trace(trace: &Trace) -> Vec<CleanedPing> {
    let mut rows = Vec::with_capacity(trace.len());

    let mut prev_timestamp: Option<i64> = None;
    let mut first_timestamp: Option<i64> = None;
    let mut prev_position: Option<(f64, f64)> = None;
    let mut cumulative_dist = 0.0;

    for ping in trace.pings() {
        let time_since_prev = prev_timestamp.map_or(0, |t| ping.timestamp - t);
        let cumulative_time = first_timestamp.map_or(0, |t| ping.timestamp - t);

        let position = ping.cleaned_position();
        let dist_from_prev = match (prev_position, position) {
            (Some(prev), Some(curr)) => haversine_distance(prev.0, prev.1, curr.0, curr.1),
            _ => 0.0,
        };
        cumulative_dist += dist_from_prev;

        rows.push(CleanedPing {
            ping_id: ping.ping_id.clone(),
            input_latitude: ping.input_latitude,
            input_longitude: ping.input_longitude,
            timestamp: ping.timestamp,
            error_radius: ping.error_radius,
            event_type: ping.event_type.clone(),
            force_retain: ping.force_retain,
            cleaned_latitude: ping.cleaned_latitude,
            cleaned_longitude: ping.cleaned_longitude,
            update_status: ping.update_status,
            last_updated_by: ping.last_updated_by.clone(),
            stop_event_status: ping.stop_event_status,
            cumulative_stop_event_time: ping.cumulative_stop_event_time.clone(),
            representative_stop_event_latitude: ping.representative_stop_event_latitude,
            representative_stop_event_longitude: ping.representative_stop_event_longitude,
            stop_event_sequence_number: ping.stop_event_sequence_number,
            time_since_prev_ping: time_since_prev,
            dist_from_prev_ping: dist_from_prev,
            cleaned_trace_cumulative_dist: cumulative_dist,
            cleaned_trace_cumulative_time: cumulative_time,
            metadata: ping.metadata.clone(),
        });

        prev_timestamp = Some(ping.timestamp);
        first_timestamp = first_timestamp.or(Some(ping.timestamp));
        if position.is_some() {
            prev_position = position;
        }
    }

    rows
}

fn build_cleaning_summary(trace: &Trace, cleaned: &[CleanedPing]) -> CleaningSummary {
    let total_pings_in_input = trace.raw_ping_count();

    let with_input = |p: &&CleanedPing| p.input_latitude.is_some() && p.input_longitude.is_some();
    let total_non_null_in_input = cleaned.iter().filter(with_input).count();
    let total_non_null_in_output = cleaned
        .iter()
        .filter(|p| p.cleaned_latitude.is_some() && p.cleaned_longitude.is_some())
        .count();

    let count_status = |status: UpdateStatus| {
        cleaned
            .iter()
            .filter(with_input)
            .filter(|p| p.update_status == status)
            .count()
    };
    let unchanged = count_status(UpdateStatus::Unchanged);
    let dropped = count_status(UpdateStatus::Dropped);
    let updated = count_status(UpdateStatus::Updated);
    let interpolated = cleaned
        .iter()
        .filter(|p| p.cleaned_latitude.is_some() && p.cleaned_longitude.is_some())
        .filter(|p| p.update_status == UpdateStatus::Interpolated)
        .count();

    let percentage = |count: usize| {
        if total_non_null_in_input == 0 {
            0.0
        } else {
            round2(count as f64 / total_non_null_in_input as f64 * 100.0)
        }
    };

    let first_secs = cleaned.first().map_or(0, |p| p.timestamp / 1000);
    let last_secs = cleaned.last().map_or(0, |p| p.timestamp / 1000);

    CleaningSummary {
        total_pings_in_input,
        total_non_null_pings_in_input: total_non_null_in_input,
        total_non_null_pings_in_output: total_non_null_in_output,
        total_trace_time: format_duration_hms(last_secs - first_secs),
        unchanged_percentage: percentage(unchanged),
        drop_percentage: percentage(dropped),
        updation_percentage: percentage(updated),
        interpolation_percentage: percentage(interpolated),
        total_execution_time: round5(trace.total_execution_secs()),
    }
}

fn build_distance_summary(trace: &Trace, cleaned: &[CleanedPing]) -> DistanceSummary {
    let raw_points: Vec<(f64, f64)> = trace
        .pings()
        .iter()
        .filter_map(|p| p.input_position())
        .collect();
    let raw_distance: f64 = raw_points
        .windows(2)
        .map(|w| haversine_distance(w[0].0, w[0].1, w[1].0, w[1].1))
        .sum();

    let clean_distance: f64 = cleaned.iter().map(|p| p.dist_from_prev_ping).sum();

    let raw_distance = round2(raw_distance);
    let clean_distance = round2(clean_distance);

    // Interpolation can make the cleaned trace longer; reduction never goes
    // negative.
    let reduction = if raw_distance == 0.0 || raw_distance <= clean_distance {
        0.0
    } else {
        round2((raw_distance - clean_distance) / raw_distance * 100.0)
    };

    DistanceSummary {
        cumulative_distance_of_raw_trace: raw_distance,
        cumulative_distance_of_clean_trace: clean_distance,
        percent_reduction_in_dist: reduction,
    }
}

fn build_stop_summary(trace: &Trace) -> Result<StopSummary> {
    let pings = trace.pings();

    let first_secs = pings.first().map_or(0, |p| p.timestamp / 1000);
    let last_secs = pings.last().map_or(0, |p| p.timestamp / 1000);
    let total_trace_secs = last_secs - first_secs;

    let mut events: Vec<StopEventInfo> = Vec::new();
    let mut total_stop_secs = 0i64;

    let mut i = 0usize;
    while i < pings.len() {
        let sequence = pings[i].stop_event_sequence_number;
        if sequence == -1 {
            i += 1;
            continue;
        }

        // Collect the extent of this stop event.
        let start = i;
        while i < pings.len() && pings[i].stop_event_sequence_number == sequence {
            i += 1;
        }
        let event = &pings[start..i];

        let start_secs = event.iter().map(|p| p.timestamp).min().unwrap_or(0) / 1000;
        let end_secs = event.iter().map(|p| p.timestamp).max().unwrap_or(0) / 1000;
        let dwell_secs = end_secs - start_secs;
        total_stop_secs += dwell_secs;

        let start_time = format_timestamp(start_secs).ok_or_else(|| {
            TraceCleanError::Inconsistent(format!(
                "stop event {sequence} start timestamp {start_secs} is not renderable"
            ))
        })?;
        let end_time = format_timestamp(end_secs).ok_or_else(|| {
            TraceCleanError::Inconsistent(format!(
                "stop event {sequence} end timestamp {end_secs} is not renderable"
            ))
        })?;

        events.push(StopEventInfo {
            stop_event_sequence_number: sequence,
            start_time,
            end_time,
            total_stop_event_time: format_duration_hms(dwell_secs),
            number_of_pings: event.len(),
            representative_latitude: event[0].representative_stop_event_latitude,
            representative_longitude: event[0].representative_stop_event_longitude,
        });
    }

    let stop_event_percentage = if total_trace_secs == 0 {
        0.0
    } else {
        total_stop_secs as f64 / total_trace_secs as f64 * 100.0
    };

    Ok(StopSummary {
        stop_events_info: events,
        global_stop_events_info: GlobalStopEventsInfo {
            total_trace_time: format_duration_hms(total_trace_secs),
            total_stop_events_time: format_duration_hms(total_stop_secs),
            stop_event_percentage,
        },
    })
}
