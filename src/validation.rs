//! Structural validation of the aggregated cleaning output.
//!
//! The output types make missing or extra keys unrepresentable, so what is
//! left to check are value domains (coordinate ranges, timestamp range,
//! non-negative distances and counts) and cross-field consistency (the
//! update-status percentages accounting for the whole input). Every
//! violation is a hard error.

use crate::error::{Result, TraceCleanError};
use crate::output::{
    CleanTraceOutput, CleanedPing, CleaningSummary, DistanceSummary, StopSummary,
};

/// Smallest accepted unix timestamp, milliseconds.
pub const MIN_UNIX_TIMESTAMP_MS: i64 = 0;

/// Largest accepted unix timestamp, milliseconds (2038-01-01 00:00:00 UTC).
pub const MAX_UNIX_TIMESTAMP_MS: i64 = 2_145_916_800_000;

/// The four update-status percentages must account for at least this much of
/// the non-null input pings.
const MIN_STATUS_PERCENTAGE_SUM: f64 = 99.9;

fn check_latitude(field: &'static str, value: Option<f64>) -> Result<()> {
    if let Some(lat) = value {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(TraceCleanError::RangeViolation {
                field,
                value: lat.to_string(),
                expected: "a latitude within [-90, 90]",
            });
        }
    }
    Ok(())
}

fn check_longitude(field: &'static str, value: Option<f64>) -> Result<()> {
    if let Some(lng) = value {
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(TraceCleanError::RangeViolation {
                field,
                value: lng.to_string(),
                expected: "a longitude within [-180, 180]",
            });
        }
    }
    Ok(())
}

fn check_not_negative_f64(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(TraceCleanError::RangeViolation {
            field,
            value: value.to_string(),
            expected: "a finite non-negative number",
        });
    }
    Ok(())
}

fn check_not_negative_i64(field: &'static str, value: i64) -> Result<()> {
    if value < 0 {
        return Err(TraceCleanError::RangeViolation {
            field,
            value: value.to_string(),
            expected: "a non-negative number",
        });
    }
    Ok(())
}

fn check_timestamp(field: &'static str, value: i64) -> Result<()> {
    if !(MIN_UNIX_TIMESTAMP_MS..=MAX_UNIX_TIMESTAMP_MS).contains(&value) {
        return Err(TraceCleanError::RangeViolation {
            field,
            value: value.to_string(),
            expected: "a unix millisecond timestamp within [0, 2145916800000]",
        });
    }
    Ok(())
}

/// Validate one ping of the cleaned trace.
pub fn validate_cleaned_ping(ping: &CleanedPing) -> Result<()> {
    check_latitude("input_latitude", ping.input_latitude)?;
    check_latitude("cleaned_latitude", ping.cleaned_latitude)?;
    check_latitude(
        "representative_stop_event_latitude",
        ping.representative_stop_event_latitude,
    )?;
    check_longitude("input_longitude", ping.input_longitude)?;
    check_longitude("cleaned_longitude", ping.cleaned_longitude)?;
    check_longitude(
        "representative_stop_event_longitude",
        ping.representative_stop_event_longitude,
    )?;
    check_timestamp("timestamp", ping.timestamp)?;

    if let Some(radius) = ping.error_radius {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(TraceCleanError::RangeViolation {
                field: "error_radius",
                value: radius.to_string(),
                expected: "a positive number of meters",
            });
        }
    }

    check_not_negative_i64("time_since_prev_ping", ping.time_since_prev_ping)?;
    check_not_negative_f64("dist_from_prev_ping", ping.dist_from_prev_ping)?;
    check_not_negative_f64(
        "cleaned_trace_cumulative_dist",
        ping.cleaned_trace_cumulative_dist,
    )?;
    check_not_negative_i64(
        "cleaned_trace_cumulative_time",
        ping.cleaned_trace_cumulative_time,
    )?;
    Ok(())
}

/// Validate the cleaning summary against the raw input length.
///
/// Besides value domains this enforces the accounting rule: when the input
/// held any non-null ping, the unchanged/drop/updation/interpolation
/// percentages must sum to at least 99.9.
pub fn validate_cleaning_summary(summary: &CleaningSummary, raw_ping_count: usize) -> Result<()> {
    check_not_negative_f64("unchanged_percentage", summary.unchanged_percentage)?;
    check_not_negative_f64("drop_percentage", summary.drop_percentage)?;
    check_not_negative_f64("updation_percentage", summary.updation_percentage)?;
    check_not_negative_f64("interpolation_percentage", summary.interpolation_percentage)?;
    check_not_negative_f64("total_execution_time", summary.total_execution_time)?;

    if summary.total_pings_in_input != raw_ping_count {
        return Err(TraceCleanError::Inconsistent(format!(
            "cleaning summary reports {} input pings, the raw trace held {}",
            summary.total_pings_in_input, raw_ping_count
        )));
    }

    if summary.total_non_null_pings_in_input > summary.total_pings_in_input {
        return Err(TraceCleanError::Inconsistent(format!(
            "{} non-null input pings exceed the {} total input pings",
            summary.total_non_null_pings_in_input, summary.total_pings_in_input
        )));
    }

    if summary.total_non_null_pings_in_input > 0 {
        let sum = summary.unchanged_percentage
            + summary.drop_percentage
            + summary.updation_percentage
            + summary.interpolation_percentage;
        if sum < MIN_STATUS_PERCENTAGE_SUM {
            return Err(TraceCleanError::Inconsistent(format!(
                "update-status percentages sum to {sum}, expected at least \
                 {MIN_STATUS_PERCENTAGE_SUM}"
            )));
        }
    }

    Ok(())
}

/// Validate the distance summary.
pub fn validate_distance_summary(summary: &DistanceSummary) -> Result<()> {
    check_not_negative_f64(
        "cumulative_distance_of_raw_trace",
        summary.cumulative_distance_of_raw_trace,
    )?;
    check_not_negative_f64(
        "cumulative_distance_of_clean_trace",
        summary.cumulative_distance_of_clean_trace,
    )?;
    check_not_negative_f64("percent_reduction_in_dist", summary.percent_reduction_in_dist)
}

/// Validate the stop summary.
pub fn validate_stop_summary(summary: &StopSummary) -> Result<()> {
    for event in &summary.stop_events_info {
        check_latitude("representative_latitude", event.representative_latitude)?;
        check_longitude("representative_longitude", event.representative_longitude)?;
    }
    check_not_negative_f64(
        "stop_event_percentage",
        summary.global_stop_events_info.stop_event_percentage,
    )
}

/// Validate the complete cleaning output.
///
/// Called by [`trace_cleaning_output`](crate::trace_cleaning_output) before
/// the output is returned; any violation aborts the aggregation.
pub fn validate_output(output: &CleanTraceOutput, raw_ping_count: usize) -> Result<()> {
    if output.cleaned_trace.is_empty() {
        return Err(TraceCleanError::Inconsistent(
            "cleaned_trace cannot be empty".to_string(),
        ));
    }

    for ping in &output.cleaned_trace {
        validate_cleaned_ping(ping)?;
    }
    validate_cleaning_summary(&output.cleaning_summary, raw_ping_count)?;
    validate_distance_summary(&output.distance_summary)?;
    validate_stop_summary(&output.stop_summary)
}
