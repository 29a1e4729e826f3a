//! Human-readable timestamp and duration rendering for the summaries.

use chrono::DateTime;

/// Render a unix timestamp (seconds) as `YYYY-MM-DD HH:MM:SS` in UTC.
///
/// Returns `None` for timestamps outside chrono's representable range.
pub fn format_timestamp(secs: i64) -> Option<String> {
    let dt = DateTime::from_timestamp(secs, 0)?;
    Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Render a duration in seconds as `"H hours, M minutes and S seconds"`.
pub fn format_duration_hms(secs: i64) -> String {
    let secs = secs.max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{hours} hours, {minutes} minutes and {seconds} seconds")
}

/// Render a duration in seconds as `"M minutes and S seconds"`.
pub fn format_duration_ms(secs: i64) -> String {
    let secs = secs.max(0);
    let minutes = secs / 60;
    let seconds = secs % 60;
    format!("{minutes} minutes and {seconds} seconds")
}
