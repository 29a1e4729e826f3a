//! Unified error handling for the trace cleaning pipeline.
//!
//! Every fallible operation in this crate returns [`Result`]. The error kinds
//! map the three failure families of the pipeline:
//! - parameter validation (`InvalidParameter`) — raised before any mutation
//! - structural/output validation (`RangeViolation`, `Inconsistent`)
//! - connectivity (`Connectivity`) — an OSRM call that could not complete
//!
//! Errors are terminal for the current operation: nothing is retried and
//! partial merges are not rolled back.

use thiserror::Error;

/// Errors raised by trace cleaning operations.
#[derive(Debug, Error)]
pub enum TraceCleanError {
    /// An operation argument failed validation. No mutation has occurred.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Name of the offending argument
        name: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// A value in the trace or an output summary is outside its domain.
    #[error("`{field}` out of range: {value} (expected {expected})")]
    RangeViolation {
        /// Field that carried the offending value
        field: &'static str,
        /// The offending value, rendered
        value: String,
        /// Human-readable description of the valid domain
        expected: &'static str,
    },

    /// The trace or an output summary is internally inconsistent.
    #[error("inconsistent data: {0}")]
    Inconsistent(String),

    /// An HTTP request to the map matching / routing service could not be
    /// completed. Non-200 responses are *not* this error; they are "no
    /// match"/"no route" sentinels handled by the caller.
    #[error("could not reach map service at {url}: {source}")]
    Connectivity {
        /// The request URL that failed
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TraceCleanError>;

impl TraceCleanError {
    /// Shorthand for an `InvalidParameter` error.
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Validate that a parameter is a finite, non-negative number.
pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(TraceCleanError::invalid_parameter(
            name,
            format!("must be a finite non-negative number, got {value}"),
        ));
    }
    Ok(())
}

/// Validate that a parameter is a finite, strictly positive number.
pub(crate) fn check_strictly_positive(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TraceCleanError::invalid_parameter(
            name,
            format!("must be a finite positive number, got {value}"),
        ));
    }
    Ok(())
}
