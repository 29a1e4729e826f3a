//! # traceclean
//!
//! GPS trace cleaning library.
//!
//! A *trace* is the ordered sequence of timestamped GPS samples (*pings*)
//! recorded for one trip. This library provides:
//! - Proximity filtering of redundant pings
//! - Distance-ratio and angle-deviation distortion repair
//! - Road-network snapping via an external OSRM match service
//! - Synthesis of missing pings along matched roads (interpolation)
//! - Stop-event detection and aggregation
//! - Cleaned-trace output with cleaning, distance and stop summaries
//!
//! The pipeline is synchronous and single-threaded: each operation mutates
//! the [`Trace`] in place and fully completes (including any OSRM calls)
//! before the next one runs. Operations may be applied in any order, though
//! map matching should precede interpolation.
//!
//! ## Quick start
//!
//! ```rust
//! use traceclean::{RawPing, Trace, TracePayload};
//!
//! let payload = TracePayload::from_pings(vec![
//!     RawPing::new(12.9716, 77.5946, 1_700_000_000_000),
//!     RawPing::new(12.9726, 77.5956, 1_700_000_010_000),
//! ]);
//!
//! let mut trace = Trace::new(payload).unwrap();
//! traceclean::remove_nearby_pings(&mut trace, 5.0).unwrap();
//!
//! let output = traceclean::trace_cleaning_output(&trace).unwrap();
//! assert_eq!(output.cleaning_summary.total_pings_in_input, 2);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TraceCleanError};

// Geographic utilities (distance, bearing, straight-line constructions)
pub mod geo_utils;

// Human-readable timestamp and duration rendering
pub mod timefmt;

// Trace state and the merge-by-id write primitives
pub mod trace;
pub use trace::Trace;

// Proximity filter
pub mod filtering;
pub use filtering::remove_nearby_pings;

// Distortion imputers (distance ratio, angle deviation)
pub mod imputation;
pub use imputation::{impute_distorted_pings_with_angle, impute_distorted_pings_with_distance};

// OSRM wire protocol (match + route requests)
pub mod osrm;

// Map matching (batching + accept/reject heuristics)
pub mod map_matching;
pub use map_matching::{map_match_trace, MapMatchConfig};

// Route-based interpolation of missing pings
pub mod interpolation;
pub use interpolation::{interpolate_trace, InterpolateConfig};

// Union-Find data structure used by stop clustering
pub mod union_find;
pub use union_find::UnionFind;

// Stop-event detection and aggregation
pub mod stops;
pub use stops::{
    add_stop_events_info, add_stop_events_info_with, RadiusStopLabeler, StopConfig, StopLabeler,
    StopPoint,
};

// Output aggregation (cleaned trace + summaries)
pub mod output;
pub use output::{trace_cleaning_output, CleanTraceOutput};

// Structural validation of the aggregated output
pub mod validation;

/// Value recorded in `last_updated_by` before any operation touches a ping.
pub const NEVER_UPDATED: &str = "never_updated";

/// Default vehicle type assumed when the payload does not carry one.
pub const DEFAULT_VEHICLE_TYPE: &str = "car";

/// Default average vehicle speed in km/h.
pub const DEFAULT_VEHICLE_SPEED: f64 = 25.0;

// ============================================================================
// Core Types
// ============================================================================

/// Update status of a ping in the cleaned trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// Location identical to the input
    #[default]
    Unchanged,
    /// Location rewritten by a cleaning operation
    Updated,
    /// Removed from the cleaned trace (null cleaned coordinates)
    Dropped,
    /// Synthesized by interpolation; never existed in the input
    Interpolated,
}

/// One GPS sample as supplied by the caller.
///
/// Only `timestamp` is mandatory; every other field has a neutral default so
/// payloads can stay sparse. Coordinates may be `None` for pings that carry
/// only an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPing {
    /// Unique identifier; assigned from the sort position when absent
    #[serde(default)]
    pub ping_id: Option<String>,
    /// Latitude in decimal degrees, or `None`
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees, or `None`
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// GPS error radius in meters
    #[serde(default)]
    pub error_radius: Option<f64>,
    /// Event that occurred at this ping, if any
    #[serde(default)]
    pub event_type: Option<String>,
    /// When true, the proximity filter must not drop this ping
    #[serde(default)]
    pub force_retain: bool,
    /// Caller-defined metadata, passed through untouched
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RawPing {
    /// Create a raw ping from coordinates and a millisecond timestamp.
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            ping_id: None,
            latitude: Some(latitude),
            longitude: Some(longitude),
            timestamp,
            error_radius: None,
            event_type: None,
            force_retain: false,
            metadata: HashMap::new(),
        }
    }

    /// Set the ping id.
    pub fn with_id(mut self, ping_id: impl Into<String>) -> Self {
        self.ping_id = Some(ping_id.into());
        self
    }

    /// Mark the ping as not droppable by the proximity filter.
    pub fn with_force_retain(mut self) -> Self {
        self.force_retain = true;
        self
    }
}

/// Input payload for one trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracePayload {
    /// The pings of the trace, in any order
    pub trace: Vec<RawPing>,
    /// Type of vehicle that produced the trace
    #[serde(default = "default_vehicle_type")]
    pub vehicle_type: String,
    /// Average vehicle speed in km/h
    #[serde(default = "default_vehicle_speed")]
    pub vehicle_speed: f64,
}

fn default_vehicle_type() -> String {
    DEFAULT_VEHICLE_TYPE.to_string()
}

fn default_vehicle_speed() -> f64 {
    DEFAULT_VEHICLE_SPEED
}

impl TracePayload {
    /// Create a payload with the default vehicle attributes.
    pub fn from_pings(trace: Vec<RawPing>) -> Self {
        Self {
            trace,
            vehicle_type: default_vehicle_type(),
            vehicle_speed: default_vehicle_speed(),
        }
    }
}

/// One GPS sample inside a [`Trace`].
///
/// The input coordinates are immutable once set; cleaning operations only
/// write the `cleaned_*` pair, the status/audit fields and the stop fields,
/// always through the merge primitives on [`Trace`].
#[derive(Debug, Clone, Serialize)]
pub struct Ping {
    /// Unique identifier within the trace
    pub ping_id: String,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Original latitude; `None` for interpolated pings
    pub input_latitude: Option<f64>,
    /// Original longitude; `None` for interpolated pings
    pub input_longitude: Option<f64>,
    /// Working latitude; `None` means dropped
    pub cleaned_latitude: Option<f64>,
    /// Working longitude; `None` means dropped
    pub cleaned_longitude: Option<f64>,
    /// GPS error radius in meters
    pub error_radius: Option<f64>,
    /// Event that occurred at this ping
    pub event_type: Option<String>,
    /// When true, the proximity filter must not drop this ping
    pub force_retain: bool,
    /// Caller-defined metadata
    pub metadata: HashMap<String, serde_json::Value>,
    /// How the ping relates to its input state
    pub update_status: UpdateStatus,
    /// Name of the operation that last modified the ping
    pub last_updated_by: String,
    /// Whether this ping belongs to a stop event
    pub stop_event_status: bool,
    /// Sequence number of the stop event, −1 when not a stop ping
    pub stop_event_sequence_number: i64,
    /// Representative latitude of the stop event
    pub representative_stop_event_latitude: Option<f64>,
    /// Representative longitude of the stop event
    pub representative_stop_event_longitude: Option<f64>,
    /// Cumulative stop time within the event up to this ping
    pub cumulative_stop_event_time: String,
}

impl Ping {
    /// Cleaned `(lat, lng)` if both coordinates are present.
    pub fn cleaned_position(&self) -> Option<(f64, f64)> {
        Some((self.cleaned_latitude?, self.cleaned_longitude?))
    }

    /// Input `(lat, lng)` if both coordinates are present.
    pub fn input_position(&self) -> Option<(f64, f64)> {
        Some((self.input_latitude?, self.input_longitude?))
    }

    /// True for pings synthesized by interpolation.
    pub fn is_interpolated(&self) -> bool {
        self.update_status == UpdateStatus::Interpolated
    }
}
