//! Trace state: the ordered ping sequence every cleaning operation works on,
//! plus the merge-by-id primitives operations use to write results back.
//!
//! The sequence is sorted ascending by timestamp once, at construction, and
//! never reordered afterwards; interpolation splices synthetic pings in place
//! between their bounding pair. A secondary id→index map is kept in sync so
//! merges stay cheap after splicing.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::error::{Result, TraceCleanError};
use crate::timefmt::format_duration_ms;
use crate::{Ping, TracePayload, UpdateStatus, NEVER_UPDATED};

/// A field-level update to one ping's cleaned location and audit fields.
///
/// `cleaned_latitude`/`cleaned_longitude` are written as given — `None`
/// drops the ping. Fields not present on this struct are never touched by
/// [`Trace::merge_coordinate_updates`].
#[derive(Debug, Clone)]
pub struct CoordinateUpdate {
    /// Id of the ping to update
    pub ping_id: String,
    /// New cleaned latitude (`None` = dropped)
    pub cleaned_latitude: Option<f64>,
    /// New cleaned longitude (`None` = dropped)
    pub cleaned_longitude: Option<f64>,
    /// New update status
    pub update_status: UpdateStatus,
    /// Name of the operation performing the update
    pub last_updated_by: &'static str,
}

/// A field-level update to one ping's stop-event fields.
#[derive(Debug, Clone)]
pub struct StopUpdate {
    /// Id of the ping to update
    pub ping_id: String,
    /// Whether the ping belongs to a stop event
    pub stop_event_status: bool,
    /// Sequence number of the stop event (−1 = not a stop)
    pub stop_event_sequence_number: i64,
    /// Representative latitude of the stop event
    pub representative_stop_event_latitude: Option<f64>,
    /// Representative longitude of the stop event
    pub representative_stop_event_longitude: Option<f64>,
    /// Cumulative stop time within the event up to this ping
    pub cumulative_stop_event_time: String,
}

/// Elapsed wall-clock time of one executed operation.
#[derive(Debug, Clone)]
pub struct OperationTiming {
    /// Operation name as recorded in `last_updated_by`
    pub name: &'static str,
    /// Elapsed time in seconds
    pub seconds: f64,
}

/// The in-memory state of one trace during cleaning.
///
/// Owned exclusively by the caller; operations borrow it mutably one at a
/// time, so the pipeline is serialized by construction.
#[derive(Debug, Clone)]
pub struct Trace {
    pings: Vec<Ping>,
    index_by_id: HashMap<String, usize>,
    raw_ping_count: usize,
    vehicle_type: String,
    vehicle_speed: f64,
    runtime: Vec<OperationTiming>,
}

impl Trace {
    /// Build a trace from an input payload.
    ///
    /// Pings are sorted ascending by timestamp. Ids must be supplied either
    /// for every ping or for none; absent ids are assigned `"1".."n"` from
    /// the sorted position. Duplicate ids are rejected.
    pub fn new(payload: TracePayload) -> Result<Self> {
        let started = std::time::Instant::now();

        let TracePayload {
            mut trace,
            vehicle_type,
            vehicle_speed,
        } = payload;

        if trace.is_empty() {
            return Err(TraceCleanError::Inconsistent(
                "trace payload contains no pings".to_string(),
            ));
        }

        trace.sort_by_key(|p| p.timestamp);

        let with_id = trace.iter().filter(|p| p.ping_id.is_some()).count();
        if with_id != 0 && with_id != trace.len() {
            return Err(TraceCleanError::Inconsistent(
                "ping_id must be present on every ping or on none".to_string(),
            ));
        }

        let mut pings = Vec::with_capacity(trace.len());
        let mut seen = HashSet::with_capacity(trace.len());
        for (i, raw) in trace.into_iter().enumerate() {
            let ping_id = raw.ping_id.unwrap_or_else(|| (i + 1).to_string());
            if !seen.insert(ping_id.clone()) {
                return Err(TraceCleanError::Inconsistent(format!(
                    "duplicate ping_id `{ping_id}`"
                )));
            }
            pings.push(Ping {
                ping_id,
                timestamp: raw.timestamp,
                input_latitude: raw.latitude,
                input_longitude: raw.longitude,
                cleaned_latitude: raw.latitude,
                cleaned_longitude: raw.longitude,
                error_radius: raw.error_radius,
                event_type: raw.event_type,
                force_retain: raw.force_retain,
                metadata: raw.metadata,
                update_status: UpdateStatus::Unchanged,
                last_updated_by: NEVER_UPDATED.to_string(),
                stop_event_status: false,
                stop_event_sequence_number: -1,
                representative_stop_event_latitude: None,
                representative_stop_event_longitude: None,
                cumulative_stop_event_time: format_duration_ms(0),
            });
        }

        let raw_ping_count = pings.len();
        let mut this = Self {
            pings,
            index_by_id: HashMap::new(),
            raw_ping_count,
            vehicle_type,
            vehicle_speed,
            runtime: Vec::new(),
        };
        this.rebuild_index();
        this.record_runtime("trace_construction", started.elapsed());
        Ok(this)
    }

    /// The pings of the trace, in timestamp order.
    pub fn pings(&self) -> &[Ping] {
        &self.pings
    }

    /// Number of pings currently in the trace (input + interpolated).
    pub fn len(&self) -> usize {
        self.pings.len()
    }

    /// True when the trace holds no pings.
    pub fn is_empty(&self) -> bool {
        self.pings.is_empty()
    }

    /// Number of pings in the original input payload.
    pub fn raw_ping_count(&self) -> usize {
        self.raw_ping_count
    }

    /// Vehicle type carried by the payload.
    pub fn vehicle_type(&self) -> &str {
        &self.vehicle_type
    }

    /// Average vehicle speed in km/h carried by the payload.
    pub fn vehicle_speed(&self) -> f64 {
        self.vehicle_speed
    }

    /// Look up a ping by id.
    pub fn ping_by_id(&self, ping_id: &str) -> Option<&Ping> {
        self.index_by_id.get(ping_id).map(|&i| &self.pings[i])
    }

    /// Overwrite the cleaned location and audit fields of the matched pings.
    ///
    /// Updates whose `ping_id` is not present in the trace are silent no-ops:
    /// losing a row inside an operation's copy-filter-recombine would be a
    /// correctness bug there, not a reportable error here.
    pub fn merge_coordinate_updates(&mut self, updates: &[CoordinateUpdate]) {
        for update in updates {
            if let Some(&idx) = self.index_by_id.get(&update.ping_id) {
                let ping = &mut self.pings[idx];
                ping.cleaned_latitude = update.cleaned_latitude;
                ping.cleaned_longitude = update.cleaned_longitude;
                ping.update_status = update.update_status;
                ping.last_updated_by = update.last_updated_by.to_string();
            }
        }
    }

    /// Overwrite the stop-event fields of the matched pings.
    ///
    /// Unmatched ids are silent no-ops, as with
    /// [`merge_coordinate_updates`](Self::merge_coordinate_updates).
    pub fn merge_stop_updates(&mut self, updates: Vec<StopUpdate>) {
        for update in updates {
            if let Some(&idx) = self.index_by_id.get(&update.ping_id) {
                let ping = &mut self.pings[idx];
                ping.stop_event_status = update.stop_event_status;
                ping.stop_event_sequence_number = update.stop_event_sequence_number;
                ping.representative_stop_event_latitude =
                    update.representative_stop_event_latitude;
                ping.representative_stop_event_longitude =
                    update.representative_stop_event_longitude;
                ping.cumulative_stop_event_time = update.cumulative_stop_event_time;
            }
        }
    }

    /// Record the elapsed time of an executed operation.
    pub fn record_runtime(&mut self, name: &'static str, elapsed: Duration) {
        self.runtime.push(OperationTiming {
            name,
            seconds: elapsed.as_secs_f64(),
        });
    }

    /// Per-operation timing ledger, in execution order.
    pub fn runtime(&self) -> &[OperationTiming] {
        &self.runtime
    }

    /// Total wall-clock seconds spent in construction and operations.
    pub fn total_execution_secs(&self) -> f64 {
        self.runtime.iter().map(|t| t.seconds).sum()
    }

    /// Splice synthetic pings into the sequence.
    ///
    /// `insertions` pairs an index in the current sequence with the pings to
    /// insert immediately after it, and must be sorted ascending by index.
    /// Only the interpolation engine inserts pings, so this stays
    /// crate-private.
    pub(crate) fn splice_after(&mut self, insertions: Vec<(usize, Vec<Ping>)>) {
        if insertions.is_empty() {
            return;
        }

        let added: usize = insertions.iter().map(|(_, v)| v.len()).sum();
        let mut spliced = Vec::with_capacity(self.pings.len() + added);
        let mut pending = insertions.into_iter().peekable();

        for (i, ping) in std::mem::take(&mut self.pings).into_iter().enumerate() {
            spliced.push(ping);
            while pending.peek().is_some_and(|(at, _)| *at == i) {
                let (_, group) = pending.next().unwrap();
                spliced.extend(group);
            }
        }

        self.pings = spliced;
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        self.index_by_id = self
            .pings
            .iter()
            .enumerate()
            .map(|(i, p)| (p.ping_id.clone(), i))
            .collect();
    }
}
