//! Proximity filter: drop pings that sit too close to the last retained one.

use std::time::Instant;

use log::debug;

use crate::error::{check_non_negative, Result};
use crate::geo_utils::haversine_distance;
use crate::trace::CoordinateUpdate;
use crate::{Trace, UpdateStatus};

/// Operation name recorded in `last_updated_by`.
pub const REMOVE_NEARBY_PINGS: &str = "remove_nearby_pings";

/// Remove pings closer than `min_distance` meters to the last retained ping.
///
/// A single left-to-right scan tracks the most recent *retained* valid
/// location. Each later ping with valid coordinates is compared against that
/// anchor: within `min_distance` and not `force_retain`, the ping is dropped
/// (cleaned coordinates nulled, status `dropped`) and the anchor stays put;
/// otherwise the ping is kept and becomes the new anchor. Pings with null
/// coordinates neither advance nor drop the anchor, interpolated pings are
/// never dropped, and the first ping only seeds the anchor.
///
/// The scan is idempotent: a second pass with the same threshold finds every
/// surviving ping at least `min_distance` from its predecessor and drops
/// nothing.
pub fn remove_nearby_pings(trace: &mut Trace, min_distance: f64) -> Result<()> {
    let started = Instant::now();
    check_non_negative("min_distance", min_distance)?;

    let mut updates = Vec::new();
    let mut anchor: Option<(f64, f64)> = None;

    for ping in trace.pings() {
        let Some(position) = ping.cleaned_position() else {
            continue;
        };

        // The first valid ping seeds the anchor without being evaluated.
        let Some(prev) = anchor else {
            anchor = Some(position);
            continue;
        };

        if ping.is_interpolated() {
            continue;
        }

        let distance = haversine_distance(prev.0, prev.1, position.0, position.1);
        if distance < min_distance && !ping.force_retain {
            updates.push(CoordinateUpdate {
                ping_id: ping.ping_id.clone(),
                cleaned_latitude: None,
                cleaned_longitude: None,
                update_status: UpdateStatus::Dropped,
                last_updated_by: REMOVE_NEARBY_PINGS,
            });
            continue;
        }

        anchor = Some(position);
    }

    debug!(
        "remove_nearby_pings: dropping {} of {} pings (min_distance {min_distance} m)",
        updates.len(),
        trace.len()
    );

    trace.merge_coordinate_updates(&updates);
    trace.record_runtime(REMOVE_NEARBY_PINGS, started.elapsed());
    Ok(())
}
