//! Slot cadence
//!
//! Measures the spacing between consecutive slots: the anchor checkpoint's
//! timestamp is taken per key and the keys are walked in time order.

use crate::events::{DerivedInterval, DurationUnit, Event, EventKey, Timestamp};
use std::collections::HashMap;

/// Category of cadence intervals
pub const CADENCE_CATEGORY: &str = "cadence";

/// Intervals between consecutive anchor timestamps across keys
///
/// Each key contributes its last anchor timestamp. The resulting points are
/// sorted by timestamp (ties broken by key) and every adjacent pair yields one
/// interval, keyed by the later point.
///
/// # Arguments
///
/// * `events` - Event sequence of one source
/// * `anchor` - Tag of the checkpoint marking slot start, e.g. `t1`
/// * `unit` - Unit of the emitted durations
pub fn anchor_cadence(events: &[Event], anchor: &str, unit: DurationUnit) -> Vec<DerivedInterval> {
    let mut anchors: HashMap<EventKey, Timestamp> = HashMap::new();
    for event in events {
        if event.kind.tag() == anchor {
            anchors.insert(event.key, event.timestamp);
        }
    }

    let mut points: Vec<(EventKey, Timestamp)> = anchors.into_iter().collect();
    points.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    points
        .windows(2)
        .map(|pair| {
            let (_, previous) = pair[0];
            let (key, current) = pair[1];
            DerivedInterval::between(key, CADENCE_CATEGORY, None, previous, current, unit)
        })
        .collect()
}
