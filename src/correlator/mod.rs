//! Event correlator
//!
//! Pairs events that share a frame/slot key into derived intervals. Two
//! modes run side by side, both driven by a [`PairingSpec`]:
//!
//! - start/stop: the latest start of a key pairs with every later stop of the
//!   same key until the next start (or only the first one, if the rule
//!   consumes its start)
//! - checkpoint chain: each key keeps the last timestamp seen per checkpoint
//!   tag and the chain's pairs are evaluated once per terminal variant present

pub mod cadence;
pub mod pairing;
pub mod schedule;

pub use cadence::{anchor_cadence, CADENCE_CATEGORY};
pub use pairing::{CheckpointChain, CheckpointPair, PairingSpec, StartStopRule};
pub use schedule::{ScheduleCell, ScheduleMap, ScheduleSpec, ScheduleSummary, SlotDirection, SlotUsage};

use crate::error::CorrelationError;
use crate::events::{DerivedInterval, DurationUnit, Event, EventKey, Timestamp};
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// Interval correlator over a fixed pairing specification
///
/// A correlator carries no state between calls to [`Correlator::correlate`],
/// so one instance can serve any number of sources.
#[derive(Debug, Clone)]
pub struct Correlator {
    spec: PairingSpec,
    unit: DurationUnit,
}

impl Correlator {
    /// Create a correlator
    ///
    /// # Arguments
    ///
    /// * `spec` - Which kinds open and close intervals
    /// * `unit` - Unit of the emitted durations
    ///
    /// # Errors
    ///
    /// Returns `CorrelationError` if the pairing is empty or incomplete.
    pub fn new(spec: PairingSpec, unit: DurationUnit) -> Result<Self, CorrelationError> {
        spec.validate()?;
        Ok(Self { spec, unit })
    }

    /// Create a correlator with the default harness pairings in microseconds
    pub fn with_defaults() -> Result<Self, CorrelationError> {
        Self::new(PairingSpec::default(), DurationUnit::default())
    }

    pub fn spec(&self) -> &PairingSpec {
        &self.spec
    }

    pub fn unit(&self) -> DurationUnit {
        self.unit
    }

    /// Derive all intervals from an ordered event sequence
    ///
    /// Start/stop intervals come first, in the order their stops appear.
    /// Checkpoint intervals follow, ordered by key, then variant, then the
    /// configured pair order.
    pub fn correlate(&self, events: &[Event]) -> Vec<DerivedInterval> {
        let mut intervals = self.pair_start_stop(events);
        intervals.extend(self.walk_chains(events));
        debug!(
            "Derived {} intervals from {} events",
            intervals.len(),
            events.len()
        );
        intervals
    }

    /// Derive intervals from a sequence delivered in contiguous parts
    ///
    /// Events are regrouped by key in part order before pairing, so a key
    /// whose start and stop fall on either side of a part boundary still
    /// pairs. Each key group is correlated on its own and the results are
    /// concatenated in key order.
    ///
    /// # Arguments
    ///
    /// * `parts` - Consecutive slices of one ordered event sequence
    pub fn correlate_parts(&self, parts: &[&[Event]]) -> Vec<DerivedInterval> {
        let mut groups: BTreeMap<EventKey, Vec<Event>> = BTreeMap::new();
        for event in parts.iter().flat_map(|part| part.iter()) {
            groups.entry(event.key).or_default().push(event.clone());
        }
        groups
            .values()
            .flat_map(|events| self.correlate(events))
            .collect()
    }

    /// Start/stop mode only
    pub fn pair_start_stop(&self, events: &[Event]) -> Vec<DerivedInterval> {
        let mut intervals = Vec::new();

        for rule in &self.spec.start_stop {
            let mut open: HashMap<EventKey, Timestamp> = HashMap::new();

            for event in events {
                let tag = event.kind.tag();
                if tag == rule.start {
                    open.insert(event.key, event.timestamp);
                    continue;
                }

                let Some(category) = rule.category_of(&tag) else {
                    continue;
                };
                let start = if rule.consume_start {
                    open.remove(&event.key)
                } else {
                    open.get(&event.key).copied()
                };

                // A stop with no preceding start is ignored
                if let Some(start) = start {
                    intervals.push(DerivedInterval::between(
                        event.key,
                        category,
                        None,
                        start,
                        event.timestamp,
                        self.unit,
                    ));
                }
            }
        }

        intervals
    }

    /// Checkpoint-chain mode only
    pub fn walk_chains(&self, events: &[Event]) -> Vec<DerivedInterval> {
        if self.spec.chains.is_empty() {
            return Vec::new();
        }

        // Last write wins per (key, tag)
        let mut table: BTreeMap<EventKey, HashMap<String, Timestamp>> = BTreeMap::new();
        for event in events {
            table
                .entry(event.key)
                .or_default()
                .insert(event.kind.tag(), event.timestamp);
        }

        let mut intervals = Vec::new();
        for chain in &self.spec.chains {
            for (key, stamps) in &table {
                self.walk_key(chain, *key, stamps, &mut intervals);
            }
        }
        intervals
    }

    fn walk_key(
        &self,
        chain: &CheckpointChain,
        key: EventKey,
        stamps: &HashMap<String, Timestamp>,
        intervals: &mut Vec<DerivedInterval>,
    ) {
        if chain.variants.is_empty() {
            self.emit_pairs(chain, key, None, stamps, intervals);
            return;
        }

        for variant in &chain.variants {
            if stamps.contains_key(&chain.terminal_tag(variant)) {
                self.emit_pairs(chain, key, Some(variant.as_str()), stamps, intervals);
            }
        }
    }

    fn emit_pairs(
        &self,
        chain: &CheckpointChain,
        key: EventKey,
        variant: Option<&str>,
        stamps: &HashMap<String, Timestamp>,
        intervals: &mut Vec<DerivedInterval>,
    ) {
        for pair in &chain.pairs {
            let Some((from, to)) = pair.resolve(variant) else {
                continue;
            };
            if let (Some(start), Some(stop)) = (stamps.get(&from), stamps.get(&to)) {
                intervals.push(DerivedInterval::between(
                    key,
                    pair.name.as_str(),
                    variant.map(str::to_string),
                    *start,
                    *stop,
                    self.unit,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use approx::assert_relative_eq;

    fn create_test_event(frame: u32, slot: u32, tag: &str, timestamp: f64) -> Event {
        Event::new(
            EventKey::frame_slot(frame, slot),
            EventKind::from_tag(tag, None).unwrap(),
            timestamp,
        )
    }

    fn start_stop_correlator(consume_start: bool) -> Correlator {
        let rule = StartStopRule {
            consume_start,
            ..StartStopRule::default()
        };
        Correlator::new(
            PairingSpec::start_stop_only(vec![rule]),
            DurationUnit::Microseconds,
        )
        .unwrap()
    }

    fn chain_correlator() -> Correlator {
        Correlator::new(
            PairingSpec::chains_only(vec![CheckpointChain::default()]),
            DurationUnit::Microseconds,
        )
        .unwrap()
    }

    fn find<'a>(intervals: &'a [DerivedInterval], label: &str) -> Option<&'a DerivedInterval> {
        intervals.iter().find(|i| i.group_label() == label)
    }

    #[test]
    fn test_empty_spec_is_rejected() {
        let spec = PairingSpec {
            start_stop: vec![],
            chains: vec![],
        };
        assert_eq!(
            Correlator::new(spec, DurationUnit::Microseconds).unwrap_err(),
            CorrelationError::EmptyPairingSpec
        );
    }

    #[test]
    fn test_start_stop_basic_pairing() {
        let correlator = start_stop_correlator(false);
        let events = vec![
            create_test_event(3, 7, "start", 1.000000),
            create_test_event(3, 7, "stop-ultti", 1.000042),
        ];

        let intervals = correlator.correlate(&events);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].category, "ultti");
        assert_eq!(intervals[0].key, EventKey::frame_slot(3, 7));
        assert_eq!(intervals[0].variant, None);
        assert_relative_eq!(intervals[0].duration, 42.0, epsilon = 1e-6);
    }

    #[test]
    fn test_start_is_retained_for_multiple_stops() {
        let correlator = start_stop_correlator(false);
        let events = vec![
            create_test_event(1, 1, "start", 1.0),
            create_test_event(1, 1, "stop-ultti", 1.00001),
            create_test_event(1, 1, "stop-dltti", 1.00003),
        ];

        let intervals = correlator.correlate(&events);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].category, "ultti");
        assert_eq!(intervals[1].category, "dltti");
        assert_relative_eq!(intervals[0].duration, 10.0, epsilon = 1e-6);
        assert_relative_eq!(intervals[1].duration, 30.0, epsilon = 1e-6);
    }

    #[test]
    fn test_consume_start_pairs_once() {
        let correlator = start_stop_correlator(true);
        let events = vec![
            create_test_event(1, 1, "start", 1.0),
            create_test_event(1, 1, "stop-ultti", 1.00001),
            create_test_event(1, 1, "stop-dltti", 1.00003),
        ];

        let intervals = correlator.correlate(&events);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].category, "ultti");
    }

    #[test]
    fn test_later_start_replaces_earlier() {
        let correlator = start_stop_correlator(false);
        let events = vec![
            create_test_event(1, 1, "start", 1.0),
            create_test_event(1, 1, "start", 2.0),
            create_test_event(1, 1, "stop-ultti", 2.000005),
        ];

        let intervals = correlator.correlate(&events);
        assert_eq!(intervals.len(), 1);
        assert_relative_eq!(intervals[0].start_timestamp, 2.0);
        assert_relative_eq!(intervals[0].duration, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_stop_without_start_is_ignored() {
        let correlator = start_stop_correlator(false);
        let events = vec![
            create_test_event(1, 1, "stop-ultti", 1.0),
            create_test_event(2, 2, "start", 1.5),
        ];
        assert!(correlator.correlate(&events).is_empty());
    }

    #[test]
    fn test_keys_do_not_mix() {
        let correlator = start_stop_correlator(false);
        let events = vec![
            create_test_event(1, 1, "start", 1.0),
            create_test_event(1, 2, "stop-ultti", 1.5),
        ];
        assert!(correlator.correlate(&events).is_empty());
    }

    #[test]
    fn test_out_of_order_stop_gives_negative_duration() {
        // Only "precedes in the sequence" matters, not timestamp order
        let correlator = start_stop_correlator(false);
        let events = vec![
            create_test_event(1, 1, "start", 2.0),
            create_test_event(1, 1, "stop-ultti", 1.99999),
        ];

        let intervals = correlator.correlate(&events);
        assert_eq!(intervals.len(), 1);
        assert_relative_eq!(intervals[0].duration, -10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_full_chain_single_variant() {
        let correlator = chain_correlator();
        let events = vec![
            create_test_event(3, 7, "t1", 0.000000),
            create_test_event(3, 7, "t2", 0.000010),
            create_test_event(3, 7, "t3", 0.000025),
            create_test_event(3, 7, "t4-ultti", 0.000060),
            create_test_event(3, 7, "t5", 0.000080),
        ];

        let intervals = correlator.correlate(&events);
        assert_eq!(intervals.len(), 5);

        let expected = [
            ("ultti/t1-t2", 10.0),
            ("ultti/t2-t3", 15.0),
            ("ultti/t3-t4", 35.0),
            ("ultti/t4-t5", 20.0),
            ("ultti/t1-t5", 80.0),
        ];
        for (interval, (label, duration)) in intervals.iter().zip(expected) {
            assert_eq!(interval.group_label(), label);
            assert_relative_eq!(interval.duration, duration, epsilon = 1e-6);
        }
        assert!(find(&intervals, "uldci/t1-t2").is_none());
    }

    #[test]
    fn test_chain_example_from_harness_timestamps() {
        let correlator = Correlator::with_defaults().unwrap();
        let events = vec![
            create_test_event(3, 7, "t1", 0.100),
            create_test_event(3, 7, "t2", 0.100010),
            create_test_event(3, 7, "t3", 0.100025),
            create_test_event(3, 7, "t4-ultti", 0.100060),
            create_test_event(3, 7, "t5", 0.100080),
        ];

        let intervals = correlator.correlate(&events);
        assert_eq!(intervals.len(), 5);

        for (label, duration) in [
            ("ultti/t1-t2", 10.0),
            ("ultti/t2-t3", 15.0),
            ("ultti/t3-t4", 35.0),
            ("ultti/t4-t5", 20.0),
            ("ultti/t1-t5", 80.0),
        ] {
            let interval = find(&intervals, label).unwrap();
            assert_relative_eq!(interval.duration, duration, epsilon = 1e-6);
        }
        assert!(intervals
            .iter()
            .all(|i| i.variant.as_deref() != Some("uldci")));
    }

    #[test]
    fn test_parts_pair_across_boundary() {
        let correlator = start_stop_correlator(false);
        let events = vec![
            create_test_event(3, 7, "start", 1.000000),
            create_test_event(3, 8, "start", 1.000100),
            create_test_event(3, 7, "stop-ultti", 1.000042),
            create_test_event(3, 8, "stop-dltti", 1.000130),
        ];
        let (first, second) = events.split_at(2);

        // Each part alone holds starts or stops, never both
        assert!(correlator.correlate(first).is_empty());
        assert!(correlator.correlate(second).is_empty());

        let intervals = correlator.correlate_parts(&[first, second]);
        assert_eq!(intervals.len(), 2);
        assert_relative_eq!(find(&intervals, "ultti").unwrap().duration, 42.0, epsilon = 1e-6);
        assert_relative_eq!(find(&intervals, "dltti").unwrap().duration, 30.0, epsilon = 1e-6);
    }

    #[test]
    fn test_chain_without_terminal_emits_nothing() {
        let correlator = chain_correlator();
        let events = vec![
            create_test_event(3, 7, "t1", 0.0),
            create_test_event(3, 7, "t2", 0.00001),
            create_test_event(3, 7, "t5", 0.00008),
        ];
        assert!(correlator.correlate(&events).is_empty());
    }

    #[test]
    fn test_chain_emits_per_variant_present() {
        let correlator = chain_correlator();
        let events = vec![
            create_test_event(1, 0, "t1", 0.0),
            create_test_event(1, 0, "t3", 0.00002),
            create_test_event(1, 0, "t4-dltti", 0.00003),
            create_test_event(1, 0, "t4-ultti", 0.00005),
        ];

        let intervals = correlator.correlate(&events);
        // Only t3-t4 is computable, once per present variant, in variant order
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].group_label(), "ultti/t3-t4");
        assert_eq!(intervals[1].group_label(), "dltti/t3-t4");
        assert_relative_eq!(intervals[0].duration, 30.0, epsilon = 1e-6);
        assert_relative_eq!(intervals[1].duration, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_chain_last_write_wins() {
        let correlator = chain_correlator();
        let events = vec![
            create_test_event(1, 0, "t3", 0.0),
            create_test_event(1, 0, "t4-ultti", 0.00001),
            create_test_event(1, 0, "t3", 0.000005),
        ];

        let intervals = correlator.correlate(&events);
        assert_eq!(intervals.len(), 1);
        assert_relative_eq!(intervals[0].duration, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_chain_ordered_by_key() {
        let correlator = chain_correlator();
        let events = vec![
            create_test_event(2, 0, "t3", 0.0),
            create_test_event(2, 0, "t4-ultti", 0.00001),
            create_test_event(1, 5, "t3", 0.0),
            create_test_event(1, 5, "t4-ultti", 0.00002),
        ];

        let intervals = correlator.correlate(&events);
        assert_eq!(intervals[0].key, EventKey::frame_slot(1, 5));
        assert_eq!(intervals[1].key, EventKey::frame_slot(2, 0));
    }

    #[test]
    fn test_modes_combined() {
        let correlator = Correlator::with_defaults().unwrap();
        let events = vec![
            create_test_event(1, 1, "start", 1.0),
            create_test_event(1, 1, "t3", 1.0),
            create_test_event(1, 1, "t4-txdata", 1.00001),
            create_test_event(1, 1, "stop-txdata", 1.00002),
        ];

        let intervals = correlator.correlate(&events);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].group_label(), "txdata");
        assert_eq!(intervals[1].group_label(), "txdata/t3-t4");
    }

    #[test]
    fn test_duration_unit() {
        let correlator = Correlator::new(
            PairingSpec::start_stop_only(vec![StartStopRule::default()]),
            DurationUnit::Milliseconds,
        )
        .unwrap();
        let events = vec![
            create_test_event(1, 1, "start", 1.0),
            create_test_event(1, 1, "stop-x", 1.5),
        ];
        assert_relative_eq!(correlator.correlate(&events)[0].duration, 500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_correlate_is_repeatable() {
        let correlator = Correlator::with_defaults().unwrap();
        let events = vec![
            create_test_event(1, 1, "start", 1.0),
            create_test_event(1, 1, "stop-ultti", 1.1),
        ];
        assert_eq!(correlator.correlate(&events), correlator.correlate(&events));
    }
}
