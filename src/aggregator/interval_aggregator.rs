//! Interval aggregator
//!
//! Applies an [`AnomalyPolicy`] to derived intervals and event records and
//! groups what remains into [`SummaryStatistics`].

use crate::aggregator::anomaly::{AnomalyConfig, AnomalyPolicy};
use crate::aggregator::statistics::SummaryStatistics;
use crate::events::{DerivedInterval, Event, EventKind, FlaggedEvent, TimingStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field holding the arrival delta of PNF timing reports
pub const DELTA_FIELD: &str = "delta_us";

/// Flagged intervals with their per-group statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IntervalReport {
    pub intervals: Vec<DerivedInterval>,
    /// Keyed by [`DerivedInterval::group_label`]
    pub statistics: BTreeMap<String, SummaryStatistics>,
    pub anomalies: usize,
}

/// Arrival deltas of one PNF message type split by verdict
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimingBreakdown {
    pub too_late: SummaryStatistics,
    pub too_early: SummaryStatistics,
}

/// Aggregator turning intervals and records into flagged output and statistics
pub struct IntervalAggregator {
    policy: AnomalyPolicy,
    exclude_from_statistics: bool,
}

impl Default for IntervalAggregator {
    fn default() -> Self {
        Self::from_config(&AnomalyConfig::default())
    }
}

impl IntervalAggregator {
    /// Create an aggregator
    ///
    /// # Arguments
    ///
    /// * `policy` - Rules deciding what is anomalous
    /// * `exclude_from_statistics` - Leave anomalous values out of statistics
    pub fn new(policy: AnomalyPolicy, exclude_from_statistics: bool) -> Self {
        Self {
            policy,
            exclude_from_statistics,
        }
    }

    pub fn from_config(config: &AnomalyConfig) -> Self {
        Self::new(
            AnomalyPolicy::from_config(config),
            config.exclude_from_statistics,
        )
    }

    pub fn policy(&self) -> &AnomalyPolicy {
        &self.policy
    }

    /// Set the anomaly flag of every interval
    ///
    /// Timestamps and durations are left untouched.
    pub fn flag(&self, intervals: Vec<DerivedInterval>) -> Vec<DerivedInterval> {
        intervals
            .into_iter()
            .map(|interval| {
                let anomalous = self.policy.interval_is_anomalous(&interval);
                interval.with_anomalous(anomalous)
            })
            .collect()
    }

    /// Statistics of interval durations grouped by label
    ///
    /// Uses the intervals' existing flags; call [`Self::flag`] first.
    pub fn summarize(&self, intervals: &[DerivedInterval]) -> BTreeMap<String, SummaryStatistics> {
        let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for interval in intervals {
            let values = groups.entry(interval.group_label()).or_default();
            if !(self.exclude_from_statistics && interval.anomalous) {
                values.push(interval.duration);
            }
        }

        groups
            .into_iter()
            .map(|(label, values)| (label, SummaryStatistics::from_values(&values)))
            .collect()
    }

    /// Flag then summarize
    pub fn analyze(&self, intervals: Vec<DerivedInterval>) -> IntervalReport {
        let intervals = self.flag(intervals);
        let statistics = self.summarize(&intervals);
        let anomalies = intervals.iter().filter(|i| i.anomalous).count();

        IntervalReport {
            intervals,
            statistics,
            anomalies,
        }
    }

    /// Attach the anomaly verdict to each event record
    pub fn flag_events(&self, events: &[Event]) -> Vec<FlaggedEvent> {
        events
            .iter()
            .map(|event| FlaggedEvent {
                event: event.clone(),
                anomalous: self.policy.event_is_anomalous(event),
            })
            .collect()
    }

    /// Statistics per payload field over records of one kind
    ///
    /// A field seen only on excluded records still gets an (empty) entry.
    ///
    /// # Arguments
    ///
    /// * `events` - Event records of one source
    /// * `tag` - Kind tag selecting the records, e.g. `jitter-delay`
    pub fn field_statistics(&self, events: &[Event], tag: &str) -> BTreeMap<String, SummaryStatistics> {
        let mut fields: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for event in events.iter().filter(|e| e.kind.tag() == tag) {
            let excluded = self.exclude_from_statistics && self.policy.event_is_anomalous(event);
            for (name, value) in &event.payload {
                let values = fields.entry(name.clone()).or_default();
                if !excluded {
                    values.push(*value);
                }
            }
        }

        fields
            .into_iter()
            .map(|(name, values)| (name, SummaryStatistics::from_values(&values)))
            .collect()
    }

    /// Late and early arrival deltas of PNF timing reports per message type
    pub fn timing_breakdown(&self, events: &[Event]) -> BTreeMap<String, TimingBreakdown> {
        let mut deltas: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();

        for event in events {
            let EventKind::PnfTiming { variant, status } = &event.kind else {
                continue;
            };
            if self.exclude_from_statistics && self.policy.event_is_anomalous(event) {
                continue;
            }
            let Some(delta) = event.field(DELTA_FIELD) else {
                continue;
            };

            let (late, early) = deltas.entry(variant.clone()).or_default();
            match status {
                TimingStatus::TooLate => late.push(delta),
                TimingStatus::TooEarly => early.push(delta),
            }
        }

        deltas
            .into_iter()
            .map(|(variant, (late, early))| {
                let breakdown = TimingBreakdown {
                    too_late: SummaryStatistics::from_values(&late),
                    too_early: SummaryStatistics::from_values(&early),
                };
                (variant, breakdown)
            })
            .collect()
    }
}


// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::events::{DurationUnit, EventKey};
    use quickcheck_macros::quickcheck;

    fn intervals_from(durations: &[i16]) -> Vec<DerivedInterval> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let mut interval = DerivedInterval::between(
                    EventKey::frame_slot(i as u32, 0),
                    if i % 2 == 0 { "ultti" } else { "dltti" },
                    None,
                    0.0,
                    0.0,
                    DurationUnit::Microseconds,
                );
                interval.duration = f64::from(*d);
                interval
            })
            .collect()
    }

    // Aggregating two sources separately and merging the groups' values gives
    // the same statistics as aggregating their concatenation.
    #[quickcheck]
    fn prop_summary_is_order_independent(a: Vec<i16>, b: Vec<i16>) -> bool {
        let aggregator = IntervalAggregator::default();
        let mut ab = intervals_from(&a);
        ab.extend(intervals_from(&b));
        let mut ba = intervals_from(&b);
        ba.extend(intervals_from(&a));

        aggregator.analyze(ab).statistics == aggregator.analyze(ba).statistics
    }

    // Every statistic excludes exactly the flagged intervals.
    #[quickcheck]
    fn prop_counts_match_flags(durations: Vec<i16>) -> bool {
        let aggregator = IntervalAggregator::default();
        let report = aggregator.analyze(intervals_from(&durations));
        let counted: usize = report.statistics.values().map(|s| s.count).sum();
        counted + report.anomalies == durations.len()
    }
}
