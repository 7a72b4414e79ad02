//! Per-UE allocation size series
//!
//! Groups `ue-size` records by UE identifier and summarises each UE's sizes
//! over time, with a trailing moving average for trend display.

use crate::aggregator::statistics::SummaryStatistics;
use crate::classifier::recognizer::MAX_EXACT_INTEGER;
use crate::events::{Event, EventKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const RNTI_FIELD: &str = "rnti";
pub const SIZE_FIELD: &str = "size";

fn default_moving_average_window() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeriesConfig {
    #[serde(default = "default_moving_average_window")]
    pub moving_average_window: usize,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            moving_average_window: default_moving_average_window(),
        }
    }
}

/// Size samples of one UE in input order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UeSeries {
    pub rnti: u64,
    /// `(timestamp, size)` pairs
    pub samples: Vec<(Timestamp, f64)>,
    pub statistics: SummaryStatistics,
    /// Trailing moving average of the sizes
    pub smoothed: Vec<f64>,
}

impl UeSeries {
    /// Hex label as printed by the harness
    pub fn label(&self) -> String {
        format!("{:x}", self.rnti)
    }

    /// Time between first and last sample in seconds
    pub fn span(&self) -> f64 {
        let mut stamps = self.samples.iter().map(|(t, _)| *t);
        let Some(first) = stamps.next() else {
            return 0.0;
        };
        let (min, max) = stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        max - min
    }
}

/// Trailing moving average keeping only full windows
///
/// Yields `values.len() - window + 1` points. Fewer than `window` values, or
/// a window of zero or one, returns the input unchanged.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || values.len() < window {
        return values.to_vec();
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

/// UE identifier of a record, if it is a whole number held exactly
fn rnti_of(event: &Event) -> Option<u64> {
    let value = event.field(RNTI_FIELD)?;
    if value < 0.0 || value.fract() != 0.0 || value > MAX_EXACT_INTEGER as f64 {
        return None;
    }
    Some(value as u64)
}

/// Build a series per UE from `ue-size` records
///
/// Records missing either field, or whose identifier is not a whole
/// number, are skipped.
pub fn ue_series(events: &[Event], window: usize) -> BTreeMap<u64, UeSeries> {
    let mut samples: BTreeMap<u64, Vec<(Timestamp, f64)>> = BTreeMap::new();
    for event in events.iter().filter(|e| e.kind == EventKind::UeSize) {
        let (Some(rnti), Some(size)) = (rnti_of(event), event.field(SIZE_FIELD)) else {
            continue;
        };
        samples
            .entry(rnti)
            .or_default()
            .push((event.timestamp, size));
    }

    samples
        .into_iter()
        .map(|(rnti, samples)| {
            let sizes: Vec<f64> = samples.iter().map(|(_, s)| *s).collect();
            let series = UeSeries {
                rnti,
                statistics: SummaryStatistics::from_values(&sizes),
                smoothed: moving_average(&sizes, window),
                samples,
            };
            (rnti, series)
        })
        .collect()
}

/// UE with the most samples; ties go to the lowest identifier
pub fn busiest_ue(series: &BTreeMap<u64, UeSeries>) -> Option<&UeSeries> {
    series
        .values()
        .fold(None, |best: Option<&UeSeries>, candidate| match best {
            Some(best) if best.samples.len() >= candidate.samples.len() => Some(best),
            _ => Some(candidate),
        })
}
