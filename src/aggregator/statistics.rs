//! Summary statistics over a group of values

use serde::{Deserialize, Serialize};

/// Count, mean, min, max, population standard deviation and median
///
/// All fields except `count` are absent for an empty group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SummaryStatistics {
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std_dev: Option<f64>,
    pub median: Option<f64>,
}

impl SummaryStatistics {
    /// Compute statistics for a group of values
    ///
    /// Values are sorted before any summation, so the result does not depend
    /// on input order. NaN values are ignored.
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        if count == 0 {
            return Self::default();
        }

        let n = count as f64;
        let mean = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Self {
            count,
            mean: Some(mean),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            std_dev: Some(variance.sqrt()),
            median: Some(median),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}


// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn finite(values: Vec<i32>) -> Vec<f64> {
        values.into_iter().map(|v| f64::from(v) / 8.0).collect()
    }

    // Statistics of a concatenation do not depend on how it was split or
    // ordered, so sources can be merged in any order.
    #[quickcheck]
    fn prop_statistics_ignore_order(a: Vec<i32>, b: Vec<i32>) -> bool {
        let a = finite(a);
        let b = finite(b);

        let mut ab = a.clone();
        ab.extend(&b);
        let mut ba = b;
        ba.extend(&a);

        SummaryStatistics::from_values(&ab) == SummaryStatistics::from_values(&ba)
    }

    // min <= median <= max and min <= mean <= max.
    #[quickcheck]
    fn prop_statistics_are_bounded(values: Vec<i32>) -> bool {
        let stats = SummaryStatistics::from_values(&finite(values));
        match (stats.min, stats.max, stats.mean, stats.median) {
            (Some(min), Some(max), Some(mean), Some(median)) => {
                let slack = 1e-9 * max.abs().max(min.abs()).max(1.0);
                min <= median
                    && median <= max
                    && mean >= min - slack
                    && mean <= max + slack
                    && stats.std_dev.is_some_and(|s| s >= 0.0)
            }
            (None, None, None, None) => stats.count == 0,
            _ => false,
        }
    }
}
