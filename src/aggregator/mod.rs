/// Anomaly rules and the policy combining them
pub mod anomaly;

/// Flagging and grouping of derived intervals and event records
pub mod interval_aggregator;

/// Per-UE allocation size series
pub mod series;

/// Summary statistics
pub mod statistics;

pub use anomaly::{AnomalyConfig, AnomalyPolicy, AnomalyRule, DurationCeilingRule, SentinelRule};
pub use interval_aggregator::{IntervalAggregator, IntervalReport, TimingBreakdown};
pub use series::{busiest_ue, moving_average, ue_series, SeriesConfig, UeSeries};
pub use statistics::SummaryStatistics;
