//! Anomaly rules
//!
//! Rules decide whether a derived interval or a raw event record is
//! anomalous. An [`AnomalyPolicy`] holds an ordered set of rules and flags
//! anything at least one rule fires on.

use crate::events::{DerivedInterval, Event};
use serde::{Deserialize, Serialize};

/// Largest 32-bit signed integer, emitted by the harness for invalid readings
pub const OVERFLOW_SENTINEL: f64 = 2_147_483_647.0;

fn default_duration_ceiling() -> f64 {
    100.0
}

fn default_sentinel() -> f64 {
    OVERFLOW_SENTINEL
}

fn default_exclude_from_statistics() -> bool {
    true
}

/// Anomaly thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyConfig {
    /// Intervals with |duration| above this are flagged
    #[serde(default = "default_duration_ceiling")]
    pub duration_ceiling: f64,
    /// Values with magnitude at or above this are instrumentation overflow
    #[serde(default = "default_sentinel")]
    pub sentinel: f64,
    /// Leave flagged intervals and records out of summary statistics
    #[serde(default = "default_exclude_from_statistics")]
    pub exclude_from_statistics: bool,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            duration_ceiling: default_duration_ceiling(),
            sentinel: default_sentinel(),
            exclude_from_statistics: default_exclude_from_statistics(),
        }
    }
}

/// Predicate over intervals and event records
pub trait AnomalyRule: Send + Sync {
    /// Get a human-readable name for this rule
    fn name(&self) -> &str;

    /// Whether a derived interval is anomalous under this rule
    fn interval_is_anomalous(&self, interval: &DerivedInterval) -> bool;

    /// Whether an event record is anomalous under this rule
    fn event_is_anomalous(&self, _event: &Event) -> bool {
        false
    }
}

/// Flags intervals whose absolute duration exceeds a ceiling
///
/// The boundary is inclusive: a duration equal to the ceiling is normal.
pub struct DurationCeilingRule {
    pub ceiling: f64,
}

impl DurationCeilingRule {
    pub fn new(ceiling: f64) -> Self {
        Self { ceiling }
    }

    /// Create a default duration rule (100 time units)
    pub fn with_defaults() -> Self {
        Self::new(default_duration_ceiling())
    }
}

impl AnomalyRule for DurationCeilingRule {
    fn name(&self) -> &str {
        "DurationCeilingRule"
    }

    fn interval_is_anomalous(&self, interval: &DerivedInterval) -> bool {
        interval.duration.abs() > self.ceiling
    }
}

/// Flags any value whose magnitude reaches the overflow sentinel
///
/// Applies to interval durations and to every payload field of a record.
pub struct SentinelRule {
    pub sentinel: f64,
}

impl SentinelRule {
    pub fn new(sentinel: f64) -> Self {
        Self { sentinel }
    }

    /// Create a default sentinel rule (2147483647)
    pub fn with_defaults() -> Self {
        Self::new(OVERFLOW_SENTINEL)
    }

    fn hits(&self, value: f64) -> bool {
        value.abs() >= self.sentinel
    }
}

impl AnomalyRule for SentinelRule {
    fn name(&self) -> &str {
        "SentinelRule"
    }

    fn interval_is_anomalous(&self, interval: &DerivedInterval) -> bool {
        self.hits(interval.duration)
    }

    fn event_is_anomalous(&self, event: &Event) -> bool {
        event.payload.values().any(|v| self.hits(*v))
    }
}

/// Ordered set of anomaly rules
pub struct AnomalyPolicy {
    rules: Vec<Box<dyn AnomalyRule>>,
}

impl Default for AnomalyPolicy {
    fn default() -> Self {
        Self::from_config(&AnomalyConfig::default())
    }
}

impl AnomalyPolicy {
    /// Create a policy with no rules; nothing is ever flagged
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Duration ceiling and sentinel rules from configuration
    pub fn from_config(config: &AnomalyConfig) -> Self {
        let mut policy = Self::new();
        policy.add_rule(Box::new(DurationCeilingRule::new(config.duration_ceiling)));
        policy.add_rule(Box::new(SentinelRule::new(config.sentinel)));
        policy
    }

    /// Add a rule to the policy
    pub fn add_rule(&mut self, rule: Box<dyn AnomalyRule>) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Name of the first rule that fires on the interval, if any
    pub fn interval_verdict(&self, interval: &DerivedInterval) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.interval_is_anomalous(interval))
            .map(|rule| rule.name())
    }

    pub fn interval_is_anomalous(&self, interval: &DerivedInterval) -> bool {
        self.interval_verdict(interval).is_some()
    }

    pub fn event_is_anomalous(&self, event: &Event) -> bool {
        self.rules.iter().any(|rule| rule.event_is_anomalous(event))
    }
}
