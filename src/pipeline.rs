//! Analysis pipeline
//!
//! Wires classifier, correlator and aggregator together: each source is
//! classified, correlated and aggregated on its own, and sources are
//! processed in parallel. Results are returned in the order the sources were
//! given, so output does not depend on scheduling.

use crate::aggregator::{
    ue_series, AnomalyPolicy, DurationCeilingRule, IntervalAggregator, IntervalReport, SentinelRule,
    SummaryStatistics, TimingBreakdown, UeSeries,
};
use crate::classifier::{ClassificationStats, Classifier};
use crate::collectors::{CollectedEvents, LogCollector};
use crate::config::Config;
use crate::correlator::{anchor_cadence, Correlator, ScheduleMap};
use crate::error::{CollectorError, ConfigError};
use crate::events::{Event, FlaggedEvent};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Everything derived from one log source
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourceReport {
    pub label: String,
    pub stats: ClassificationStats,
    pub intervals: IntervalReport,
    /// Events carrying payload fields, with their anomaly verdicts
    pub records: Vec<FlaggedEvent>,
    /// Per kind tag, statistics of each payload field
    pub record_statistics: BTreeMap<String, BTreeMap<String, SummaryStatistics>>,
    /// PNF arrival deltas per message type
    pub timing: BTreeMap<String, TimingBreakdown>,
}

impl SourceReport {
    pub fn anomalous_records(&self) -> usize {
        self.records.iter().filter(|r| r.anomalous).count()
    }
}

/// Reports of several sources plus statistics over all of them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    /// Interval statistics over the union of all sources
    pub combined: BTreeMap<String, SummaryStatistics>,
}

/// Configured classify, correlate and aggregate pipeline
pub struct Analyzer {
    config: Config,
    classifier: Classifier,
    correlator: Correlator,
    aggregator: IntervalAggregator,
    cadence_aggregator: IntervalAggregator,
}

/// Aggregator for slot cadence: sentinel always, ceiling only if configured
fn cadence_aggregator(config: &Config) -> IntervalAggregator {
    let mut policy = AnomalyPolicy::new();
    if let Some(ceiling) = config.cadence.duration_ceiling {
        policy.add_rule(Box::new(DurationCeilingRule::new(ceiling)));
    }
    policy.add_rule(Box::new(SentinelRule::new(config.anomaly.sentinel)));
    IntervalAggregator::new(policy, config.anomaly.exclude_from_statistics)
}

impl Analyzer {
    /// Build the pipeline from configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if a dialect fails to compile or
    /// the pairing specification is unusable.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let classifier = Classifier::with_dialects(&config.dialects)?;
        let correlator = Correlator::new(config.pairing.clone(), config.units.interval)?;
        let aggregator = IntervalAggregator::from_config(&config.anomaly);
        let cadence_aggregator = cadence_aggregator(&config);

        info!(
            "Analyzer ready with {} dialects",
            classifier.recognizer_count()
        );

        Ok(Self {
            config,
            classifier,
            correlator,
            aggregator,
            cadence_aggregator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn aggregator(&self) -> &IntervalAggregator {
        &self.aggregator
    }

    /// Read and classify one log file
    pub fn collect(&self, path: &Path) -> Result<CollectedEvents, CollectorError> {
        LogCollector::new(&self.classifier)?.collect_file(path)
    }

    /// Correlate and aggregate an already classified source
    pub fn analyze_events(&self, collected: &CollectedEvents) -> SourceReport {
        let events = &collected.events;
        let intervals = self.aggregator.analyze(self.correlator.correlate(events));

        let records: Vec<Event> = events
            .iter()
            .filter(|e| !e.payload.is_empty())
            .cloned()
            .collect();
        let tags: BTreeSet<String> = records.iter().map(|e| e.kind.tag()).collect();
        let record_statistics = tags
            .into_iter()
            .map(|tag| {
                let stats = self.aggregator.field_statistics(&records, &tag);
                (tag, stats)
            })
            .collect();

        let report = SourceReport {
            label: collected.label.clone(),
            stats: collected.stats,
            timing: self.aggregator.timing_breakdown(&records),
            records: self.aggregator.flag_events(&records),
            record_statistics,
            intervals,
        };

        info!(
            "Source '{}': {} events, {} intervals ({} anomalous), {} records ({} anomalous)",
            report.label,
            events.len(),
            report.intervals.intervals.len(),
            report.intervals.anomalies,
            report.records.len(),
            report.anomalous_records()
        );
        report
    }

    /// Collect and analyze one log file
    pub fn analyze_file(&self, path: &Path) -> Result<SourceReport, CollectorError> {
        let collected = self.collect(path)?;
        Ok(self.analyze_events(&collected))
    }

    /// Analyze several log files in parallel
    ///
    /// # Errors
    ///
    /// Returns the first `CollectorError` in input order.
    pub fn analyze_files(&self, paths: &[PathBuf]) -> Result<AnalysisReport, CollectorError> {
        let sources = self.map_sources(paths, |path| self.analyze_file(path))?;
        Ok(self.combine(sources))
    }

    /// Merge per-source reports into one
    ///
    /// Combined statistics depend only on the multiset of intervals, not on
    /// the order of sources.
    pub fn combine(&self, sources: Vec<SourceReport>) -> AnalysisReport {
        let all: Vec<_> = sources
            .iter()
            .flat_map(|s| s.intervals.intervals.iter().cloned())
            .collect();
        let combined = self.aggregator.summarize(&all);

        AnalysisReport {
            generated_at: Utc::now(),
            sources,
            combined,
        }
    }

    /// Collect several log files in parallel, keeping input order
    pub fn collect_files(&self, paths: &[PathBuf]) -> Result<Vec<CollectedEvents>, CollectorError> {
        self.map_sources(paths, |path| self.collect(path))
    }

    fn map_sources<T, F>(&self, paths: &[PathBuf], work: F) -> Result<Vec<T>, CollectorError>
    where
        T: Send,
        F: Fn(&Path) -> Result<T, CollectorError> + Sync,
    {
        let work = &work;
        std::thread::scope(|scope| {
            let handles: Vec<_> = paths
                .iter()
                .map(|path| (path, scope.spawn(move || work(path))))
                .collect();

            handles
                .into_iter()
                .map(|(path, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(CollectorError::WorkerPanicked(path.display().to_string())))
                })
                .collect()
        })
    }

    /// Slot cadence of one source, flagged and summarised
    ///
    /// Uses its own anomaly policy, see [`crate::config::CadenceConfig`].
    pub fn cadence(&self, events: &[Event]) -> IntervalReport {
        let intervals = anchor_cadence(events, &self.config.cadence.anchor, self.config.units.cadence);
        if intervals.is_empty() {
            warn!(
                "Fewer than two '{}' anchors, no cadence derived",
                self.config.cadence.anchor
            );
        }
        self.cadence_aggregator.analyze(intervals)
    }

    /// Uplink/downlink scheduling map of one source
    pub fn schedule(&self, events: &[Event]) -> ScheduleMap {
        ScheduleMap::from_events(events, &self.config.schedule)
    }

    /// Allocation size series per UE of one source
    pub fn ue_series(&self, events: &[Event]) -> BTreeMap<u64, UeSeries> {
        ue_series(events, self.config.series.moving_average_window)
    }
}
