/// Error types for every layer of the analyzer
pub mod error;

/// Events, keys and derived intervals
pub mod events;

/// Dialect recognizers turning raw lines into events
pub mod classifier;

/// Start/stop and checkpoint-chain pairing, slot cadence and schedule map
pub mod correlator;

/// Anomaly flagging, summary statistics and UE series
pub mod aggregator;

/// Log readers, ANSI stripping and log merging
pub mod collectors;

/// JSON and CSV output
pub mod export;

/// Classify, correlate and aggregate over one or more sources
pub mod pipeline;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use error::{ClassificationError, CollectorError, ConfigError, CorrelationError, DialectError, ExportError};
pub use events::{DerivedInterval, DurationUnit, Event, EventKey, EventKind, FlaggedEvent};
pub use pipeline::{AnalysisReport, Analyzer, SourceReport};
