/// Harness log reader, ANSI stripping and log merging
pub mod log_collector;

/// Labels and metadata derived from log file names
pub mod source;

pub use log_collector::{merge_logs, merge_logs_to_file, CollectedEvents, LogCollector};
pub use source::{source_label, throughput_from_file_name};
