use thiserror::Error;

/// Errors raised while turning a single log line into an event
///
/// Every variant carries the offending raw line. The classifier never lets
/// one of these escape a batch: the line is skipped and counted instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassificationError {
    #[error("Malformed timestamp in line: {line}")]
    MalformedTimestamp { line: String },

    #[error("Malformed frame/slot key in line: {line}")]
    MalformedKey { line: String },

    #[error("Malformed field '{field}' in line: {line}")]
    MalformedField { field: String, line: String },

    #[error("Malformed timing status in line: {line}")]
    MalformedStatus { line: String },
}

/// Errors raised while building a dialect recognizer
#[derive(Error, Debug)]
pub enum DialectError {
    #[error("Invalid pattern for dialect '{dialect}': {source}")]
    InvalidPattern {
        dialect: String,
        #[source]
        source: regex::Error,
    },

    #[error("Dialect '{dialect}' has no capture group named '{group}'")]
    UnknownGroup { dialect: String, group: String },
}

/// Errors raised when a correlator is given an unusable pairing specification
///
/// These indicate a caller bug, not bad data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelationError {
    #[error("Pairing specification has no start/stop rules and no checkpoint chains")]
    EmptyPairingSpec,

    #[error("Invalid start/stop rule: {0}")]
    InvalidStartStopRule(String),

    #[error("Invalid checkpoint pair '{name}': {reason}")]
    InvalidCheckpointPair { name: String, reason: String },
}

/// Errors that can occur while reading log sources
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid line pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("No recognizable events in source: {0}")]
    NoEvents(String),

    #[error("Worker reading '{0}' panicked")]
    WorkerPanicked(String),
}

/// Errors that can occur while writing analysis results
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),
}

impl From<DialectError> for ConfigError {
    fn from(err: DialectError) -> Self {
        ConfigError::ValidationError(err.to_string())
    }
}

impl From<CorrelationError> for ConfigError {
    fn from(err: CorrelationError) -> Self {
        ConfigError::ValidationError(err.to_string())
    }
}
