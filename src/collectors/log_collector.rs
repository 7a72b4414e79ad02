use crate::classifier::{ClassificationStats, Classifier};
use crate::collectors::source::source_label;
use crate::error::CollectorError;
use crate::events::Event;
use log::{debug, info, warn};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// ANSI colour escape as emitted by the harness terminal output
const ANSI_ESCAPE: &str = r"\x1b\[[0-9;]*m";

/// Bracketed timestamp used to order merged logs
const BRACKETED_TIMESTAMP: &str = r"\[(\d+\.\d+)\]";

/// Events read from one log source
#[derive(Debug, Clone, Default)]
pub struct CollectedEvents {
    /// Short name of the source, see [`source_label`]
    pub label: String,
    /// Events in file order
    pub events: Vec<Event>,
    pub stats: ClassificationStats,
}

impl CollectedEvents {
    /// Fail if the source produced no events
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::NoEvents` naming the source.
    pub fn require_events(self) -> Result<Self, CollectorError> {
        if self.events.is_empty() {
            return Err(CollectorError::NoEvents(self.label));
        }
        Ok(self)
    }
}

/// Reader of harness log files
///
/// Lines are decoded leniently (invalid UTF-8 is replaced), stripped of ANSI
/// colour codes and handed to the classifier. Lines that yield no event are
/// skipped; the counters in [`CollectedEvents::stats`] record why.
pub struct LogCollector<'a> {
    classifier: &'a Classifier,
    ansi: Regex,
}

impl<'a> LogCollector<'a> {
    /// Create a collector classifying with the given classifier
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::PatternError` if the escape pattern fails to compile.
    pub fn new(classifier: &'a Classifier) -> Result<Self, CollectorError> {
        Ok(Self {
            classifier,
            ansi: Regex::new(ANSI_ESCAPE)?,
        })
    }

    /// Remove ANSI colour escapes from a line
    pub fn strip_ansi<'l>(&self, line: &'l str) -> std::borrow::Cow<'l, str> {
        self.ansi.replace_all(line, "")
    }

    /// Classify every line of a reader
    ///
    /// # Arguments
    ///
    /// * `label` - Name reported for this source
    /// * `reader` - Line source
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::IoError` if reading fails.
    pub fn collect_reader<R: Read>(&self, label: &str, reader: R) -> Result<CollectedEvents, CollectorError> {
        let lines = read_lossy_lines(reader)?;
        let cleaned: Vec<String> = lines
            .iter()
            .map(|line| self.strip_ansi(line).into_owned())
            .collect();

        let batch = self.classifier.classify_lines(&cleaned);
        debug!(
            "Source '{}': {} lines, {} matched, {} unmatched, {} malformed",
            label,
            batch.stats.lines,
            batch.stats.matched,
            batch.stats.unmatched,
            batch.stats.malformed
        );

        if batch.events.is_empty() {
            warn!("No recognizable events in source '{}'", label);
        }

        Ok(CollectedEvents {
            label: label.to_string(),
            events: batch.events,
            stats: batch.stats,
        })
    }

    /// Classify every line of a file, labelling it after the file name
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::IoError` if the file cannot be opened or read.
    pub fn collect_file(&self, path: &Path) -> Result<CollectedEvents, CollectorError> {
        let label = source_label(path);
        let file = File::open(path)?;
        let collected = self.collect_reader(&label, file)?;
        info!(
            "Collected {} events from {}",
            collected.events.len(),
            path.display()
        );
        Ok(collected)
    }
}

fn read_lossy_lines<R: Read>(reader: R) -> Result<Vec<String>, CollectorError> {
    let mut lines = Vec::new();
    for chunk in BufReader::new(reader).split(b'\n') {
        let chunk = chunk?;
        let line = String::from_utf8_lossy(&chunk);
        lines.push(line.trim_end_matches('\r').to_string());
    }
    Ok(lines)
}

/// Merge several logs into one timeline
///
/// Keeps lines carrying a bracketed `[seconds.micros]` timestamp, ordered by
/// it. The sort is stable: equal timestamps keep file order, earlier files
/// first. Lines are returned as read, colour codes included.
///
/// # Errors
///
/// Returns `CollectorError::IoError` if a file cannot be read.
pub fn merge_logs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<String>, CollectorError> {
    let timestamp = Regex::new(BRACKETED_TIMESTAMP)?;
    let mut stamped: Vec<(f64, String)> = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let lines = read_lossy_lines(File::open(path)?)?;
        let before = stamped.len();

        for line in lines {
            let parsed = timestamp
                .captures(&line)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok());
            match parsed {
                Some(ts) => stamped.push((ts, line)),
                None => debug!("Dropping line without timestamp: {}", line),
            }
        }

        debug!(
            "Merged {} timestamped lines from {}",
            stamped.len() - before,
            path.display()
        );
    }

    stamped.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(stamped.into_iter().map(|(_, line)| line).collect())
}

/// Merge logs and write the timeline to a file
///
/// Returns the number of lines written.
pub fn merge_logs_to_file<P: AsRef<Path>>(paths: &[P], output: &Path) -> Result<usize, CollectorError> {
    let lines = merge_logs(paths)?;
    let mut writer = BufWriter::new(File::create(output)?);
    for line in &lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;

    info!("Merged {} lines into {}", lines.len(), output.display());
    Ok(lines.len())
}
