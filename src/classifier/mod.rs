//! Event classifier
//!
//! The classifier holds an ordered list of dialect recognizers and maps each
//! raw line to at most one [`Event`]. Recognizers are consulted in priority
//! order and the first one that claims a line wins; dialects are expected to
//! be mutually exclusive, which is not checked at runtime. Lines no dialect
//! claims are dropped silently.

/// Built-in dialect descriptors
pub mod dialects;
/// Recognizer trait and the descriptor-driven implementation
pub mod recognizer;

pub use dialects::JitterDelayRecognizer;
pub use recognizer::{DialectPriority, DialectSpec, FieldSpec, PatternRecognizer, Radix, Recognizer};

use crate::error::{ClassificationError, DialectError};
use crate::events::Event;
use log::debug;
use serde::{Deserialize, Serialize};

/// Dispatcher over an ordered set of dialect recognizers
pub struct Classifier {
    recognizers: Vec<Box<dyn Recognizer>>,
}

/// Line counters gathered while classifying a batch
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationStats {
    /// Non-blank lines inspected
    pub lines: usize,
    /// Lines turned into events
    pub matched: usize,
    /// Lines no dialect claimed
    pub unmatched: usize,
    /// Lines a dialect claimed but could not convert
    pub malformed: usize,
}

/// Result of classifying a sequence of lines
#[derive(Debug, Clone, Default)]
pub struct ClassifiedBatch {
    /// Events in input order
    pub events: Vec<Event>,
    pub stats: ClassificationStats,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Create a classifier with no recognizers
    pub fn new() -> Self {
        Self {
            recognizers: Vec::new(),
        }
    }

    /// Create a classifier with every built-in dialect registered
    ///
    /// # Errors
    ///
    /// Returns `DialectError` if a built-in descriptor fails to compile.
    pub fn with_builtin_dialects() -> Result<Self, DialectError> {
        Self::with_dialects(&[])
    }

    /// Create a classifier with the built-in dialects plus extra descriptors
    ///
    /// Extras marked [`DialectPriority::First`] are consulted before the
    /// built-ins, the rest after them; each group keeps its given order.
    pub fn with_dialects(extra: &[DialectSpec]) -> Result<Self, DialectError> {
        let mut classifier = Self::new();

        for spec in extra.iter().filter(|s| s.priority == DialectPriority::First) {
            classifier.add_recognizer(Box::new(PatternRecognizer::from_spec(spec)?));
        }
        for recognizer in dialects::builtin()? {
            classifier.add_recognizer(recognizer);
        }
        for spec in extra.iter().filter(|s| s.priority == DialectPriority::Last) {
            classifier.add_recognizer(Box::new(PatternRecognizer::from_spec(spec)?));
        }

        Ok(classifier)
    }

    /// Append a recognizer at the lowest priority
    pub fn add_recognizer(&mut self, recognizer: Box<dyn Recognizer>) {
        self.recognizers.push(recognizer);
    }

    /// Classify a single line
    ///
    /// Returns `Ok(None)` if no dialect claims the line. If the claiming
    /// dialect cannot convert a captured value the error is returned and no
    /// lower-priority dialect is tried.
    pub fn classify(&self, line: &str) -> Result<Option<Event>, ClassificationError> {
        for recognizer in &self.recognizers {
            if let Some(result) = recognizer.recognize(line) {
                return result.map(Some);
            }
        }
        Ok(None)
    }

    /// Classify a sequence of lines, skipping blank, unmatched and malformed ones
    pub fn classify_lines<I, S>(&self, lines: I) -> ClassifiedBatch
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut batch = ClassifiedBatch::default();

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            batch.stats.lines += 1;

            match self.classify(line) {
                Ok(Some(event)) => {
                    batch.stats.matched += 1;
                    batch.events.push(event);
                }
                Ok(None) => batch.stats.unmatched += 1,
                Err(e) => {
                    debug!("Skipping malformed line: {}", e);
                    batch.stats.malformed += 1;
                }
            }
        }

        batch
    }

    /// Number of registered recognizers
    pub fn recognizer_count(&self) -> usize {
        self.recognizers.len()
    }

    /// Names of the registered recognizers in priority order
    pub fn dialect_names(&self) -> Vec<&str> {
        self.recognizers.iter().map(|r| r.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventKey, EventKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Mock recognizer for testing dispatch order
    struct MockRecognizer {
        name: String,
        claims: Option<&'static str>,
        fails: bool,
        calls: Arc<AtomicUsize>,
    }

    impl MockRecognizer {
        fn new(name: &str, claims: Option<&'static str>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let recognizer = Self {
                name: name.to_string(),
                claims,
                fails: false,
                calls: Arc::clone(&calls),
            };
            (recognizer, calls)
        }
    }

    impl Recognizer for MockRecognizer {
        fn name(&self) -> &str {
            &self.name
        }

        fn recognize(&self, line: &str) -> Option<Result<Event, ClassificationError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.claims.is_some_and(|needle| line.contains(needle)) {
                return None;
            }
            if self.fails {
                return Some(Err(ClassificationError::MalformedField {
                    field: "x".to_string(),
                    line: line.to_string(),
                }));
            }
            Some(Ok(Event::new(
                EventKey::Global,
                EventKind::Other(self.name.clone()),
                1.0,
            )))
        }
    }

    #[test]
    fn test_classifier_creation() {
        let classifier = Classifier::new();
        assert_eq!(classifier.recognizer_count(), 0);
        assert_eq!(classifier.classify("anything"), Ok(None));
    }

    #[test]
    fn test_first_match_wins() {
        let (first, first_calls) = MockRecognizer::new("first", Some("shared"));
        let (second, second_calls) = MockRecognizer::new("second", Some("shared"));

        let mut classifier = Classifier::new();
        classifier.add_recognizer(Box::new(first));
        classifier.add_recognizer(Box::new(second));

        let event = classifier.classify("a shared line").unwrap().unwrap();
        assert_eq!(event.kind, EventKind::Other("first".to_string()));
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_falls_through_to_lower_priority() {
        let (first, _) = MockRecognizer::new("first", Some("alpha"));
        let (second, second_calls) = MockRecognizer::new("second", Some("beta"));

        let mut classifier = Classifier::new();
        classifier.add_recognizer(Box::new(first));
        classifier.add_recognizer(Box::new(second));

        let event = classifier.classify("beta line").unwrap().unwrap();
        assert_eq!(event.kind, EventKind::Other("second".to_string()));
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_claimed_failure_stops_dispatch() {
        let (mut first, _) = MockRecognizer::new("first", Some("bad"));
        first.fails = true;
        let (second, second_calls) = MockRecognizer::new("second", Some("bad"));

        let mut classifier = Classifier::new();
        classifier.add_recognizer(Box::new(first));
        classifier.add_recognizer(Box::new(second));

        assert!(classifier.classify("bad line").is_err());
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_classify_lines_counts_and_skips() {
        let (good, _) = MockRecognizer::new("good", Some("good"));
        let (mut bad, _) = MockRecognizer::new("bad", Some("bad"));
        bad.fails = true;

        let mut classifier = Classifier::new();
        classifier.add_recognizer(Box::new(good));
        classifier.add_recognizer(Box::new(bad));

        let batch = classifier.classify_lines(["good 1", "", "  ", "noise", "bad", "good 2"]);
        assert_eq!(batch.events.len(), 2);
        assert_eq!(
            batch.stats,
            ClassificationStats {
                lines: 4,
                matched: 2,
                unmatched: 1,
                malformed: 1,
            }
        );
    }

    #[test]
    fn test_builtin_classifier_dispatch() {
        let classifier = Classifier::with_builtin_dialects().unwrap();
        assert_eq!(classifier.recognizer_count(), 12);

        let event = classifier
            .classify("[1.000000] frame=3 slot=7 start")
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, EventKind::Start);

        let event = classifier
            .classify("[0.1] frame=3 slot=7 t4-dltti")
            .unwrap()
            .unwrap();
        assert_eq!(event.kind.tag(), "t4-dltti");

        let event = classifier
            .classify("5.0 Message TX_DATA for 10.2 arrived TOO LATE (delta: 3 µs)")
            .unwrap()
            .unwrap();
        assert_eq!(event.kind.tag(), "pnf-timing-txdata");

        assert_eq!(classifier.classify("random noise"), Ok(None));
    }

    #[test]
    fn test_extra_dialect_priority() {
        let first = DialectSpec {
            name: "override-start".to_string(),
            pattern: r"^\[(?P<ts>[\d.]+)\].*start".to_string(),
            kind: "custom-start".to_string(),
            fields: vec![],
            priority: DialectPriority::First,
        };
        let last = DialectSpec {
            name: "rlc".to_string(),
            pattern: r"^(?P<ts>[\d.]+) RLC".to_string(),
            kind: "rlc".to_string(),
            fields: vec![],
            priority: DialectPriority::Last,
        };

        let classifier = Classifier::with_dialects(&[last, first]).unwrap();
        let names = classifier.dialect_names();
        assert_eq!(names.first(), Some(&"override-start"));
        assert_eq!(names.last(), Some(&"rlc"));

        let event = classifier
            .classify("[1.0] frame=1 slot=1 start")
            .unwrap()
            .unwrap();
        assert_eq!(event.kind.tag(), "custom-start");
    }
}
