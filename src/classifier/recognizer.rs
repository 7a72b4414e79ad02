//! Dialect recognizers
//!
//! A recognizer maps one raw log line to an [`Event`] or declines it. The
//! standard implementation, [`PatternRecognizer`], is driven entirely by a
//! [`DialectSpec`] descriptor: a regular expression with named capture groups,
//! a kind template and a payload field map.

use crate::error::{ClassificationError, DialectError};
use crate::events::{Event, EventKey, EventKind, Payload, TimingStatus};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Capture group holding the timestamp in seconds
pub const TIMESTAMP_GROUP: &str = "ts";
/// Capture group holding the frame number
pub const FRAME_GROUP: &str = "frame";
/// Capture group holding the slot number within the frame
pub const SLOT_GROUP: &str = "slot";
/// Capture group holding a combined `<frame>.<slot>` number
pub const SLOTNUM_GROUP: &str = "slotnum";
/// Capture group holding a PNF arrival verdict
pub const STATUS_GROUP: &str = "status";

/// Largest integer a payload value holds exactly; larger hex fields are malformed
pub const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// Trait for log dialect recognizers consulted by the classifier
pub trait Recognizer: Send + Sync {
    /// Human-readable dialect name
    fn name(&self) -> &str;

    /// Try to recognize a line
    ///
    /// `None` means the line does not belong to this dialect. `Some(Err(_))`
    /// means it does, but a captured value could not be converted.
    fn recognize(&self, line: &str) -> Option<Result<Event, ClassificationError>>;
}

/// How a captured payload field is parsed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Radix {
    #[default]
    Decimal,
    Hex,
}

/// Mapping from a capture group to a named payload field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    /// Payload field name
    pub name: String,
    /// Capture group to read; defaults to the field name
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub radix: Radix,
}

impl FieldSpec {
    /// Decimal field read from the group of the same name
    pub fn decimal(name: &str) -> Self {
        Self {
            name: name.to_string(),
            group: None,
            radix: Radix::Decimal,
        }
    }

    /// Hexadecimal field read from the given group
    pub fn hex(name: &str, group: &str) -> Self {
        Self {
            name: name.to_string(),
            group: Some(group.to_string()),
            radix: Radix::Hex,
        }
    }

    fn group_name(&self) -> &str {
        self.group.as_deref().unwrap_or(&self.name)
    }
}

/// Where a registered dialect sits relative to the built-in ones
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DialectPriority {
    /// Consulted before every built-in dialect
    First,
    /// Consulted after every built-in dialect
    #[default]
    Last,
}

/// Declarative description of one log line dialect
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialectSpec {
    pub name: String,
    /// Regular expression with at least a `ts` named group
    pub pattern: String,
    /// Kind tag, with `{group}` placeholders filled from captures
    pub kind: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub priority: DialectPriority,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TemplatePart {
    Literal(String),
    Group(String),
}

fn parse_template(template: &str) -> Vec<TemplatePart> {
    let mut parts = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        match rest[open..].find('}') {
            Some(close) => {
                if open > 0 {
                    parts.push(TemplatePart::Literal(rest[..open].to_string()));
                }
                parts.push(TemplatePart::Group(rest[open + 1..open + close].to_string()));
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    if !rest.is_empty() {
        parts.push(TemplatePart::Literal(rest.to_string()));
    }
    parts
}

/// Recognizer built from a [`DialectSpec`]
#[derive(Debug, Clone)]
pub struct PatternRecognizer {
    name: String,
    pattern: Regex,
    kind_template: Vec<TemplatePart>,
    fields: Vec<FieldSpec>,
}

impl PatternRecognizer {
    /// Compile a dialect descriptor
    ///
    /// # Errors
    ///
    /// Returns `DialectError::InvalidPattern` if the regex does not compile and
    /// `DialectError::UnknownGroup` if the timestamp group, a kind placeholder or
    /// a field refers to a group the pattern does not define.
    pub fn from_spec(spec: &DialectSpec) -> Result<Self, DialectError> {
        let pattern = Regex::new(&spec.pattern).map_err(|source| DialectError::InvalidPattern {
            dialect: spec.name.clone(),
            source,
        })?;

        let has_group = |group: &str| pattern.capture_names().flatten().any(|n| n == group);
        let unknown = |group: &str| DialectError::UnknownGroup {
            dialect: spec.name.clone(),
            group: group.to_string(),
        };

        if !has_group(TIMESTAMP_GROUP) {
            return Err(unknown(TIMESTAMP_GROUP));
        }

        let kind_template = parse_template(&spec.kind);
        for part in &kind_template {
            if let TemplatePart::Group(group) = part {
                if !has_group(group) {
                    return Err(unknown(group));
                }
            }
        }

        for field in &spec.fields {
            if !has_group(field.group_name()) {
                return Err(unknown(field.group_name()));
            }
        }

        Ok(Self {
            name: spec.name.clone(),
            pattern,
            kind_template,
            fields: spec.fields.clone(),
        })
    }

    fn build(&self, caps: &Captures<'_>, line: &str) -> Result<Event, ClassificationError> {
        let timestamp = caps
            .name(TIMESTAMP_GROUP)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|ts| ts.is_finite())
            .ok_or_else(|| ClassificationError::MalformedTimestamp {
                line: line.to_string(),
            })?;

        let key = Self::extract_key(caps, line)?;
        let kind = self.extract_kind(caps, line)?;

        let mut payload = Payload::new();
        for field in &self.fields {
            // Groups that did not participate leave the field absent
            let Some(text) = caps.name(field.group_name()) else {
                continue;
            };
            let value = match field.radix {
                Radix::Decimal => text.as_str().parse::<f64>().ok(),
                Radix::Hex => u64::from_str_radix(text.as_str(), 16)
                    .ok()
                    .filter(|v| *v <= MAX_EXACT_INTEGER)
                    .map(|v| v as f64),
            }
            .filter(|v| v.is_finite())
            .ok_or_else(|| ClassificationError::MalformedField {
                field: field.name.clone(),
                line: line.to_string(),
            })?;
            payload.insert(field.name.clone(), value);
        }

        Ok(Event {
            key,
            kind,
            timestamp,
            payload,
        })
    }

    fn extract_key(caps: &Captures<'_>, line: &str) -> Result<EventKey, ClassificationError> {
        let malformed = || ClassificationError::MalformedKey {
            line: line.to_string(),
        };

        match (caps.name(FRAME_GROUP), caps.name(SLOT_GROUP)) {
            (Some(frame), Some(slot)) => {
                let frame = frame.as_str().parse().map_err(|_| malformed())?;
                let slot = slot.as_str().parse().map_err(|_| malformed())?;
                Ok(EventKey::FrameSlot { frame, slot })
            }
            _ => match caps.name(SLOTNUM_GROUP) {
                Some(slotnum) => EventKey::from_slotnum(slotnum.as_str()).ok_or_else(malformed),
                None => Ok(EventKey::Global),
            },
        }
    }

    fn extract_kind(&self, caps: &Captures<'_>, line: &str) -> Result<EventKind, ClassificationError> {
        let mut tag = String::new();
        for part in &self.kind_template {
            match part {
                TemplatePart::Literal(text) => tag.push_str(text),
                TemplatePart::Group(group) => {
                    tag.push_str(caps.name(group).map(|m| m.as_str()).unwrap_or_default())
                }
            }
        }

        let malformed = || ClassificationError::MalformedStatus {
            line: line.to_string(),
        };
        let status = match caps.name(STATUS_GROUP) {
            Some(m) => Some(m.as_str().parse::<TimingStatus>().map_err(|_| malformed())?),
            None => None,
        };

        EventKind::from_tag(&tag, status).ok_or_else(malformed)
    }
}

impl Recognizer for PatternRecognizer {
    fn name(&self) -> &str {
        &self.name
    }

    fn recognize(&self, line: &str) -> Option<Result<Event, ClassificationError>> {
        let caps = self.pattern.captures(line)?;
        Some(self.build(&caps, line))
    }
}
