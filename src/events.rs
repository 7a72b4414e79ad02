//! Core event types for the RAN timing log analyzer
//!
//! This module defines the canonical representation of a parsed log occurrence
//! ([`Event`]), the identifiers used to group occurrences ([`EventKey`],
//! [`EventKind`]) and the interval records derived from matched events.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Timestamp in seconds as printed by the test harness
pub type Timestamp = f64;

/// Numeric payload fields of an event, keyed by field name
///
/// Fields not defined for an event's kind are absent, never zero.
pub type Payload = BTreeMap<String, f64>;

/// Identifier grouping events that belong to one logical occurrence
///
/// Ordered by variant first (`Global` sorts before any frame/slot), then by
/// frame and slot number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum EventKey {
    /// Source-level report that carries no slot identity
    Global,
    /// A radio frame and a slot within it
    FrameSlot { frame: u32, slot: u32 },
}

impl EventKey {
    /// Build a frame/slot key
    pub fn frame_slot(frame: u32, slot: u32) -> Self {
        EventKey::FrameSlot { frame, slot }
    }

    /// Parse a `<frame>.<slot>` slot number as printed by nFAPI timing reports
    ///
    /// A bare frame number is accepted and maps to slot 0.
    pub fn from_slotnum(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let frame = parts.next()?.parse().ok()?;
        let slot = match parts.next() {
            Some(slot) => slot.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(EventKey::FrameSlot { frame, slot })
    }

    /// Frame number, if this key has one
    pub fn frame(&self) -> Option<u32> {
        match self {
            EventKey::FrameSlot { frame, .. } => Some(*frame),
            EventKey::Global => None,
        }
    }

    /// Slot number, if this key has one
    pub fn slot(&self) -> Option<u32> {
        match self {
            EventKey::FrameSlot { slot, .. } => Some(*slot),
            EventKey::Global => None,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Global => write!(f, "global"),
            EventKey::FrameSlot { frame, slot } => write!(f, "F{}_S{}", frame, slot),
        }
    }
}

/// Arrival verdict attached to PNF timing reports
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TimingStatus {
    /// The message reached the PNF after its slot deadline
    TooLate,
    /// The message reached the PNF before its slot window opened
    TooEarly,
}

impl FromStr for TimingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "TOO LATE" => Ok(TimingStatus::TooLate),
            "TOO EARLY" => Ok(TimingStatus::TooEarly),
            other => Err(format!("unknown timing status: {}", other)),
        }
    }
}

impl fmt::Display for TimingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimingStatus::TooLate => write!(f, "TOO LATE"),
            TimingStatus::TooEarly => write!(f, "TOO EARLY"),
        }
    }
}

/// Tag naming which checkpoint or report an event represents
///
/// Every kind has a canonical textual tag (see the `Display` impl), which is
/// what pairing rules and configuration refer to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// `start` marker
    Start,
    /// `stop-<suffix>` marker
    Stop(String),
    /// Numbered checkpoint `t<N>`, optionally `t<N>-<variant>`
    Checkpoint { index: u8, variant: Option<String> },
    /// VNF combined jitter and delay report
    JitterDelay,
    /// VNF high delay warning for one message type
    HighDelay(String),
    /// VNF slot synchronisation adjustment
    Sync,
    /// PNF arrival timing report for one message type
    PnfTiming {
        variant: String,
        status: TimingStatus,
    },
    /// Per-UE transport block size report
    UeSize,
    /// Any tag without dedicated handling
    Other(String),
}

impl EventKind {
    /// Parse a canonical tag into a kind
    ///
    /// PNF timing tags need the accompanying arrival status; `None` is
    /// returned if a `pnf-timing-*` tag is given without one.
    pub fn from_tag(tag: &str, status: Option<TimingStatus>) -> Option<Self> {
        let kind = match tag {
            "start" => EventKind::Start,
            "jitter-delay" => EventKind::JitterDelay,
            "sync" => EventKind::Sync,
            "ue-size" => EventKind::UeSize,
            _ => {
                if let Some(suffix) = tag.strip_prefix("stop-") {
                    EventKind::Stop(suffix.to_string())
                } else if let Some(variant) = tag.strip_prefix("high-delay-") {
                    EventKind::HighDelay(variant.to_string())
                } else if let Some(variant) = tag.strip_prefix("pnf-timing-") {
                    EventKind::PnfTiming {
                        variant: variant.to_string(),
                        status: status?,
                    }
                } else if let Some(kind) = Self::parse_checkpoint(tag) {
                    kind
                } else {
                    EventKind::Other(tag.to_string())
                }
            }
        };
        Some(kind)
    }

    fn parse_checkpoint(tag: &str) -> Option<Self> {
        let rest = tag.strip_prefix('t')?;
        let (digits, variant) = match rest.split_once('-') {
            Some((digits, variant)) if !variant.is_empty() => (digits, Some(variant.to_string())),
            Some(_) => return None,
            None => (rest, None),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // `t04` is a different tag from `t4`; keep it verbatim
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        let index = digits.parse().ok()?;
        Some(EventKind::Checkpoint { index, variant })
    }

    /// Canonical textual tag of this kind
    pub fn tag(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Start => write!(f, "start"),
            EventKind::Stop(suffix) => write!(f, "stop-{}", suffix),
            EventKind::Checkpoint {
                index,
                variant: None,
            } => write!(f, "t{}", index),
            EventKind::Checkpoint {
                index,
                variant: Some(variant),
            } => write!(f, "t{}-{}", index, variant),
            EventKind::JitterDelay => write!(f, "jitter-delay"),
            EventKind::HighDelay(variant) => write!(f, "high-delay-{}", variant),
            EventKind::Sync => write!(f, "sync"),
            EventKind::PnfTiming { variant, .. } => write!(f, "pnf-timing-{}", variant),
            EventKind::UeSize => write!(f, "ue-size"),
            EventKind::Other(tag) => write!(f, "{}", tag),
        }
    }
}

/// A single parsed log occurrence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Logical occurrence this event belongs to
    pub key: EventKey,
    /// What checkpoint or report this is
    pub kind: EventKind,
    /// When the harness logged it, in seconds
    pub timestamp: Timestamp,
    /// Dialect-specific numeric fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub payload: Payload,
}

impl Event {
    /// Create a pure marker event with no payload
    pub fn new(key: EventKey, kind: EventKind, timestamp: Timestamp) -> Self {
        Self {
            key,
            kind,
            timestamp,
            payload: Payload::new(),
        }
    }

    /// Attach a payload field
    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        self.payload.insert(name.to_string(), value);
        self
    }

    /// Look up a payload field
    pub fn field(&self, name: &str) -> Option<f64> {
        self.payload.get(name).copied()
    }
}

/// Unit in which derived durations are expressed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Seconds,
    Milliseconds,
    #[default]
    Microseconds,
}

impl DurationUnit {
    /// Multiplier converting seconds into this unit
    pub fn per_second(self) -> f64 {
        match self {
            DurationUnit::Seconds => 1.0,
            DurationUnit::Milliseconds => 1e3,
            DurationUnit::Microseconds => 1e6,
        }
    }

    /// Short suffix for display
    pub fn symbol(self) -> &'static str {
        match self {
            DurationUnit::Seconds => "s",
            DurationUnit::Milliseconds => "ms",
            DurationUnit::Microseconds => "µs",
        }
    }
}

/// Interval derived from exactly one matched pair of events
///
/// `duration` may be negative when inputs are out of order; that is a signal
/// for the reader, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerivedInterval {
    /// Key of the events that produced this interval
    pub key: EventKey,
    /// Stop suffix or checkpoint pair name
    pub category: String,
    /// Terminal variant for checkpoint-chain intervals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub start_timestamp: Timestamp,
    pub stop_timestamp: Timestamp,
    /// `stop - start`, scaled to the configured unit
    pub duration: f64,
    /// Set by the aggregator's anomaly policy
    pub anomalous: bool,
}

impl DerivedInterval {
    /// Create an interval between two timestamps, scaled to `unit`
    pub fn between(
        key: EventKey,
        category: impl Into<String>,
        variant: Option<String>,
        start_timestamp: Timestamp,
        stop_timestamp: Timestamp,
        unit: DurationUnit,
    ) -> Self {
        Self {
            key,
            category: category.into(),
            variant,
            start_timestamp,
            stop_timestamp,
            duration: (stop_timestamp - start_timestamp) * unit.per_second(),
            anomalous: false,
        }
    }

    /// Label used to group intervals for statistics
    ///
    /// `<variant>/<category>` for checkpoint-chain intervals, the bare
    /// category otherwise.
    pub fn group_label(&self) -> String {
        match &self.variant {
            Some(variant) => format!("{}/{}", variant, self.category),
            None => self.category.clone(),
        }
    }

    /// Copy of this interval carrying the given anomaly verdict
    pub fn with_anomalous(self, anomalous: bool) -> Self {
        Self { anomalous, ..self }
    }
}

/// Report event paired with its anomaly verdict
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlaggedEvent {
    #[serde(flatten)]
    pub event: Event,
    pub anomalous: bool,
}
