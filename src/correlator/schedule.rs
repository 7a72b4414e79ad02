//! Per-slot scheduling map
//!
//! Records, for every frame/slot, whether an uplink or downlink terminal
//! checkpoint was seen. Frames are those holding at least one checkpoint.

use crate::events::{Event, EventKey, EventKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

fn default_terminal() -> String {
    "t4".to_string()
}

fn default_uplink() -> Vec<String> {
    vec!["ultti".to_string(), "uldci".to_string()]
}

fn default_downlink() -> Vec<String> {
    vec!["dltti".to_string(), "txdata".to_string()]
}

fn default_slots_per_frame() -> u32 {
    20
}

/// Which terminal variants count as uplink and downlink
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleSpec {
    #[serde(default = "default_terminal")]
    pub terminal: String,
    #[serde(default = "default_uplink")]
    pub uplink: Vec<String>,
    #[serde(default = "default_downlink")]
    pub downlink: Vec<String>,
    #[serde(default = "default_slots_per_frame")]
    pub slots_per_frame: u32,
}

impl Default for ScheduleSpec {
    fn default() -> Self {
        Self {
            terminal: default_terminal(),
            uplink: default_uplink(),
            downlink: default_downlink(),
            slots_per_frame: default_slots_per_frame(),
        }
    }
}

/// Link directions scheduled in one slot
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotUsage {
    pub uplink: bool,
    pub downlink: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotDirection {
    Idle,
    Uplink,
    Downlink,
    Both,
}

impl SlotUsage {
    pub fn direction(self) -> SlotDirection {
        match (self.uplink, self.downlink) {
            (false, false) => SlotDirection::Idle,
            (true, false) => SlotDirection::Uplink,
            (false, true) => SlotDirection::Downlink,
            (true, true) => SlotDirection::Both,
        }
    }
}

/// Cell counts over `frames x slots_per_frame`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub frames: usize,
    pub uplink_only: usize,
    pub downlink_only: usize,
    pub both: usize,
    pub idle: usize,
}

impl ScheduleSummary {
    pub fn total(&self) -> usize {
        self.uplink_only + self.downlink_only + self.both + self.idle
    }
}

/// One cell of the map, as exported
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleCell {
    pub frame: u32,
    pub slot: u32,
    pub direction: SlotDirection,
}

/// Scheduling map of one source
#[derive(Debug, Clone, Default)]
pub struct ScheduleMap {
    frames: BTreeSet<u32>,
    cells: BTreeMap<(u32, u32), SlotUsage>,
    slots_per_frame: u32,
}

impl ScheduleMap {
    /// Build the map from a source's events
    pub fn from_events(events: &[Event], spec: &ScheduleSpec) -> Self {
        let mut map = Self {
            slots_per_frame: spec.slots_per_frame,
            ..Self::default()
        };
        let prefix = format!("{}-", spec.terminal);

        for event in events {
            let EventKey::FrameSlot { frame, slot } = event.key else {
                continue;
            };
            if !matches!(event.kind, EventKind::Checkpoint { .. }) {
                continue;
            }
            map.frames.insert(frame);

            let tag = event.kind.tag();
            let Some(variant) = tag.strip_prefix(prefix.as_str()) else {
                continue;
            };
            let is_uplink = spec.uplink.iter().any(|v| v == variant);
            let is_downlink = spec.downlink.iter().any(|v| v == variant);
            if !is_uplink && !is_downlink {
                continue;
            }

            let usage = map.cells.entry((frame, slot)).or_default();
            usage.uplink |= is_uplink;
            usage.downlink |= is_downlink;
        }

        map
    }

    /// Frames seen, ascending
    pub fn frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.frames.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Usage of one slot; unseen slots are idle
    pub fn usage(&self, frame: u32, slot: u32) -> SlotUsage {
        self.cells.get(&(frame, slot)).copied().unwrap_or_default()
    }

    /// Every cell in frame-major order
    pub fn cells(&self) -> Vec<ScheduleCell> {
        self.frames
            .iter()
            .flat_map(|&frame| {
                (0..self.slots_per_frame).map(move |slot| (frame, slot))
            })
            .map(|(frame, slot)| ScheduleCell {
                frame,
                slot,
                direction: self.usage(frame, slot).direction(),
            })
            .collect()
    }

    /// Count cells by direction
    ///
    /// Slots at or beyond `slots_per_frame` are not counted.
    pub fn summary(&self) -> ScheduleSummary {
        let mut summary = ScheduleSummary {
            frames: self.frames.len(),
            ..ScheduleSummary::default()
        };
        for cell in self.cells() {
            match cell.direction {
                SlotDirection::Idle => summary.idle += 1,
                SlotDirection::Uplink => summary.uplink_only += 1,
                SlotDirection::Downlink => summary.downlink_only += 1,
                SlotDirection::Both => summary.both += 1,
            }
        }
        summary
    }
}
