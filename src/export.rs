//! JSON and CSV writers for analysis results
//!
//! These are thin adapters: they serialise what the core produced and do no
//! analysis of their own.

use crate::aggregator::SummaryStatistics;
use crate::correlator::ScheduleCell;
use crate::error::ExportError;
use crate::events::{DerivedInterval, EventKey, FlaggedEvent};
use log::debug;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write any serialisable value as pretty-printed JSON
///
/// # Errors
///
/// Returns `ExportError` if the file cannot be written or the value fails to serialise.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ExportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn key_columns(key: &EventKey) -> [String; 3] {
    [
        key.to_string(),
        key.frame().map(|f| f.to_string()).unwrap_or_default(),
        key.slot().map(|s| s.to_string()).unwrap_or_default(),
    ]
}

/// One row per derived interval
pub fn write_intervals_csv(intervals: &[DerivedInterval], path: &Path) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "key",
        "frame",
        "slot",
        "category",
        "variant",
        "start_timestamp",
        "stop_timestamp",
        "duration",
        "anomalous",
    ])?;

    for interval in intervals {
        let [key, frame, slot] = key_columns(&interval.key);
        wtr.write_record([
            key,
            frame,
            slot,
            interval.category.clone(),
            interval.variant.clone().unwrap_or_default(),
            interval.start_timestamp.to_string(),
            interval.stop_timestamp.to_string(),
            interval.duration.to_string(),
            interval.anomalous.to_string(),
        ])?;
    }

    wtr.flush()?;
    debug!("Wrote {} intervals to {}", intervals.len(), path.display());
    Ok(())
}

/// One row per event record, one column per payload field
///
/// Fields a record lacks are left empty.
pub fn write_events_csv(events: &[FlaggedEvent], path: &Path) -> Result<(), ExportError> {
    let fields: BTreeSet<&str> = events
        .iter()
        .flat_map(|e| e.event.payload.keys().map(String::as_str))
        .collect();

    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec!["timestamp", "key", "frame", "slot", "kind", "anomalous"];
    header.extend(fields.iter().copied());
    wtr.write_record(&header)?;

    for flagged in events {
        let event = &flagged.event;
        let [key, frame, slot] = key_columns(&event.key);
        let mut row = vec![
            event.timestamp.to_string(),
            key,
            frame,
            slot,
            event.kind.tag(),
            flagged.anomalous.to_string(),
        ];
        row.extend(fields.iter().map(|name| opt(event.field(name))));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    debug!("Wrote {} events to {}", events.len(), path.display());
    Ok(())
}

/// One row per statistics group
pub fn write_statistics_csv(
    statistics: &BTreeMap<String, SummaryStatistics>,
    path: &Path,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["group", "count", "mean", "min", "max", "std_dev", "median"])?;

    for (group, stats) in statistics {
        wtr.write_record([
            group.clone(),
            stats.count.to_string(),
            opt(stats.mean),
            opt(stats.min),
            opt(stats.max),
            opt(stats.std_dev),
            opt(stats.median),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// One row per frame/slot cell of a schedule map
pub fn write_schedule_csv(cells: &[ScheduleCell], path: &Path) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    for cell in cells {
        wtr.serialize(cell)?;
    }
    wtr.flush()?;
    Ok(())
}
