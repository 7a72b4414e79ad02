//! Built-in log dialects of the RAN test harness
//!
//! The harness emits several mutually exclusive line formats. Bracketed
//! timestamps (`[1.000042] frame=3 slot=7 ...`) come from the instrumented
//! gNB; bare leading timestamps come from the VNF and PNF halves of an nFAPI
//! split. Most dialects are plain data compiled into a
//! [`PatternRecognizer`]; the VNF jitter/delay report has its own recognizer.

use super::recognizer::{DialectPriority, DialectSpec, FieldSpec, PatternRecognizer, Recognizer, TIMESTAMP_GROUP};
use crate::error::{ClassificationError, DialectError};
use crate::events::{Event, EventKey, EventKind};
use regex::{Captures, Regex};

const BRACKETED: &str = r"^\[(?P<ts>\d+\.\d+)\]\s+frame=(?P<frame>\d+)\s+slot=(?P<slot>\d+)\s+";
const BARE: &str = r"^(?P<ts>[\d.]+)";
const VNF_CHANNELS: [&str; 4] = ["dl", "ul", "uldci", "txdata"];

fn dialect(name: &str, pattern: String, kind: &str, fields: Vec<FieldSpec>) -> DialectSpec {
    DialectSpec {
        name: name.to_string(),
        pattern,
        kind: kind.to_string(),
        fields,
        priority: DialectPriority::Last,
    }
}

/// `start` / `stop-<suffix>` markers
pub fn marker() -> DialectSpec {
    dialect(
        "marker",
        format!(r"{}(?P<kind>start|stop-\w+)\b", BRACKETED),
        "{kind}",
        vec![],
    )
}

/// Numbered checkpoints `t1`..`t5`, with `t4-<variant>` terminals
pub fn checkpoint() -> DialectSpec {
    dialect(
        "checkpoint",
        format!(r"{}(?P<kind>t\d+(?:-\w+)?)\b", BRACKETED),
        "{kind}",
        vec![],
    )
}

/// Per-UE transport block size reports
pub fn ue_size() -> DialectSpec {
    dialect(
        "ue-size",
        format!(
            r"{}UE\s+(?P<ue>[a-fA-F0-9]+):\s+Size\s+(?P<size>\d+)",
            BRACKETED
        ),
        "ue-size",
        vec![FieldSpec::hex("rnti", "ue"), FieldSpec::decimal("size")],
    )
}

/// Name of the VNF combined jitter/delay dialect
pub const JITTER_DELAY_DIALECT: &str = "vnf-jitter-delay";

fn channel_group(label: &str) -> String {
    format!(
        r"{}\(DL=(-?\d+)\s+UL=(-?\d+)\s+ULDCI=(-?\d+)\s+TxData=(-?\d+)\s*µ?s?\)",
        label
    )
}

/// VNF combined `Jitter(...)` and `Delays(...)` report
///
/// Both groups must appear on the same line, in either order, so the line
/// cannot be described by a single pattern.
#[derive(Debug, Clone)]
pub struct JitterDelayRecognizer {
    timestamp: Regex,
    jitter: Regex,
    delays: Regex,
}

impl JitterDelayRecognizer {
    /// # Errors
    ///
    /// Returns `DialectError::InvalidPattern` if a group pattern fails to compile.
    pub fn new() -> Result<Self, DialectError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|source| DialectError::InvalidPattern {
                dialect: JITTER_DELAY_DIALECT.to_string(),
                source,
            })
        };

        Ok(Self {
            timestamp: compile(BARE)?,
            jitter: compile(&channel_group("Jitter"))?,
            delays: compile(&channel_group("Delays"))?,
        })
    }

    fn build(
        &self,
        line: &str,
        timestamp: &str,
        groups: [(&str, Captures<'_>); 2],
    ) -> Result<Event, ClassificationError> {
        let timestamp = timestamp
            .parse::<f64>()
            .ok()
            .filter(|ts| ts.is_finite())
            .ok_or_else(|| ClassificationError::MalformedTimestamp {
                line: line.to_string(),
            })?;

        let mut event = Event::new(EventKey::Global, EventKind::JitterDelay, timestamp);
        for (suffix, caps) in &groups {
            for (index, channel) in VNF_CHANNELS.iter().enumerate() {
                let name = format!("{}_{}", channel, suffix);
                let value = caps
                    .get(index + 1)
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| ClassificationError::MalformedField {
                        field: name.clone(),
                        line: line.to_string(),
                    })?;
                event.payload.insert(name, value);
            }
        }
        Ok(event)
    }
}

impl Recognizer for JitterDelayRecognizer {
    fn name(&self) -> &str {
        JITTER_DELAY_DIALECT
    }

    fn recognize(&self, line: &str) -> Option<Result<Event, ClassificationError>> {
        let jitter = self.jitter.captures(line)?;
        let delays = self.delays.captures(line)?;
        let timestamp = self.timestamp.captures(line)?.name(TIMESTAMP_GROUP)?.as_str();
        Some(self.build(line, timestamp, [("jitter", jitter), ("delay", delays)]))
    }
}

/// VNF `High DL_TTI delay=<n>µs` warning
pub fn vnf_high_dltti() -> DialectSpec {
    dialect(
        "vnf-high-dltti",
        format!(r"{}.*?High DL_TTI delay=(?P<dl_delay>\d+)µs", BARE),
        "high-delay-dltti",
        vec![FieldSpec::decimal("dl_delay")],
    )
}

/// VNF `High TxData delay=<n>µs` warning
pub fn vnf_high_txdata() -> DialectSpec {
    dialect(
        "vnf-high-txdata",
        format!(r"{}.*?High TxData delay=(?P<txdata_delay>\d+)µs", BARE),
        "high-delay-txdata",
        vec![FieldSpec::decimal("txdata_delay")],
    )
}

/// VNF slot synchronisation `adjustment: <n> (from <frame>.<slot>)`
pub fn vnf_sync() -> DialectSpec {
    dialect(
        "vnf-sync",
        format!(
            r"{}.*?adjustment: (?P<sync_adjustment>-?\d+) \(from (?P<slotnum>[\d.]+)\)",
            BARE
        ),
        "sync",
        vec![FieldSpec::decimal("sync_adjustment")],
    )
}

fn pnf_timing(name: &str, message: &str, delta_sep: &str, variant: &str) -> DialectSpec {
    dialect(
        name,
        format!(
            r"{}.*?{} for (?P<slotnum>[\d.]+) arrived (?P<status>TOO LATE|TOO EARLY) \(delta{}\s*(?P<delta_us>-?\d+) µs\)",
            BARE, message, delta_sep
        ),
        &format!("pnf-timing-{}", variant),
        vec![FieldSpec::decimal("delta_us")],
    )
}

/// PNF `[PNF-TIMING]` report for DL_TTI
pub fn pnf_dltti() -> DialectSpec {
    pnf_timing("pnf-dltti", "Message DL_TTI", ":", "dltti")
}

/// PNF PHY-level `[PNF-DELAY]` report for DL_TTI
pub fn pnf_dltti_phy() -> DialectSpec {
    pnf_timing("pnf-dltti-phy", "DL_TTI", "=", "dltti")
}

/// PNF `[PNF-TIMING]` report for TX_DATA
pub fn pnf_txdata() -> DialectSpec {
    pnf_timing("pnf-txdata", "Message TX_DATA", ":", "txdata")
}

/// PNF PHY-level report for TX_Data
pub fn pnf_txdata_phy() -> DialectSpec {
    pnf_timing("pnf-txdata-phy", "TX_Data", "=", "txdata")
}

/// PNF `[PNF-TIMING]` report for UL_TTI
pub fn pnf_ultti() -> DialectSpec {
    pnf_timing("pnf-ultti", "Message UL_TTI", ":", "ultti")
}

/// All built-in recognizers in priority order
///
/// # Errors
///
/// Returns `DialectError` if a built-in pattern fails to compile.
pub fn builtin() -> Result<Vec<Box<dyn Recognizer>>, DialectError> {
    let compile = |spec: DialectSpec| -> Result<Box<dyn Recognizer>, DialectError> {
        Ok(Box::new(PatternRecognizer::from_spec(&spec)?))
    };

    Ok(vec![
        compile(marker())?,
        compile(checkpoint())?,
        compile(ue_size())?,
        Box::new(JitterDelayRecognizer::new()?),
        compile(vnf_high_dltti())?,
        compile(vnf_high_txdata())?,
        compile(vnf_sync())?,
        compile(pnf_dltti())?,
        compile(pnf_dltti_phy())?,
        compile(pnf_txdata())?,
        compile(pnf_txdata_phy())?,
        compile(pnf_ultti())?,
    ])
}
