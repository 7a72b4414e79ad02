//! Pairing specification
//!
//! Which kinds open and close intervals is configuration, not code. A
//! [`PairingSpec`] holds any number of start/stop rules and checkpoint
//! chains; the defaults reproduce the harness's `start`/`stop-*` markers and
//! its `t1`..`t5` chain with `t4-<variant>` terminals.

use crate::error::CorrelationError;
use serde::{Deserialize, Serialize};

/// Endpoint suffix standing for "the terminal, resolved per variant"
pub const VARIANT_WILDCARD: &str = "-*";

fn default_start() -> String {
    "start".to_string()
}

fn default_stop_prefix() -> String {
    "stop-".to_string()
}

/// Rule pairing the latest start of a key with later stops of the same key
///
/// The category of an emitted interval is the stop tag with `stop_prefix`
/// removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartStopRule {
    /// Tag that opens an interval
    #[serde(default = "default_start")]
    pub start: String,
    /// Prefix identifying stop tags
    #[serde(default = "default_stop_prefix")]
    pub stop_prefix: String,
    /// Accepted suffixes; empty accepts any
    #[serde(default)]
    pub suffixes: Vec<String>,
    /// Forget the start after its first successful pairing
    #[serde(default)]
    pub consume_start: bool,
}

impl Default for StartStopRule {
    fn default() -> Self {
        Self {
            start: default_start(),
            stop_prefix: default_stop_prefix(),
            suffixes: Vec::new(),
            consume_start: false,
        }
    }
}

impl StartStopRule {
    /// Category for a stop tag, or `None` if the tag is not a stop of this rule
    pub fn category_of<'a>(&self, tag: &'a str) -> Option<&'a str> {
        let suffix = tag.strip_prefix(self.stop_prefix.as_str())?;
        if suffix.is_empty() {
            return None;
        }
        if !self.suffixes.is_empty() && !self.suffixes.iter().any(|s| s == suffix) {
            return None;
        }
        Some(suffix)
    }
}

/// Named pair of checkpoint endpoints
///
/// An endpoint ending in `-*` is resolved against each terminal variant,
/// so `t4-*` means `t4-ultti`, `t4-dltti` and so on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointPair {
    pub name: String,
    pub from: String,
    pub to: String,
}

impl CheckpointPair {
    /// Create a pair
    pub fn new(name: &str, from: &str, to: &str) -> Self {
        Self {
            name: name.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    fn uses_wildcard(&self) -> bool {
        self.from.ends_with(VARIANT_WILDCARD) || self.to.ends_with(VARIANT_WILDCARD)
    }

    /// Concrete `(from, to)` tags for a variant pass
    ///
    /// Returns `None` if an endpoint needs a variant and none is given.
    pub fn resolve(&self, variant: Option<&str>) -> Option<(String, String)> {
        Some((
            resolve_endpoint(&self.from, variant)?,
            resolve_endpoint(&self.to, variant)?,
        ))
    }
}

fn resolve_endpoint(endpoint: &str, variant: Option<&str>) -> Option<String> {
    match endpoint.strip_suffix(VARIANT_WILDCARD) {
        Some(base) => variant.map(|v| format!("{}-{}", base, v)),
        None => Some(endpoint.to_string()),
    }
}

/// Ordered checkpoint chain with variant terminals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointChain {
    /// Base tag of the terminal checkpoint, e.g. `t4`
    pub terminal: String,
    /// Terminal variants; a key is processed once per variant present
    #[serde(default)]
    pub variants: Vec<String>,
    pub pairs: Vec<CheckpointPair>,
}

impl Default for CheckpointChain {
    fn default() -> Self {
        Self {
            terminal: "t4".to_string(),
            variants: ["ultti", "uldci", "dltti", "txdata"]
                .iter()
                .map(|v| v.to_string())
                .collect(),
            pairs: vec![
                CheckpointPair::new("t1-t2", "t1", "t2"),
                CheckpointPair::new("t2-t3", "t2", "t3"),
                CheckpointPair::new("t3-t4", "t3", "t4-*"),
                CheckpointPair::new("t4-t5", "t4-*", "t5"),
                CheckpointPair::new("t1-t5", "t1", "t5"),
            ],
        }
    }
}

impl CheckpointChain {
    /// Tag of the terminal checkpoint for a variant
    pub fn terminal_tag(&self, variant: &str) -> String {
        format!("{}-{}", self.terminal, variant)
    }
}

/// Full pairing specification consumed by the correlator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairingSpec {
    #[serde(default)]
    pub start_stop: Vec<StartStopRule>,
    #[serde(default)]
    pub chains: Vec<CheckpointChain>,
}

impl Default for PairingSpec {
    fn default() -> Self {
        Self {
            start_stop: vec![StartStopRule::default()],
            chains: vec![CheckpointChain::default()],
        }
    }
}

impl PairingSpec {
    /// Spec with only the given start/stop rules
    pub fn start_stop_only(rules: Vec<StartStopRule>) -> Self {
        Self {
            start_stop: rules,
            chains: Vec::new(),
        }
    }

    /// Spec with only the given checkpoint chains
    pub fn chains_only(chains: Vec<CheckpointChain>) -> Self {
        Self {
            start_stop: Vec::new(),
            chains,
        }
    }

    /// Check the pairing is usable
    ///
    /// # Errors
    ///
    /// Returns `CorrelationError` if the pairing is empty or a rule or pair is
    /// incomplete.
    pub fn validate(&self) -> Result<(), CorrelationError> {
        if self.start_stop.is_empty() && self.chains.is_empty() {
            return Err(CorrelationError::EmptyPairingSpec);
        }

        for rule in &self.start_stop {
            if rule.start.is_empty() {
                return Err(CorrelationError::InvalidStartStopRule(
                    "start tag is empty".to_string(),
                ));
            }
            if rule.stop_prefix.is_empty() {
                return Err(CorrelationError::InvalidStartStopRule(
                    "stop prefix is empty".to_string(),
                ));
            }
        }

        for chain in &self.chains {
            for pair in &chain.pairs {
                let invalid = |reason: &str| CorrelationError::InvalidCheckpointPair {
                    name: pair.name.clone(),
                    reason: reason.to_string(),
                };
                if pair.name.is_empty() {
                    return Err(invalid("pair has no name"));
                }
                if pair.from.is_empty() || pair.to.is_empty() {
                    return Err(invalid("pair endpoint is empty"));
                }
                if pair.uses_wildcard() && chain.variants.is_empty() {
                    return Err(invalid("variant endpoint in a chain without variants"));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_spec_is_valid() {
        assert!(PairingSpec::default().validate().is_ok());
    }

    #[test]
    fn test_empty_spec_is_rejected() {
        let spec = PairingSpec::chains_only(vec![]);
        assert_eq!(spec.validate(), Err(CorrelationError::EmptyPairingSpec));
    }

    #[test]
    fn test_category_of() {
        let rule = StartStopRule::default();
        assert_eq!(rule.category_of("stop-bar"), Some("bar"));
        assert_eq!(rule.category_of("stop-"), None);
        assert_eq!(rule.category_of("start"), None);

        let rule = StartStopRule {
            suffixes: vec!["ultti".to_string()],
            ..StartStopRule::default()
        };
        assert_eq!(rule.category_of("stop-ultti"), Some("ultti"));
        assert_eq!(rule.category_of("stop-dltti"), None);
    }

    #[test]
    fn test_pair_resolution() {
        let pair = CheckpointPair::new("t3-t4", "t3", "t4-*");
        assert_eq!(
            pair.resolve(Some("ultti")),
            Some(("t3".to_string(), "t4-ultti".to_string()))
        );
        assert_eq!(pair.resolve(None), None);

        let pair = CheckpointPair::new("t1-t2", "t1", "t2");
        assert_eq!(
            pair.resolve(None),
            Some(("t1".to_string(), "t2".to_string()))
        );
    }

    #[test]
    fn test_wildcard_without_variants_is_rejected() {
        let spec = PairingSpec::chains_only(vec![CheckpointChain {
            terminal: "t4".to_string(),
            variants: vec![],
            pairs: vec![CheckpointPair::new("t3-t4", "t3", "t4-*")],
        }]);
        assert!(matches!(
            spec.validate(),
            Err(CorrelationError::InvalidCheckpointPair { .. })
        ));
    }

    #[test]
    fn test_empty_stop_prefix_is_rejected() {
        let spec = PairingSpec::start_stop_only(vec![StartStopRule {
            stop_prefix: String::new(),
            ..StartStopRule::default()
        }]);
        assert!(matches!(
            spec.validate(),
            Err(CorrelationError::InvalidStartStopRule(_))
        ));
    }

    #[test]
    fn test_spec_from_toml() {
        let spec: PairingSpec = toml::from_str(
            r#"
            [[start_stop]]
            consume_start = true
            suffixes = ["ultti", "dltti"]

            [[chains]]
            terminal = "t4"
            variants = ["ultti"]
            pairs = [
                { name = "t1-t4", from = "t1", to = "t4-*" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(spec.start_stop[0].start, "start");
        assert_eq!(spec.start_stop[0].stop_prefix, "stop-");
        assert!(spec.start_stop[0].consume_start);
        assert_eq!(spec.chains[0].terminal_tag("ultti"), "t4-ultti");
        assert!(spec.validate().is_ok());
    }
}
