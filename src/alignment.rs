//! Bin-signal alignment: which picks are backed by empirical evidence.
//!
//! A pick is publishable only if one of its signals is a "bin" signal with a
//! numeric edge. Under the default [`AlignmentPolicy::Aligned`] that signal
//! must also call the same direction as the pick.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::models::{decode_signals, Signal};

/// How strictly a bin signal has to agree with its pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentPolicy {
    /// Bin signal direction must equal the pick direction
    #[default]
    Aligned,
    /// Any bin signal qualifies; published picks list their bin signals
    AnyBin,
}

impl AlignmentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlignmentPolicy::Aligned => "aligned",
            AlignmentPolicy::AnyBin => "any_bin",
        }
    }
}

impl fmt::Display for AlignmentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlignmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "aligned" => Ok(AlignmentPolicy::Aligned),
            "any_bin" => Ok(AlignmentPolicy::AnyBin),
            other => Err(format!(
                "unknown alignment policy '{}' (expected 'aligned' or 'any_bin')",
                other
            )),
        }
    }
}

/// First bin signal (in source order) that qualifies under `policy`
pub fn find_bin_signal<'a>(
    signals: &'a [Signal],
    direction: &str,
    policy: AlignmentPolicy,
) -> Option<&'a Signal> {
    signals.iter().find(|s| {
        s.is_bin()
            && s.edge.is_some()
            && match policy {
                AlignmentPolicy::Aligned => s.direction.as_deref() == Some(direction),
                AlignmentPolicy::AnyBin => true,
            }
    })
}

/// Decode a tracked pick's `signals_json` column.
///
/// Null, empty, or unparseable text yields no signals. Individual entries
/// that are not signal objects are dropped; the rest keep their order.
pub fn parse_signals_json(raw: Option<&str>) -> Vec<Signal> {
    let raw = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return Vec::new(),
    };

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => decode_signals(value),
        Err(e) => {
            debug!(error = %e, "Unparseable signals_json");
            Vec::new()
        }
    }
}

/// Parse `signals_json` and pick out its qualifying bin signal
pub fn find_bin_signal_in_json(
    raw: Option<&str>,
    direction: &str,
    policy: AlignmentPolicy,
) -> Option<Signal> {
    let signals = parse_signals_json(raw);
    find_bin_signal(&signals, direction, policy).cloned()
}

lazy_static! {
    static ref SAMPLE_SIZE_RE: Regex = Regex::new(r"n=([\d,]+)").unwrap();
}

/// Extract the bin sample size from a detail string like "n=44,835"
pub fn parse_sample_size(detail: Option<&str>) -> Option<u64> {
    let caps = SAMPLE_SIZE_RE.captures(detail?)?;
    let digits: String = caps[1].chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}
