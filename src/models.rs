use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Source tag of an empirically binned (historical outcome) signal
pub const BIN_SOURCE: &str = "bin";

/// One contributing signal behind a pick, as produced upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// "bin" for the empirical signal, anything else is model-derived
    pub source: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub edge: Option<f64>,
    #[serde(default)]
    pub win_rate: Option<f64>,
    /// Free text, e.g. "n=44,835 hist bin 0.30-0.35"
    #[serde(default)]
    pub detail: Option<String>,
}

impl Signal {
    pub fn is_bin(&self) -> bool {
        self.source == BIN_SOURCE
    }
}

/// Decode a JSON signal list, dropping entries that aren't signal objects.
///
/// Anything other than an array yields no signals. Survivors keep their order.
pub fn decode_signals(value: serde_json::Value) -> Vec<Signal> {
    let serde_json::Value::Array(values) = value else {
        if !value.is_null() {
            debug!("Signal list is not an array");
        }
        return Vec::new();
    };

    values
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| match serde_json::from_value::<Signal>(v) {
            Ok(signal) => Some(signal),
            Err(e) => {
                debug!(index = i, error = %e, "Dropping malformed signal entry");
                None
            }
        })
        .collect()
}

fn lenient_signals<'de, D>(deserializer: D) -> Result<Option<Vec<Signal>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.map(decode_signals))
}

/// Candidate pick as written to velocity_picks.json
///
/// Unknown keys (scoring internals, model features) are ignored on load
/// and can never reach the public output.
#[derive(Debug, Clone, Deserialize)]
pub struct Pick {
    pub market_id: String,
    pub question: String,
    /// "up"/"down" or "yes"/"no"
    pub direction: String,
    pub market_implied: f64,
    pub n_signals: u32,
    pub score: f64,
    #[serde(default)]
    pub hours_to_resolve: Option<f64>,
    /// Malformed entries are dropped, never fail the pick
    #[serde(default, deserialize_with = "lenient_signals")]
    pub signals: Option<Vec<Signal>>,
}

impl Pick {
    /// Signals in source order; null or absent reads as empty
    pub fn signals(&self) -> &[Signal] {
        self.signals.as_deref().unwrap_or(&[])
    }

    pub fn has_bin_signal(&self) -> bool {
        self.signals().iter().any(Signal::is_bin)
    }
}

/// Lifecycle state of a tracked pick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PickStatus {
    Pending,
    Won,
    Lost,
    /// Any status the monitor writes that the exporter does not count
    Other(String),
}

impl PickStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PickStatus::Pending => "pending",
            PickStatus::Won => "won",
            PickStatus::Lost => "lost",
            PickStatus::Other(s) => s,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, PickStatus::Won | PickStatus::Lost)
    }
}

impl From<String> for PickStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => PickStatus::Pending,
            "won" => PickStatus::Won,
            "lost" => PickStatus::Lost,
            _ => PickStatus::Other(s),
        }
    }
}

impl From<PickStatus> for String {
    fn from(status: PickStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Row of the monitor's `tracked_picks` table
#[derive(Debug, Clone)]
pub struct TrackedPick {
    pub market_id: String,
    pub question: Option<String>,
    pub direction: String,
    pub order_price: Option<f64>,
    pub mid_price: Option<f64>,
    pub first_seen: Option<String>,
    pub status: PickStatus,
    pub pnl: Option<f64>,
    pub resolved_at: Option<String>,
    /// Serialized `Vec<Signal>`, may be null or garbage
    pub signals_json: Option<String>,
}

/// Tracked pick that passed the alignment filter, with its bin evidence
#[derive(Debug, Clone)]
pub struct AlignedPick {
    pub row: TrackedPick,
    pub bin_edge: f64,
    pub bin_n: Option<u64>,
}

// ============================================================================
// PUBLIC OUTPUT RECORDS
// ============================================================================

/// A bin signal as exposed in the looser publishing policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicSignal {
    pub direction: Option<String>,
    pub edge: f64,
    pub win_rate: Option<f64>,
    pub bin_n: Option<u64>,
}

/// Policy-dependent part of a published pick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BinEvidence {
    /// Directionally aligned bin signal's historical win rate
    WinRate { bin_win_rate: Option<f64> },
    /// Every bin signal on the pick
    Signals { signals: Vec<PublicSignal> },
}

/// Entry of picks.json
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicPick {
    pub market_id: String,
    pub question: String,
    pub direction: String,
    pub bin_edge: f64,
    #[serde(flatten)]
    pub evidence: BinEvidence,
    pub bin_n: Option<u64>,
    pub market_implied: f64,
    pub n_signals: u32,
    pub score: f64,
    pub hours_to_resolve: Option<f64>,
}

/// Entry of portfolio.json `pending_picks`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPick {
    pub market_id: String,
    pub question: Option<String>,
    pub direction: String,
    pub order_price: Option<f64>,
    pub mid_price: Option<f64>,
    pub first_seen: Option<String>,
    pub bin_edge: f64,
    pub bin_n: Option<u64>,
}

/// Entry of portfolio.json `recent_resolutions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub market_id: String,
    pub question: Option<String>,
    pub direction: String,
    pub status: PickStatus,
    pub pnl: Option<f64>,
    pub resolved_at: Option<String>,
    pub bin_edge: f64,
    pub bin_n: Option<u64>,
}

/// Aggregate performance over the aligned subset
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub pending: usize,
    pub wins: usize,
    pub losses: usize,
    /// wins / (wins + losses), 0.0 without resolutions
    pub win_rate: f64,
    pub total_pnl: f64,
    /// None when nothing is aligned
    pub avg_bin_edge: Option<f64>,
}

impl PortfolioSummary {
    pub fn resolved(&self) -> usize {
        self.wins + self.losses
    }
}

/// Root object of portfolio.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// RFC 3339 UTC
    pub updated_at: String,
    pub summary: PortfolioSummary,
    pub pending_picks: Vec<PendingPick>,
    pub recent_resolutions: Vec<Resolution>,
}

impl Portfolio {
    /// Zeroed portfolio written when the monitor database is missing
    pub fn empty(updated_at: String) -> Self {
        Self {
            updated_at,
            summary: PortfolioSummary::default(),
            pending_picks: Vec::new(),
            recent_resolutions: Vec::new(),
        }
    }
}
