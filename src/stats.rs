use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{AlignedPick, PickStatus, PortfolioSummary};

/// Decimal places for ratios (win rate, average edge)
pub const RATIO_DP: u32 = 4;
/// Decimal places for money
pub const PNL_DP: u32 = 2;

/// Round to `dp` decimals, ties to even, on the exact binary value of `x`.
///
/// Non-finite or out-of-range inputs are returned unchanged.
pub fn round_dp(x: f64, dp: u32) -> f64 {
    Decimal::from_f64_retain(x)
        .map(|d| d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven))
        .and_then(|d| d.to_f64())
        .unwrap_or(x)
}

/// wins / (wins + losses), 0.0 when nothing has resolved
pub fn win_rate(wins: usize, losses: usize) -> f64 {
    let resolved = wins + losses;
    if resolved == 0 {
        return 0.0;
    }
    round_dp(wins as f64 / resolved as f64, RATIO_DP)
}

/// Arithmetic mean, None for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Summary statistics over the aligned subset only
pub fn compute_summary(aligned: &[AlignedPick]) -> PortfolioSummary {
    let mut pending = 0;
    let mut wins = 0;
    let mut losses = 0;
    let mut total_pnl = 0.0;

    for pick in aligned {
        match pick.row.status {
            PickStatus::Pending => pending += 1,
            PickStatus::Won => wins += 1,
            PickStatus::Lost => losses += 1,
            PickStatus::Other(_) => {}
        }

        if pick.row.status.is_resolved() {
            if let Some(pnl) = pick.row.pnl.filter(|p| *p != 0.0) {
                total_pnl += pnl;
            }
        }
    }

    let edges: Vec<f64> = aligned.iter().map(|p| p.bin_edge).collect();

    PortfolioSummary {
        pending,
        wins,
        losses,
        win_rate: win_rate(wins, losses),
        total_pnl: round_dp(total_pnl, PNL_DP),
        avg_bin_edge: mean(&edges).map(|m| round_dp(m, RATIO_DP)),
    }
}
