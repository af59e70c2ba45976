//! Projection of internal picks onto the public field set.
//!
//! Nothing leaves this module except the fields of [`PublicPick`]:
//! non-bin signals, free-text details and scoring internals are dropped.

use crate::alignment::{find_bin_signal, parse_sample_size, AlignmentPolicy};
use crate::models::{BinEvidence, Pick, PublicPick, PublicSignal, Signal};

/// Strip a pick down to its publishable fields.
///
/// Returns `None` when the pick has no qualifying bin signal under `policy`.
pub fn sanitize_pick(pick: &Pick, policy: AlignmentPolicy) -> Option<PublicPick> {
    let bin = find_bin_signal(pick.signals(), &pick.direction, policy)?;
    let bin_edge = bin.edge?;

    let evidence = match policy {
        AlignmentPolicy::Aligned => BinEvidence::WinRate {
            bin_win_rate: bin.win_rate,
        },
        AlignmentPolicy::AnyBin => BinEvidence::Signals {
            signals: public_bin_signals(pick.signals()),
        },
    };

    Some(PublicPick {
        market_id: pick.market_id.clone(),
        question: pick.question.clone(),
        direction: pick.direction.clone(),
        bin_edge,
        evidence,
        bin_n: parse_sample_size(bin.detail.as_deref()),
        market_implied: pick.market_implied,
        n_signals: pick.n_signals,
        score: pick.score,
        hours_to_resolve: pick.hours_to_resolve,
    })
}

fn public_bin_signals(signals: &[Signal]) -> Vec<PublicSignal> {
    signals
        .iter()
        .filter(|s| s.is_bin())
        .filter_map(|s| {
            Some(PublicSignal {
                direction: s.direction.clone(),
                edge: s.edge?,
                win_rate: s.win_rate,
                bin_n: parse_sample_size(s.detail.as_deref()),
            })
        })
        .collect()
}
