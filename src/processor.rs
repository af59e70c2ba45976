//! The two export pipelines: picks.json and portfolio.json.
//!
//! Both read an immutable snapshot of their source, keep only bin-backed
//! entries, project them to public records and hand them to the writer.

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::alignment::{find_bin_signal_in_json, parse_sample_size, AlignmentPolicy};
use crate::config::ExportConfig;
use crate::db;
use crate::error::{ExportError, ExportResult};
use crate::models::{
    AlignedPick, PendingPick, Pick, PickStatus, Portfolio, PublicPick, Resolution, TrackedPick,
};
use crate::output;
use crate::sanitize::sanitize_pick;
use crate::stats;

// ============================================================================
// PICKS
// ============================================================================

/// Outcome of a picks export
#[derive(Debug, Clone)]
pub struct PicksExport {
    /// Valid pick records in the source
    pub total: usize,
    /// Of those, picks carrying any bin signal
    pub bin_backed: usize,
    pub published: Vec<PublicPick>,
    /// Source file was absent and an empty list was written
    pub source_missing: bool,
}

/// Load candidate picks, or `None` if the file doesn't exist.
///
/// The file must hold a JSON array. Elements that don't decode as a pick
/// are skipped.
pub fn load_picks(path: &Path) -> ExportResult<Option<Vec<Pick>>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&contents).map_err(|source| ExportError::MalformedPicks {
            path: path.to_path_buf(),
            source,
        })?;

    let mut picks = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        let market_id = value
            .get("market_id")
            .and_then(|v| v.as_str())
            .unwrap_or("?")
            .to_string();
        match serde_json::from_value::<Pick>(value) {
            Ok(pick) => picks.push(pick),
            Err(e) => warn!(index = i, market_id = %market_id, error = %e, "Skipping malformed pick"),
        }
    }

    Ok(Some(picks))
}

/// Publishable picks, soonest to resolve first.
///
/// Picks without `hours_to_resolve` go last; ties keep source order.
pub fn select_public_picks(picks: &[Pick], policy: AlignmentPolicy) -> Vec<PublicPick> {
    let mut public: Vec<PublicPick> = picks
        .iter()
        .filter_map(|p| sanitize_pick(p, policy))
        .collect();

    public.sort_by(|a, b| hours_key(a).total_cmp(&hours_key(b)));
    public
}

fn hours_key(pick: &PublicPick) -> f64 {
    pick.hours_to_resolve.unwrap_or(f64::INFINITY)
}

/// Build and write picks.json
pub fn export_picks(config: &ExportConfig) -> ExportResult<PicksExport> {
    let paths = &config.paths;
    std::fs::create_dir_all(&paths.output_dir)?;
    let dst = paths.picks_dst();

    let picks = match load_picks(&paths.picks_src)? {
        Some(picks) => picks,
        None => {
            warn!(path = %paths.picks_src.display(), "Picks source not found, writing empty picks");
            output::write_json(&dst, &Vec::<PublicPick>::new())?;
            return Ok(PicksExport {
                total: 0,
                bin_backed: 0,
                published: Vec::new(),
                source_missing: true,
            });
        }
    };

    let bin_backed = picks.iter().filter(|p| p.has_bin_signal()).count();
    let published = select_public_picks(&picks, config.publish.policy);

    output::write_json(&dst, &published)?;
    info!(
        published = published.len(),
        total = picks.len(),
        bin_backed,
        policy = %config.publish.policy,
        "Wrote {}",
        dst.display()
    );

    Ok(PicksExport {
        total: picks.len(),
        bin_backed,
        published,
        source_missing: false,
    })
}

// ============================================================================
// PORTFOLIO
// ============================================================================

/// Outcome of a portfolio export
#[derive(Debug, Clone)]
pub struct PortfolioExport {
    /// Rows read from tracked_picks
    pub total_tracked: usize,
    /// Rows that passed the alignment filter
    pub aligned: usize,
    pub portfolio: Portfolio,
    /// Monitor database was absent and a zeroed portfolio was written
    pub store_missing: bool,
}

/// Keep rows with a qualifying bin signal, each judged on its own signals_json
pub fn align_tracked_picks(rows: Vec<TrackedPick>, policy: AlignmentPolicy) -> Vec<AlignedPick> {
    rows.into_iter()
        .filter_map(|row| {
            let bin = find_bin_signal_in_json(row.signals_json.as_deref(), &row.direction, policy);
            let Some(bin) = bin else {
                debug!(market_id = %row.market_id, "No qualifying bin signal");
                return None;
            };
            let bin_edge = bin.edge?;
            Some(AlignedPick {
                bin_n: parse_sample_size(bin.detail.as_deref()),
                bin_edge,
                row,
            })
        })
        .collect()
}

/// Summary plus pending list and the latest `recent_limit` resolutions
pub fn build_portfolio(aligned: &[AlignedPick], updated_at: String, recent_limit: usize) -> Portfolio {
    let summary = stats::compute_summary(aligned);

    let pending_picks = aligned
        .iter()
        .filter(|p| p.row.status == PickStatus::Pending)
        .map(|p| PendingPick {
            market_id: p.row.market_id.clone(),
            question: p.row.question.clone(),
            direction: p.row.direction.clone(),
            order_price: p.row.order_price,
            mid_price: p.row.mid_price,
            first_seen: p.row.first_seen.clone(),
            bin_edge: p.bin_edge,
            bin_n: p.bin_n,
        })
        .collect();

    let mut resolved: Vec<&AlignedPick> = aligned.iter().filter(|p| p.row.status.is_resolved()).collect();
    // Missing resolved_at compares as "" and sinks to the end
    resolved.sort_by(|a, b| resolved_key(b).cmp(resolved_key(a)));

    let recent_resolutions = resolved
        .into_iter()
        .take(recent_limit)
        .map(|p| Resolution {
            market_id: p.row.market_id.clone(),
            question: p.row.question.clone(),
            direction: p.row.direction.clone(),
            status: p.row.status.clone(),
            pnl: p.row.pnl,
            resolved_at: p.row.resolved_at.clone(),
            bin_edge: p.bin_edge,
            bin_n: p.bin_n,
        })
        .collect();

    Portfolio {
        updated_at,
        summary,
        pending_picks,
        recent_resolutions,
    }
}

fn resolved_key(pick: &AlignedPick) -> &str {
    pick.row.resolved_at.as_deref().unwrap_or("")
}

/// RFC 3339 UTC with microseconds, e.g. 2026-10-18T09:30:00.123456+00:00
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Build and write portfolio.json (and the optional CSV)
pub fn export_portfolio(config: &ExportConfig, now: DateTime<Utc>) -> ExportResult<PortfolioExport> {
    let paths = &config.paths;
    std::fs::create_dir_all(&paths.output_dir)?;
    let dst = paths.portfolio_dst();
    let updated_at = format_timestamp(now);

    if !paths.monitor_db.exists() {
        warn!(path = %paths.monitor_db.display(), "Monitor database not found, writing empty portfolio");
        let portfolio = Portfolio::empty(updated_at);
        output::write_json(&dst, &portfolio)?;
        if config.publish.write_csv {
            output::write_resolutions_csv(&[], &paths.resolutions_csv())?;
        }
        return Ok(PortfolioExport {
            total_tracked: 0,
            aligned: 0,
            portfolio,
            store_missing: true,
        });
    }

    let rows = {
        let conn = db::open_read_only(&paths.monitor_db)?;
        db::fetch_tracked_picks(&conn)?
    };
    let total_tracked = rows.len();

    let aligned = align_tracked_picks(rows, config.publish.policy);
    let portfolio = build_portfolio(&aligned, updated_at, config.publish.recent_limit);

    output::write_json(&dst, &portfolio)?;
    if config.publish.write_csv {
        output::write_resolutions_csv(&portfolio.recent_resolutions, &paths.resolutions_csv())?;
    }
    info!(
        aligned = aligned.len(),
        total = total_tracked,
        policy = %config.publish.policy,
        "Wrote {}",
        dst.display()
    );

    Ok(PortfolioExport {
        total_tracked,
        aligned: aligned.len(),
        portfolio,
        store_missing: false,
    })
}
