use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::ExportResult;
use crate::models::{Portfolio, Resolution};

/// Write `value` as pretty JSON (2-space indent)
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> ExportResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Export recent resolutions to CSV
/// Format: market_id, question, direction, status, pnl, resolved_at, bin_edge, bin_n
pub fn write_resolutions_csv(resolutions: &[Resolution], path: &Path) -> ExportResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "market_id",
        "question",
        "direction",
        "status",
        "pnl",
        "resolved_at",
        "bin_edge",
        "bin_n",
    ])?;

    for r in resolutions {
        wtr.write_record([
            r.market_id.clone(),
            r.question.clone().unwrap_or_default(),
            r.direction.clone(),
            r.status.as_str().to_string(),
            r.pnl.map(|p| format!("{:.2}", p)).unwrap_or_default(),
            r.resolved_at.clone().unwrap_or_default(),
            format!("{:.4}", r.bin_edge),
            r.bin_n.map(|n| n.to_string()).unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// "7.0%" style percentage, or "n/a"
pub fn format_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Generate a human-readable summary of a portfolio
pub fn generate_report(portfolio: &Portfolio) -> String {
    let s = &portfolio.summary;
    let mut report = String::new();

    report.push_str("╔══════════════════════════════════════════════════════════════════╗\n");
    report.push_str("║           VELOCITY PICKS - PUBLIC PORTFOLIO REPORT               ║\n");
    report.push_str("╚══════════════════════════════════════════════════════════════════╝\n\n");

    report.push_str(&format!("Updated: {}\n\n", portfolio.updated_at));

    report.push_str("📊 SUMMARY (bin-backed picks only)\n");
    report.push_str("─────────────────────────────────────────\n");
    report.push_str(&format!("  Pending:        {:>6}\n", s.pending));
    report.push_str(&format!(
        "  Record:         {:>3}W / {}L ({} resolved)\n",
        s.wins,
        s.losses,
        s.resolved()
    ));
    report.push_str(&format!("  Win rate:       {:>6.1}%\n", s.win_rate * 100.0));
    report.push_str(&format!("  Total PnL:      {:>+9.2}\n", s.total_pnl));
    report.push_str(&format!("  Avg bin edge:   {:>6}\n", format_pct(s.avg_bin_edge)));
    report.push('\n');

    report.push_str(&format!("⏳ PENDING PICKS ({})\n", portfolio.pending_picks.len()));
    report.push_str("─────────────────────────────────────────\n");
    if portfolio.pending_picks.is_empty() {
        report.push_str("  (none)\n");
    }
    for p in portfolio.pending_picks.iter().take(10) {
        report.push_str(&format!(
            "  {:<5} edge={:>5} n={:>7} | {}\n",
            p.direction.to_uppercase(),
            format_pct(Some(p.bin_edge)),
            p.bin_n.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
            truncate(p.question.as_deref().unwrap_or(&p.market_id), 48)
        ));
    }
    report.push('\n');

    report.push_str(&format!(
        "✅ RECENT RESOLUTIONS ({})\n",
        portfolio.recent_resolutions.len()
    ));
    report.push_str("─────────────────────────────────────────\n");
    if portfolio.recent_resolutions.is_empty() {
        report.push_str("  (none)\n");
    }
    for r in portfolio.recent_resolutions.iter().take(10) {
        report.push_str(&format!(
            "  {:<4} {:>+8.2} {:<20} | {}\n",
            r.status.as_str().to_uppercase(),
            r.pnl.unwrap_or(0.0),
            r.resolved_at.as_deref().unwrap_or("-"),
            truncate(r.question.as_deref().unwrap_or(&r.market_id), 40)
        ));
    }

    report.push('\n');
    report.push_str("═══════════════════════════════════════════════════════════════════\n");

    report
}
