use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use velocity_export::models::Portfolio;
use velocity_export::output;
use velocity_export::processor::{self, PicksExport, PortfolioExport};
use velocity_export::{AlignmentPolicy, ExportConfig};

#[derive(Parser)]
#[command(name = "velocity-export")]
#[command(about = "Export sanitized velocity picks and portfolio stats to JSON for the website")]
struct Cli {
    /// YAML config file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Candidate picks JSON
    #[arg(long, global = true)]
    picks_src: Option<PathBuf>,

    /// Pick monitor SQLite database
    #[arg(long, global = true)]
    monitor_db: Option<PathBuf>,

    /// Output directory for generated files
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Bin signal policy: aligned or any_bin
    #[arg(long, global = true)]
    policy: Option<AlignmentPolicy>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write picks.json and portfolio.json (default)
    Export,

    /// Write picks.json only
    Picks,

    /// Write portfolio.json only
    Portfolio,

    /// Print a report from an existing portfolio.json
    Summary {
        /// Path to portfolio JSON (defaults to <output_dir>/portfolio.json)
        #[arg(short = 'p', long)]
        portfolio_path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&log_filter))
        .with_target(false)
        .init();

    debug!(?config, "Resolved configuration");

    match cli.command.unwrap_or(Commands::Export) {
        Commands::Export => {
            run_picks(&config)?;
            run_portfolio(&config)?;
            println!("Done. Data written to {}", config.paths.output_dir.display());
        }
        Commands::Picks => {
            run_picks(&config)?;
        }
        Commands::Portfolio => {
            run_portfolio(&config)?;
        }
        Commands::Summary { portfolio_path } => {
            let path = portfolio_path.unwrap_or_else(|| config.paths.portfolio_dst());
            show_summary(&path)?;
        }
    }

    Ok(())
}

/// Defaults → YAML → environment → CLI flags
fn resolve_config(cli: &Cli) -> Result<ExportConfig> {
    let mut config = ExportConfig::load_with_env(cli.config.as_deref())
        .context("Failed to load configuration")?;

    if let Some(p) = &cli.picks_src {
        config.paths.picks_src = p.clone();
    }
    if let Some(p) = &cli.monitor_db {
        config.paths.monitor_db = p.clone();
    }
    if let Some(p) = &cli.output_dir {
        config.paths.output_dir = p.clone();
    }
    if let Some(policy) = cli.policy {
        config.publish.policy = policy;
    }

    Ok(config)
}

fn run_picks(config: &ExportConfig) -> Result<PicksExport> {
    println!("📥 Loading picks from {}...", config.paths.picks_src.display());
    let result = processor::export_picks(config).context("Picks export failed")?;

    if result.source_missing {
        println!(
            "⚠️  Warning: {} not found, writing empty picks.",
            config.paths.picks_src.display()
        );
    } else {
        println!(
            "✅ Exported {}/{} picks ({} bin-backed, {} {}).",
            result.published.len(),
            result.total,
            result.bin_backed,
            result.published.len(),
            match config.publish.policy {
                AlignmentPolicy::Aligned => "aligned",
                AlignmentPolicy::AnyBin => "published",
            }
        );
    }

    Ok(result)
}

fn run_portfolio(config: &ExportConfig) -> Result<PortfolioExport> {
    println!("🔌 Reading tracked picks from {}...", config.paths.monitor_db.display());
    let result = processor::export_portfolio(config, Utc::now()).context("Portfolio export failed")?;

    if result.store_missing {
        println!(
            "⚠️  Warning: {} not found, writing empty portfolio.",
            config.paths.monitor_db.display()
        );
        return Ok(result);
    }

    let s = &result.portfolio.summary;
    println!(
        "✅ Exported portfolio: {}/{} aligned bin-backed, {} pending, {}W/{}L, PnL={:+.2}, avg bin edge={}",
        result.aligned,
        result.total_tracked,
        s.pending,
        s.wins,
        s.losses,
        s.total_pnl,
        output::format_pct(s.avg_bin_edge)
    );
    if config.publish.write_csv {
        println!("  ✅ CSV: {}", config.paths.resolutions_csv().display());
    }

    Ok(result)
}

fn show_summary(path: &Path) -> Result<()> {
    if !path.exists() {
        println!("❌ Portfolio not found at {}. Run 'export' first.", path.display());
        return Ok(());
    }

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let portfolio: Portfolio = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    println!("{}", output::generate_report(&portfolio));
    Ok(())
}
