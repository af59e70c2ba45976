//! Critical Path Tests for the velocity exporter
//!
//! These tests run the real export pipelines against temporary files:
//! 1. Only bin-backed (and, by default, direction-aligned) picks are published
//! 2. picks.json ordering by hours_to_resolve, missing last
//! 3. No internal field ever reaches the public output
//! 4. Portfolio aggregates cover exactly the aligned subset
//! 5. Missing inputs produce well-formed empty outputs
//!
//! Run with: cargo test --test critical_path_tests

use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use velocity_export::config::ExportConfig;
use velocity_export::processor::{export_picks, export_portfolio};
use velocity_export::{AlignmentPolicy, ExportError};

// ============================================================================
// FIXTURES
// ============================================================================

fn config_in(dir: &Path) -> ExportConfig {
    let mut config = ExportConfig::default();
    config.paths.picks_src = dir.join("velocity_picks.json");
    config.paths.monitor_db = dir.join("velocity_monitor.sqlite");
    config.paths.output_dir = dir.join("data");
    config
}

fn read_json(path: PathBuf) -> Value {
    let text = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn write_picks(path: &Path, picks: &Value) {
    std::fs::write(path, serde_json::to_string_pretty(picks).unwrap()).unwrap();
}

fn pick(id: &str, direction: &str, hours: Option<f64>, signals: Value) -> Value {
    let mut p = json!({
        "market_id": id,
        "question": format!("Will {} happen?", id),
        "direction": direction,
        "market_implied": 0.41,
        "n_signals": 3,
        "score": 2.25,
        "signals": signals,
        "kelly_fraction": 0.12,
        "feature_vector": [0.1, 0.2, 0.3],
    });
    if let Some(h) = hours {
        p["hours_to_resolve"] = json!(h);
    }
    p
}

fn bin(direction: &str, edge: f64, detail: &str) -> Value {
    json!({"source": "bin", "direction": direction, "edge": edge, "win_rate": 0.6, "detail": detail})
}

fn model(direction: &str, edge: f64) -> Value {
    json!({"source": "model", "direction": direction, "edge": edge, "detail": "xgb v4 internals"})
}

struct Row<'a> {
    market_id: &'a str,
    direction: &'a str,
    status: &'a str,
    pnl: Option<f64>,
    resolved_at: Option<&'a str>,
    signals_json: Option<&'a str>,
}

fn create_monitor_db(path: &Path, rows: &[Row]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE tracked_picks (
            market_id TEXT PRIMARY KEY,
            question TEXT,
            direction TEXT,
            order_price REAL,
            mid_price REAL,
            first_seen TEXT,
            status TEXT,
            pnl REAL,
            resolved_at TEXT,
            signals_json TEXT
        );",
    )
    .unwrap();

    for r in rows {
        conn.execute(
            "INSERT INTO tracked_picks VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                r.market_id,
                format!("Question for {}", r.market_id),
                r.direction,
                0.42,
                0.44,
                "2026-10-01T00:00:00",
                r.status,
                r.pnl,
                r.resolved_at,
                r.signals_json,
            ],
        )
        .unwrap();
    }
}

const ALIGNED_UP: &str = r#"[{"source":"bin","direction":"up","edge":0.07,"detail":"n=1,234"}]"#;

// ============================================================================
// PICKS EXPORT TESTS
// ============================================================================

#[test]
fn test_missing_picks_source_writes_empty_array() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    let result = export_picks(&config).unwrap();

    assert!(result.source_missing);
    assert!(config.paths.output_dir.is_dir(), "Output dir should be created");
    let text = std::fs::read_to_string(config.paths.picks_dst()).unwrap();
    assert_eq!(text, "[]");
}

#[test]
fn test_only_aligned_bin_picks_published() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    write_picks(
        &config.paths.picks_src,
        &json!([
            pick("aligned", "up", Some(5.0), json!([model("up", 0.3), bin("up", 0.07, "n=1,234")])),
            pick("opposed", "up", Some(1.0), json!([bin("down", 0.09, "n=50")])),
            pick("model-only", "yes", Some(2.0), json!([model("yes", 0.4)])),
            pick("no-signals", "no", Some(3.0), json!(null)),
        ]),
    );

    let result = export_picks(&config).unwrap();
    assert_eq!(result.total, 4);
    assert_eq!(result.bin_backed, 2);

    let out = read_json(config.paths.picks_dst());
    let arr = out.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["market_id"], "aligned");
    assert_eq!(arr[0]["bin_edge"], 0.07);
    assert_eq!(arr[0]["bin_n"], 1234);
    assert_eq!(arr[0]["bin_win_rate"], 0.6);
}

#[test]
fn test_any_bin_policy_publishes_opposed_bin() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path());
    config.publish.policy = AlignmentPolicy::AnyBin;

    write_picks(
        &config.paths.picks_src,
        &json!([
            pick("opposed", "up", Some(1.0), json!([model("up", 0.3), bin("down", 0.09, "n=50")])),
            pick("model-only", "yes", Some(2.0), json!([model("yes", 0.4)])),
        ]),
    );

    export_picks(&config).unwrap();
    let out = read_json(config.paths.picks_dst());
    let arr = out.as_array().unwrap();
    assert_eq!(arr.len(), 1);
    assert_eq!(arr[0]["signals"].as_array().unwrap().len(), 1);
    assert!(arr[0].get("bin_win_rate").is_none());
}

#[test]
fn test_picks_sorted_by_hours_missing_last() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    let sig = json!([bin("up", 0.05, "n=10")]);
    write_picks(
        &config.paths.picks_src,
        &json!([
            pick("none-a", "up", None, sig.clone()),
            pick("h24", "up", Some(24.0), sig.clone()),
            pick("h0.5", "up", Some(0.5), sig.clone()),
            pick("none-b", "up", None, sig.clone()),
            pick("h6", "up", Some(6.0), sig.clone()),
        ]),
    );

    export_picks(&config).unwrap();
    let out = read_json(config.paths.picks_dst());
    let ids: Vec<&str> = out
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["market_id"].as_str().unwrap())
        .collect();

    assert_eq!(ids, vec!["h0.5", "h6", "h24", "none-a", "none-b"]);
}

#[test]
fn test_public_picks_never_leak_internal_fields() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    write_picks(
        &config.paths.picks_src,
        &json!([pick("p", "up", Some(1.0), json!([model("up", 0.3), bin("up", 0.07, "n=9")]))]),
    );

    export_picks(&config).unwrap();
    let out = read_json(config.paths.picks_dst());
    let keys: BTreeSet<&str> = out[0].as_object().unwrap().keys().map(|k| k.as_str()).collect();
    let allowed: BTreeSet<&str> = [
        "market_id",
        "question",
        "direction",
        "bin_edge",
        "bin_win_rate",
        "bin_n",
        "market_implied",
        "n_signals",
        "score",
        "hours_to_resolve",
    ]
    .into_iter()
    .collect();
    assert_eq!(keys, allowed);

    let text = std::fs::read_to_string(config.paths.picks_dst()).unwrap();
    assert!(!text.contains("xgb v4 internals"));
    assert!(!text.contains("kelly_fraction"));
    assert!(!text.contains("feature_vector"));
}

#[test]
fn test_malformed_pick_record_is_skipped() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    write_picks(
        &config.paths.picks_src,
        &json!([
            {"market_id": "broken", "direction": "up", "signals": [bin("up", 0.1, "n=1")]},
            pick("fine", "up", Some(1.0), json!([bin("up", 0.07, "n=9")])),
        ]),
    );

    let result = export_picks(&config).unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.published.len(), 1);
    assert_eq!(result.published[0].market_id, "fine");
}

#[test]
fn test_malformed_picks_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    std::fs::write(&config.paths.picks_src, "{\"not\": \"an array\"}").unwrap();

    let err = export_picks(&config).unwrap_err();
    assert!(matches!(err, ExportError::MalformedPicks { .. }));
}

#[test]
fn test_bad_sibling_signal_does_not_hide_aligned_pick() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    write_picks(
        &config.paths.picks_src,
        &json!([pick(
            "m1",
            "up",
            Some(4.0),
            json!([
                {"source": "model", "edge": "0.2", "detail": {"f": 1}},
                bin("up", 0.07, "n=1,234"),
            ]),
        )]),
    );

    let result = export_picks(&config).unwrap();
    assert_eq!(result.published.len(), 1);

    let out = read_json(config.paths.picks_dst());
    assert_eq!(out[0]["market_id"], "m1");
    assert_eq!(out[0]["bin_edge"], 0.07);
    assert_eq!(out[0]["bin_n"], 1234);
}

// ============================================================================
// PORTFOLIO EXPORT TESTS
// ============================================================================

#[test]
fn test_missing_monitor_db_writes_zeroed_portfolio() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());
    let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();

    let result = export_portfolio(&config, now).unwrap();
    assert!(result.store_missing);
    assert!(!config.paths.monitor_db.exists(), "Exporter must not create the database");

    let out = read_json(config.paths.portfolio_dst());
    assert_eq!(out["updated_at"], "2026-10-18T12:00:00.000000+00:00");
    assert_eq!(out["summary"]["pending"], 0);
    assert_eq!(out["summary"]["wins"], 0);
    assert_eq!(out["summary"]["losses"], 0);
    assert_eq!(out["summary"]["win_rate"], 0.0);
    assert_eq!(out["summary"]["total_pnl"], 0.0);
    assert!(out["summary"]["avg_bin_edge"].is_null());
    assert!(out["pending_picks"].as_array().unwrap().is_empty());
    assert!(out["recent_resolutions"].as_array().unwrap().is_empty());
}

#[test]
fn test_pending_aligned_pick_included_with_bin_fields() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    create_monitor_db(
        &config.paths.monitor_db,
        &[Row {
            market_id: "m1",
            direction: "up",
            status: "pending",
            pnl: None,
            resolved_at: None,
            signals_json: Some(ALIGNED_UP),
        }],
    );

    export_portfolio(&config, Utc::now()).unwrap();
    let out = read_json(config.paths.portfolio_dst());
    let pending = out["pending_picks"].as_array().unwrap();

    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["market_id"], "m1");
    assert_eq!(pending[0]["bin_edge"], 0.07);
    assert_eq!(pending[0]["bin_n"], 1234);
    assert_eq!(pending[0]["order_price"], 0.42);

    let keys: BTreeSet<&str> = pending[0].as_object().unwrap().keys().map(|k| k.as_str()).collect();
    let expected: BTreeSet<&str> = [
        "market_id",
        "question",
        "direction",
        "order_price",
        "mid_price",
        "first_seen",
        "bin_edge",
        "bin_n",
    ]
    .into_iter()
    .collect();
    assert_eq!(keys, expected);
}

#[test]
fn test_model_only_rows_excluded_from_aggregates() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    create_monitor_db(
        &config.paths.monitor_db,
        &[
            Row {
                market_id: "aligned-win",
                direction: "up",
                status: "won",
                pnl: Some(5.5),
                resolved_at: Some("2026-10-10T00:00:00"),
                signals_json: Some(ALIGNED_UP),
            },
            Row {
                market_id: "model-win",
                direction: "up",
                status: "won",
                pnl: Some(100.0),
                resolved_at: Some("2026-10-11T00:00:00"),
                signals_json: Some(r#"[{"source":"model","direction":"up","edge":0.3}]"#),
            },
            Row {
                market_id: "garbage",
                direction: "up",
                status: "lost",
                pnl: Some(-50.0),
                resolved_at: Some("2026-10-12T00:00:00"),
                signals_json: Some("not json at all"),
            },
            Row {
                market_id: "opposed",
                direction: "down",
                status: "lost",
                pnl: Some(-3.0),
                resolved_at: Some("2026-10-13T00:00:00"),
                signals_json: Some(ALIGNED_UP),
            },
        ],
    );

    let result = export_portfolio(&config, Utc::now()).unwrap();
    assert_eq!(result.total_tracked, 4);
    assert_eq!(result.aligned, 1);

    let out = read_json(config.paths.portfolio_dst());
    assert_eq!(out["summary"]["wins"], 1);
    assert_eq!(out["summary"]["losses"], 0);
    assert_eq!(out["summary"]["win_rate"], 1.0);
    assert_eq!(out["summary"]["total_pnl"], 5.5);
    assert_eq!(out["summary"]["avg_bin_edge"], 0.07);

    let resolutions = out["recent_resolutions"].as_array().unwrap();
    assert_eq!(resolutions.len(), 1);
    assert_eq!(resolutions[0]["market_id"], "aligned-win");
    assert_eq!(resolutions[0]["status"], "won");
}

#[test]
fn test_recent_resolutions_capped_and_descending() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    let ids: Vec<String> = (0..60).map(|i| format!("m{:02}", i)).collect();
    let dates: Vec<String> = (0..60)
        .map(|i| format!("2026-09-{:02}T{:02}:00:00", 1 + i % 28, i % 24))
        .collect();
    let rows: Vec<Row> = (0..60)
        .map(|i| Row {
            market_id: &ids[i],
            direction: "up",
            status: if i % 3 == 0 { "lost" } else { "won" },
            pnl: Some(if i % 3 == 0 { -1.0 } else { 0.5 }),
            resolved_at: if i == 7 { None } else { Some(dates[i].as_str()) },
            signals_json: Some(ALIGNED_UP),
        })
        .collect();
    create_monitor_db(&config.paths.monitor_db, &rows);

    export_portfolio(&config, Utc::now()).unwrap();
    let out = read_json(config.paths.portfolio_dst());
    let resolutions = out["recent_resolutions"].as_array().unwrap();

    assert_eq!(resolutions.len(), 50);
    let stamps: Vec<&str> = resolutions
        .iter()
        .map(|r| r["resolved_at"].as_str().unwrap_or(""))
        .collect();
    for pair in stamps.windows(2) {
        assert!(pair[0] >= pair[1], "{} should not precede {}", pair[0], pair[1]);
    }

    assert_eq!(out["summary"]["wins"], 40);
    assert_eq!(out["summary"]["losses"], 20);
    assert_eq!(out["summary"]["win_rate"], 0.6667);
    assert_eq!(out["summary"]["total_pnl"], 0.0);
}

#[test]
fn test_resolutions_csv_written_when_enabled() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path());
    config.publish.write_csv = true;

    create_monitor_db(
        &config.paths.monitor_db,
        &[Row {
            market_id: "m1",
            direction: "up",
            status: "lost",
            pnl: Some(-2.0),
            resolved_at: Some("2026-10-01T00:00:00"),
            signals_json: Some(ALIGNED_UP),
        }],
    );

    export_portfolio(&config, Utc::now()).unwrap();
    let csv = std::fs::read_to_string(config.paths.resolutions_csv()).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.contains("m1,Question for m1,up,lost,-2.00,2026-10-01T00:00:00,0.0700,1234"));
}

#[test]
fn test_numeric_timestamps_and_blob_signals_still_counted() {
    let dir = TempDir::new().unwrap();
    let config = config_in(dir.path());

    {
        // Columns without a declared type keep whatever storage class is written
        let conn = Connection::open(&config.paths.monitor_db).unwrap();
        conn.execute_batch(
            "CREATE TABLE tracked_picks (
                market_id TEXT, question TEXT, direction TEXT,
                order_price REAL, mid_price REAL, first_seen,
                status TEXT, pnl REAL, resolved_at, signals_json
            );",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO tracked_picks VALUES ('m1', 'Q1', 'up', 0.4, 0.41, ?1, 'pending', NULL, NULL, ?2)",
            params![1760000000.5_f64, ALIGNED_UP],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO tracked_picks VALUES ('m2', 'Q2', 'up', 0.4, 0.41, NULL, 'won', 2.0, ?1, ?2)",
            params![1760003600_i64, ALIGNED_UP.as_bytes().to_vec()],
        )
        .unwrap();
    }

    let result = export_portfolio(&config, Utc::now()).unwrap();
    assert_eq!(result.total_tracked, 2);
    assert_eq!(result.aligned, 2);

    let out = read_json(config.paths.portfolio_dst());
    assert_eq!(out["summary"]["pending"], 1);
    assert_eq!(out["summary"]["wins"], 1);
    assert_eq!(out["pending_picks"][0]["first_seen"], "1760000000.5");
    assert_eq!(out["recent_resolutions"][0]["resolved_at"], "1760003600");
}

#[test]
fn test_missing_monitor_db_clears_stale_csv() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(dir.path());
    config.publish.write_csv = true;

    std::fs::create_dir_all(&config.paths.output_dir).unwrap();
    std::fs::write(
        config.paths.resolutions_csv(),
        "market_id,question,direction,status,pnl,resolved_at,bin_edge,bin_n\nold,Q,up,won,9.00,2026-01-01,0.0500,10\n",
    )
    .unwrap();

    let result = export_portfolio(&config, Utc::now()).unwrap();
    assert!(result.store_missing);

    let csv = std::fs::read_to_string(config.paths.resolutions_csv()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, ["market_id,question,direction,status,pnl,resolved_at,bin_edge,bin_n"]);
}
