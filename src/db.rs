use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::ExportResult;
use crate::models::{PickStatus, TrackedPick};

/// Open the monitor database read-only; never creates the file
pub fn open_read_only(path: &Path) -> ExportResult<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    debug!(db_path = %path.display(), "Opened monitor database");
    Ok(conn)
}

/// Fetch every tracked pick (full unfiltered scan).
///
/// Rows whose columns can't be read as the expected types are skipped.
pub fn fetch_tracked_picks(conn: &Connection) -> ExportResult<Vec<TrackedPick>> {
    let query = r#"
        SELECT market_id, question, direction, order_price,
               mid_price, first_seen, status, pnl, resolved_at, signals_json
        FROM tracked_picks
    "#;

    let mut stmt = conn.prepare(query)?;
    let rows = stmt.query_map([], row_to_tracked_pick)?;

    let mut picks = Vec::new();
    for (i, row) in rows.enumerate() {
        match row {
            Ok(pick) => picks.push(pick),
            Err(e) => warn!(row = i, error = %e, "Skipping unreadable tracked_picks row"),
        }
    }

    Ok(picks)
}

fn row_to_tracked_pick(row: &Row) -> rusqlite::Result<TrackedPick> {
    let status: String = row.get(6)?;
    Ok(TrackedPick {
        market_id: row.get(0)?,
        question: column_text(row, 1)?,
        direction: row.get(2)?,
        order_price: row.get(3)?,
        mid_price: row.get(4)?,
        first_seen: column_text(row, 5)?,
        status: PickStatus::from(status),
        pnl: row.get(7)?,
        resolved_at: column_text(row, 8)?,
        signals_json: column_text(row, 9)?,
    })
}

/// Read a free-form text column whatever its storage class.
///
/// SQLite doesn't enforce declared types, so timestamps may be stored as
/// numbers and JSON as a blob. Numbers are rendered as text; a blob that
/// isn't UTF-8 reads as NULL.
fn column_text(row: &Row, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => std::str::from_utf8(b).ok().map(str::to_string),
    })
}
