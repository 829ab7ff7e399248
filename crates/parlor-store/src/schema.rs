// ABOUTME: Version-tracked schema migrations for the message database.
// ABOUTME: Pending migrations run in one transaction and bump PRAGMA user_version.

use rusqlite::{Connection, TransactionBehavior};

use crate::error::StoreError;

/// Ordered migrations. Entry `n` brings the schema to version `n + 1`.
pub const MIGRATIONS: &[&str] = &[
    // AUTOINCREMENT keeps ids from being reused once the highest row is deleted.
    "CREATE TABLE messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sender TEXT NOT NULL,
        sent_time TEXT NOT NULL,
        text TEXT NOT NULL
    );",
];

/// Columns of the `messages` table, in declaration order.
pub const MESSAGE_COLUMNS: [&str; 4] = ["id", "sender", "sent_time", "text"];

pub fn latest_version() -> i64 {
    MIGRATIONS.len() as i64
}

pub fn current_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Bring the schema up to the latest version. Safe to call on every start:
/// an up-to-date database is left untouched. Returns the schema version.
///
/// A database this build cannot use is rejected before anything is written,
/// and a column mismatch rolls the whole migration back.
pub fn ensure_schema(conn: &mut Connection) -> Result<i64, StoreError> {
    let latest = latest_version();
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(StoreError::unavailable("begin migration"))?;

    let current = current_version(&tx).map_err(StoreError::unavailable("read schema version"))?;
    if current > latest {
        return Err(StoreError::schema(
            "read schema version",
            format!("schema version {current} is newer than supported version {latest}"),
        ));
    }
    let Ok(applied) = usize::try_from(current) else {
        return Err(StoreError::schema(
            "read schema version",
            format!("schema version {current} is not a valid version"),
        ));
    };

    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(applied) {
        tx.execute_batch(sql)
            .map_err(StoreError::unavailable("apply migration"))?;
        tracing::info!(version = idx + 1, "applied schema migration");
    }

    if current < latest {
        tx.pragma_update(None, "user_version", latest)
            .map_err(StoreError::unavailable("write schema version"))?;
    }

    verify_columns(&tx)?;
    tx.commit()
        .map_err(StoreError::unavailable("commit migration"))?;
    Ok(latest)
}

/// Check that the `messages` table has exactly the declared columns.
fn verify_columns(conn: &Connection) -> Result<(), StoreError> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info('messages') ORDER BY cid")
        .map_err(StoreError::unavailable("inspect schema"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(StoreError::unavailable("inspect schema"))?;

    if names != MESSAGE_COLUMNS {
        return Err(StoreError::schema(
            "verify schema",
            format!("messages table has columns {names:?}, expected {MESSAGE_COLUMNS:?}"),
        ));
    }
    Ok(())
}
