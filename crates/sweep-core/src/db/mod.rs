//! SQLite record store.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so the platform's writers are not blocked by a scan
//! - `busy_timeout = 5s` to ride out transient lock failures under contention
//!
//! Each bulk delete runs in its own transaction, so a group is either fully
//! deduplicated or untouched.

pub mod campaigns;
pub mod migrations;
pub mod notifications;
pub mod schema;

pub use campaigns::SqliteCampaignStore;
pub use notifications::SqliteNotificationStore;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params_from_iter, types::Type};
use std::{path::Path, time::Duration};

use crate::model::{DuplicateGroup, GroupMember, RecordId};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on bound parameters per `DELETE ... IN (...)` statement.
const DELETE_CHUNK: usize = 500;

/// Open (or create) the record store, apply runtime pragmas, and migrate the
/// schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create store directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open store database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply store migrations")?;

    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Convert a timestamp to the stored microsecond representation.
#[must_use]
pub fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

/// Read a microsecond timestamp column.
pub(crate) fn micros_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp {micros}us out of range").into(),
        )
    })
}

/// Fold rows ordered by identity key into groups of consecutive equal keys.
pub(crate) fn fold_groups<K: PartialEq>(
    rows: impl IntoIterator<Item = (K, GroupMember)>,
) -> Vec<DuplicateGroup<K>> {
    let mut groups: Vec<DuplicateGroup<K>> = Vec::new();
    for (key, member) in rows {
        match groups.last_mut() {
            Some(group) if group.key == key => group.members.push(member),
            _ => groups.push(DuplicateGroup::new(key, vec![member])),
        }
    }
    groups
}

/// Delete `ids` from `table` in a single transaction.
///
/// `table` and `id_column` are compile-time constants of the store modules,
/// never caller input.
pub(crate) fn delete_ids(
    conn: &Connection,
    table: &str,
    id_column: &str,
    ids: &[RecordId],
) -> rusqlite::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    let tx = conn.unchecked_transaction()?;
    let mut deleted = 0;
    for chunk in ids.chunks(DELETE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("DELETE FROM {table} WHERE {id_column} IN ({placeholders})");
        deleted += tx.execute(&sql, params_from_iter(chunk.iter()))?;
    }
    tx.commit()?;
    Ok(deleted)
}
