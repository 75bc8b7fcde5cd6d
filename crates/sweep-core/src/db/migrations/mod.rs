//! Record store schema versions, tracked in `PRAGMA user_version` and
//! mirrored into `store_meta`.

use super::schema;
use anyhow::{Context, Result, bail};
use rusqlite::{Connection, types::Type};

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create campaigns and notifications",
        sql: schema::MIGRATION_V1_SQL,
    },
    Migration {
        version: 2,
        name: "identity grouping indexes",
        sql: schema::MIGRATION_V2_SQL,
    },
];

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 2;

/// Read the store's schema version.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the stored value does not
/// fit a `u32`.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Bring the store up to [`LATEST_SCHEMA_VERSION`] and return the version
/// it ends at.
///
/// Each pending step commits on its own, so an interrupted upgrade resumes
/// from the last completed version.
///
/// # Errors
///
/// Returns an error if a step fails, or if the store was written by a newer
/// binary than this one.
pub fn migrate(conn: &mut Connection) -> Result<u32> {
    let start = current_schema_version(conn).context("read store schema version")?;
    if start > LATEST_SCHEMA_VERSION {
        bail!(
            "store schema version {start} is newer than this binary supports \
             ({LATEST_SCHEMA_VERSION}); upgrade sweep"
        );
    }

    for step in MIGRATIONS.iter().filter(|m| m.version > start) {
        let version = i64::from(step.version);
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)
            .with_context(|| format!("store migration v{} ({})", step.version, step.name))?;
        tx.pragma_update(None, "user_version", version)?;
        tx.execute("UPDATE store_meta SET schema_version = ?1 WHERE id = 1", [version])?;
        tx.commit()?;
        tracing::debug!(version = step.version, name = step.name, "applied store migration");
    }

    Ok(LATEST_SCHEMA_VERSION)
}
