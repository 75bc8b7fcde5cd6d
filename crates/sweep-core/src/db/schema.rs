//! SQLite schema for the record store.
//!
//! - `campaigns` holds broadcast campaigns; identity is
//!   `(title, body, notification_type, class_id, class_number)`
//! - `notifications` holds per-recipient inbox entries; identity is
//!   `(recipient_id, title, body, notification_type)`
//! - `store_meta` tracks the applied schema version
//!
//! Timestamps are integer microseconds since the Unix epoch (UTC).

/// Migration v1: record tables plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS campaigns (
    campaign_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    notification_type TEXT NOT NULL CHECK (length(trim(notification_type)) > 0),
    class_id TEXT,
    class_number INTEGER,
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    recipient_id TEXT NOT NULL CHECK (length(trim(recipient_id)) > 0),
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    notification_type TEXT NOT NULL CHECK (length(trim(notification_type)) > 0),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: indexes backing the duplicate scans.
///
/// The identity indexes end in `created_at_us` so each partition is already
/// ordered oldest-first when the scan walks it.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_campaigns_identity
    ON campaigns(title, body, notification_type, class_id, class_number, created_at_us);

CREATE INDEX IF NOT EXISTS idx_notifications_created
    ON notifications(created_at_us);

CREATE INDEX IF NOT EXISTS idx_notifications_identity
    ON notifications(recipient_id, title, body, notification_type, created_at_us);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by the duplicate scan paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_campaigns_identity",
    "idx_notifications_created",
    "idx_notifications_identity",
];

#[cfg(test)]
mod tests {
    use crate::db::migrations;
    use rusqlite::{Connection, params};

    fn seeded_conn() -> rusqlite::Result<Connection> {
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate(&mut conn).expect("migrate");

        for idx in 0..40_i64 {
            conn.execute(
                "INSERT INTO notifications (
                    notification_id, recipient_id, title, body, notification_type, created_at_us
                 ) VALUES (?1, ?2, ?3, 'body', 'info', ?4)",
                params![
                    format!("n-{idx:03}"),
                    format!("user-{}", idx % 5),
                    format!("Title {}", idx % 3),
                    idx * 1_000_000
                ],
            )?;
            conn.execute(
                "INSERT INTO campaigns (
                    campaign_id, title, body, notification_type, class_id, class_number, created_at_us
                 ) VALUES (?1, ?2, 'body', 'exam', 'C1', ?3, ?4)",
                params![
                    format!("c-{idx:03}"),
                    format!("Campaign {}", idx % 4),
                    idx % 2,
                    idx * 1_000_000
                ],
            )?;
        }

        Ok(conn)
    }

    fn query_plan_details(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}"))?;
        let details = stmt
            .query_map([], |row| row.get::<_, String>(3))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(details)
    }

    #[test]
    fn query_plan_uses_notification_window_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT notification_id FROM notifications WHERE created_at_us >= 30000000",
        )?;

        assert!(
            details.iter().any(|d| d.contains("idx_notifications_created")),
            "expected window index in plan, got: {details:?}"
        );
        Ok(())
    }

    #[test]
    fn query_plan_uses_campaign_identity_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT campaign_id FROM campaigns
             WHERE title = 'Campaign 1' AND body = 'body' AND notification_type = 'exam'",
        )?;

        assert!(
            details.iter().any(|d| d.contains("idx_campaigns_identity")),
            "expected identity index in plan, got: {details:?}"
        );
        Ok(())
    }

    #[test]
    fn blank_recipient_is_rejected() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let result = conn.execute(
            "INSERT INTO notifications (
                notification_id, recipient_id, title, body, notification_type, created_at_us
             ) VALUES ('n-bad', '  ', 't', 'b', 'info', 0)",
            [],
        );
        assert!(result.is_err());
        Ok(())
    }
}
