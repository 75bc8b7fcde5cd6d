//! SQLite-backed [`NotificationStore`].
//!
//! The window filter is applied before partitioning, so a record older than
//! `since` can neither appear in a group nor make a recent record look like a
//! duplicate.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use super::{delete_ids, fold_groups, micros_column, to_micros};
use crate::model::{
    Collection, DuplicateGroup, GroupMember, NotificationKey, NotificationRecord, RecordId,
};
use crate::store::{NotificationStore, StoreError};

const RECENT_DUPLICATE_NOTIFICATIONS_SQL: &str = "
SELECT notification_id, recipient_id, title, body, notification_type, created_at_us
FROM (
    SELECT
        n.*,
        COUNT(*) OVER (
            PARTITION BY recipient_id, title, body, notification_type
        ) AS group_size
    FROM notifications AS n
    WHERE n.created_at_us >= ?1
)
WHERE group_size > 1
ORDER BY recipient_id, title, body, notification_type, created_at_us, notification_id";

/// Notification store over a shared SQLite connection.
pub struct SqliteNotificationStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteNotificationStore<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn scan(&self, since: DateTime<Utc>) -> rusqlite::Result<Vec<DuplicateGroup<NotificationKey>>> {
        let mut stmt = self.conn.prepare(RECENT_DUPLICATE_NOTIFICATIONS_SQL)?;
        let rows = stmt
            .query_map(params![to_micros(since)], |row| {
                let key = NotificationKey {
                    recipient_id: row.get(1)?,
                    title: row.get(2)?,
                    body: row.get(3)?,
                    notification_type: row.get(4)?,
                };
                Ok((key, GroupMember::new(row.get::<_, String>(0)?, micros_column(row, 5)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(fold_groups(rows))
    }
}

impl NotificationStore for SqliteNotificationStore<'_> {
    fn query_recent_grouped_by_identity(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DuplicateGroup<NotificationKey>>, StoreError> {
        self.scan(since)
            .map_err(|err| StoreError::query(Collection::Notifications, err))
    }

    fn delete_by_ids(&self, ids: &[RecordId]) -> Result<usize, StoreError> {
        delete_ids(self.conn, "notifications", "notification_id", ids)
            .map_err(|err| StoreError::delete(Collection::Notifications, ids.len(), err))
    }
}

/// Insert a notification row. Used by fixtures and imports.
///
/// # Errors
///
/// Returns an error if the insert violates the schema or the id exists.
pub fn insert_notification(conn: &Connection, record: &NotificationRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO notifications (
            notification_id, recipient_id, title, body, notification_type, created_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.id,
            record.key.recipient_id,
            record.key.title,
            record.key.body,
            record.key.notification_type,
            to_micros(record.created_at),
        ],
    )?;
    Ok(())
}

/// Count all notification rows, regardless of age.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_notifications(conn: &Connection) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM notifications", [], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or_default())
}
