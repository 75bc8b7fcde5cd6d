//! SQLite-backed [`CampaignStore`].

use rusqlite::{Connection, params};

use super::{delete_ids, fold_groups, micros_column, to_micros};
use crate::model::{CampaignKey, CampaignRecord, Collection, DuplicateGroup, GroupMember, RecordId};
use crate::store::{CampaignStore, StoreError};

/// Rows of every campaign whose identity key is shared with another campaign,
/// ordered so each identity partition is contiguous and oldest-first.
const DUPLICATE_CAMPAIGNS_SQL: &str = "
SELECT campaign_id, title, body, notification_type, class_id, class_number, created_at_us
FROM (
    SELECT
        c.*,
        COUNT(*) OVER (
            PARTITION BY title, body, notification_type, class_id, class_number
        ) AS group_size
    FROM campaigns AS c
)
WHERE group_size > 1
ORDER BY title, body, notification_type, class_id, class_number, created_at_us, campaign_id";

/// Campaign store over a shared SQLite connection.
pub struct SqliteCampaignStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteCampaignStore<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn scan(&self) -> rusqlite::Result<Vec<DuplicateGroup<CampaignKey>>> {
        let mut stmt = self.conn.prepare(DUPLICATE_CAMPAIGNS_SQL)?;
        let rows = stmt
            .query_map([], |row| {
                let key = CampaignKey {
                    title: row.get(1)?,
                    body: row.get(2)?,
                    notification_type: row.get(3)?,
                    class_id: row.get(4)?,
                    class_number: row.get(5)?,
                };
                Ok((key, GroupMember::new(row.get::<_, String>(0)?, micros_column(row, 6)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(fold_groups(rows))
    }
}

impl CampaignStore for SqliteCampaignStore<'_> {
    fn query_grouped_by_identity(&self) -> Result<Vec<DuplicateGroup<CampaignKey>>, StoreError> {
        self.scan()
            .map_err(|err| StoreError::query(Collection::Campaigns, err))
    }

    fn delete_by_ids(&self, ids: &[RecordId]) -> Result<usize, StoreError> {
        delete_ids(self.conn, "campaigns", "campaign_id", ids)
            .map_err(|err| StoreError::delete(Collection::Campaigns, ids.len(), err))
    }
}

/// Insert a campaign row. Used by fixtures and imports; the platform's own
/// send path writes campaigns directly.
///
/// # Errors
///
/// Returns an error if the insert violates the schema or the id exists.
pub fn insert_campaign(conn: &Connection, record: &CampaignRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO campaigns (
            campaign_id, title, body, notification_type, class_id, class_number, created_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id,
            record.key.title,
            record.key.body,
            record.key.notification_type,
            record.key.class_id,
            record.key.class_number,
            to_micros(record.created_at),
        ],
    )?;
    Ok(())
}

/// Count all campaign rows.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn count_campaigns(conn: &Connection) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM campaigns", [], |row| row.get(0))?;
    Ok(usize::try_from(count).unwrap_or_default())
}
