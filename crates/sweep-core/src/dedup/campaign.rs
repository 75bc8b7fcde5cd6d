//! Campaign deduplication over the whole campaign history.
//!
//! Campaigns are sparse and never legitimately repeat with identical content
//! and target, so any two records sharing a [`CampaignKey`] are duplicates no
//! matter how far apart they were created.
//!
//! [`CampaignKey`]: crate::model::CampaignKey

use serde::Serialize;
use tracing::{debug, info};

use super::{apply_resolution, collapse};
use crate::model::Collection;
use crate::store::{CampaignStore, StoreError};

/// Result of one campaign pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDedupOutcome {
    pub deleted_campaigns_count: usize,
}

/// Deletes every campaign except the oldest in each identity group.
pub struct CampaignDeduplicator<S> {
    store: S,
    dry_run: bool,
}

impl<S: CampaignStore> CampaignDeduplicator<S> {
    pub const fn new(store: S) -> Self {
        Self {
            store,
            dry_run: false,
        }
    }

    /// Count what would be deleted without deleting it.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one pass.
    ///
    /// Groups are processed one at a time, each with its own bulk delete. A
    /// failure stops the pass; groups already processed stay deleted.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`] raised by the scan or a delete.
    pub fn run(&self) -> Result<CampaignDedupOutcome, StoreError> {
        let groups = self.store.query_grouped_by_identity()?;

        let mut deleted = 0;
        let mut groups_with_duplicates = 0;
        for group in groups.iter().filter(|g| g.has_duplicates()) {
            let resolution = collapse(group);
            debug!(
                title = %group.key.title,
                notification_type = %group.key.notification_type,
                group_size = group.len(),
                survivor = ?resolution.survivors.first(),
                "resolved campaign duplicate group"
            );
            deleted += apply_resolution(Collection::Campaigns, &resolution, self.dry_run, |ids| {
                self.store.delete_by_ids(ids)
            })?;
            groups_with_duplicates += 1;
        }

        info!(
            groups = groups_with_duplicates,
            deleted,
            dry_run = self.dry_run,
            "campaign dedup pass complete"
        );
        Ok(CampaignDedupOutcome {
            deleted_campaigns_count: deleted,
        })
    }
}
