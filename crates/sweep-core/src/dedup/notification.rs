//! Per-recipient notification deduplication inside a lookback window.
//!
//! Notifications are high-volume, so only the most recent window is scanned.
//! Within it, records sharing a [`NotificationKey`] for the same recipient are
//! merged according to the configured [`MergePolicy`].
//!
//! [`NotificationKey`]: crate::model::NotificationKey

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{MergePolicy, Resolution, apply_resolution, canonical_order};
use crate::model::{Collection, DuplicateGroup, GroupMember};
use crate::store::{NotificationStore, StoreError};

/// Default lookback: 30 days.
pub const DEFAULT_LOOKBACK: TimeDelta = TimeDelta::days(30);

/// Default merge threshold: 1 hour.
pub const DEFAULT_MERGE_THRESHOLD: TimeDelta = TimeDelta::hours(1);

/// Time parameters of one notification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationWindow {
    /// Only records created at or after `now - lookback` are considered.
    pub lookback: TimeDelta,
    /// Maximum gap between consecutive members still treated as one send.
    pub merge_threshold: TimeDelta,
    pub policy: MergePolicy,
}

impl Default for NotificationWindow {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
            policy: MergePolicy::default(),
        }
    }
}

impl NotificationWindow {
    /// Earliest creation time inside the window, inclusive. Saturates at
    /// the earliest representable instant.
    #[must_use]
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.lookback).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Result of one notification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDedupOutcome {
    pub deleted_notifications_count: usize,
}

/// Resolve one group under `policy`.
///
/// Members are walked in canonical order. Under [`MergePolicy::Collapse`]
/// everything after the first member is a duplicate; under
/// [`MergePolicy::WithinThreshold`] a gap wider than `threshold` keeps the
/// later member as the survivor of a new cluster.
#[must_use]
pub fn plan_group<K>(
    group: &DuplicateGroup<K>,
    policy: MergePolicy,
    threshold: TimeDelta,
) -> Resolution {
    let sorted = canonical_order(&group.members);
    let mut resolution = Resolution::default();
    let mut previous: Option<&GroupMember> = None;

    for member in sorted {
        let Some(prev) = previous else {
            resolution.survivors.push(member.id.clone());
            previous = Some(member);
            continue;
        };

        let wide = member.created_at - prev.created_at > threshold;
        if wide {
            resolution.wide_gaps += 1;
        }
        if wide && policy == MergePolicy::WithinThreshold {
            resolution.survivors.push(member.id.clone());
        } else {
            resolution.duplicates.push(member.id.clone());
        }
        previous = Some(member);
    }

    resolution
}

/// Deletes repeated notifications per recipient inside the lookback window.
pub struct NotificationDeduplicator<S> {
    store: S,
    window: NotificationWindow,
    dry_run: bool,
}

impl<S: NotificationStore> NotificationDeduplicator<S> {
    pub fn new(store: S) -> Self {
        Self::with_window(store, NotificationWindow::default())
    }

    pub const fn with_window(store: S, window: NotificationWindow) -> Self {
        Self {
            store,
            window,
            dry_run: false,
        }
    }

    /// Count what would be deleted without deleting it.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub const fn window(&self) -> &NotificationWindow {
        &self.window
    }

    /// Run one pass with `now` as the reference instant.
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError`] raised by the scan or a delete. Groups
    /// processed before the failure stay deleted.
    pub fn run(&self, now: DateTime<Utc>) -> Result<NotificationDedupOutcome, StoreError> {
        let since = self.window.since(now);
        let groups = self.store.query_recent_grouped_by_identity(since)?;

        let mut deleted = 0;
        let mut groups_with_duplicates = 0;
        for mut group in groups {
            let before = group.len();
            group.members.retain(|m| m.created_at >= since);
            if group.len() != before {
                warn!(
                    recipient_id = %group.key.recipient_id,
                    dropped = before - group.len(),
                    %since,
                    "store returned notifications older than the window; ignoring them"
                );
            }
            if !group.has_duplicates() {
                continue;
            }

            let resolution = plan_group(&group, self.window.policy, self.window.merge_threshold);
            if resolution.wide_gaps > 0 && self.window.policy == MergePolicy::Collapse {
                warn!(
                    recipient_id = %group.key.recipient_id,
                    title = %group.key.title,
                    group_size = group.len(),
                    wide_gaps = resolution.wide_gaps,
                    threshold_minutes = self.window.merge_threshold.num_minutes(),
                    "collapsing duplicates spread wider than the merge threshold"
                );
            }
            debug!(
                recipient_id = %group.key.recipient_id,
                group_size = group.len(),
                survivors = resolution.survivors.len(),
                "resolved notification duplicate group"
            );

            deleted += apply_resolution(
                Collection::Notifications,
                &resolution,
                self.dry_run,
                |ids| self.store.delete_by_ids(ids),
            )?;
            groups_with_duplicates += 1;
        }

        info!(
            groups = groups_with_duplicates,
            deleted,
            %since,
            policy = %self.window.policy,
            dry_run = self.dry_run,
            "notification dedup pass complete"
        );
        Ok(NotificationDedupOutcome {
            deleted_notifications_count: deleted,
        })
    }
}
