//! One full cleanup run: campaigns first, then notifications.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::CleanupConfig;
use crate::dedup::{CampaignDeduplicator, MergePolicy, NotificationDeduplicator, NotificationWindow};
use crate::error::CleanupError;
use crate::lock::{CLEANUP_OPERATION, OperationLock};
use crate::store::{CampaignStore, NotificationStore};

/// Tunables for a cleanup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupOptions {
    pub lookback: TimeDelta,
    pub merge_threshold: TimeDelta,
    pub merge_policy: MergePolicy,
    pub dry_run: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self::from(&CleanupConfig::default())
    }
}

impl From<&CleanupConfig> for CleanupOptions {
    fn from(cfg: &CleanupConfig) -> Self {
        Self {
            lookback: cfg.lookback(),
            merge_threshold: cfg.merge_threshold(),
            merge_policy: cfg.merge_policy,
            dry_run: false,
        }
    }
}

impl CleanupOptions {
    const fn window(&self) -> NotificationWindow {
        NotificationWindow {
            lookback: self.lookback,
            merge_threshold: self.merge_threshold,
            policy: self.merge_policy,
        }
    }
}

/// Summary of a successful run. Failed runs produce a [`CleanupError`]
/// instead; there is no partial-success report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub success: bool,
    pub message: String,
    pub deleted_campaigns: usize,
    pub deleted_notifications: usize,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

impl CleanupReport {
    fn new(deleted_campaigns: usize, deleted_notifications: usize, dry_run: bool) -> Self {
        let verb = if dry_run { "Would remove" } else { "Removed" };
        Self {
            success: true,
            message: format!(
                "{verb} {deleted_campaigns} duplicate campaign(s) and \
                 {deleted_notifications} duplicate notification(s)"
            ),
            deleted_campaigns,
            deleted_notifications,
            dry_run,
        }
    }

    #[must_use]
    pub const fn total_deleted(&self) -> usize {
        self.deleted_campaigns + self.deleted_notifications
    }
}

/// Runs both deduplicators in sequence and reports the combined counts.
pub struct CleanupReporter<C, N> {
    campaigns: C,
    notifications: N,
    options: CleanupOptions,
}

impl<C: CampaignStore, N: NotificationStore> CleanupReporter<C, N> {
    pub const fn new(campaigns: C, notifications: N, options: CleanupOptions) -> Self {
        Self {
            campaigns,
            notifications,
            options,
        }
    }

    /// Run one cleanup pass without taking the operation lock.
    ///
    /// Callers that may race another run should use
    /// [`CleanupReporter::run_exclusive`].
    ///
    /// # Errors
    ///
    /// Returns the first store failure. Deletions committed before it stay.
    pub fn run(&self, now: DateTime<Utc>) -> Result<CleanupReport, CleanupError> {
        let campaigns = CampaignDeduplicator::new(&self.campaigns)
            .with_dry_run(self.options.dry_run)
            .run()?;
        let notifications =
            NotificationDeduplicator::with_window(&self.notifications, self.options.window())
                .with_dry_run(self.options.dry_run)
                .run(now)?;

        let report = CleanupReport::new(
            campaigns.deleted_campaigns_count,
            notifications.deleted_notifications_count,
            self.options.dry_run,
        );
        info!(
            deleted_campaigns = report.deleted_campaigns,
            deleted_notifications = report.deleted_notifications,
            dry_run = report.dry_run,
            "cleanup complete"
        );
        Ok(report)
    }

    /// Run one cleanup pass while holding the `cleanup` lock under
    /// `locks_dir`, waiting at most `timeout` for it.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::Lock`] if the lock is held elsewhere for the
    /// whole wait, otherwise the same errors as [`CleanupReporter::run`].
    pub fn run_exclusive(
        &self,
        locks_dir: &Path,
        timeout: Duration,
        now: DateTime<Utc>,
    ) -> Result<CleanupReport, CleanupError> {
        let _guard = OperationLock::for_operation(locks_dir, CLEANUP_OPERATION, timeout)?;
        self.run(now)
    }
}
