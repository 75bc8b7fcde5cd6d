//! Store collaborator seams.
//!
//! The cleanup engine never talks to a database directly. It asks a store for
//! records grouped by identity key and hands back id sets to delete. The
//! SQLite implementations live in [`crate::db`]; tests substitute fakes.

use chrono::{DateTime, Utc};

use crate::error::ErrorCode;
use crate::model::{CampaignKey, Collection, DuplicateGroup, NotificationKey, RecordId};

/// Boxed backend error carried inside [`StoreError`].
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures raised by store collaborators.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Grouping scan failed.
    #[error("{}: failed to scan {collection} for duplicates: {source}", ErrorCode::StoreQueryFailed.code())]
    Query {
        collection: Collection,
        #[source]
        source: BackendError,
    },

    /// Bulk delete for one group failed; nothing from that group was removed.
    #[error(
        "{}: failed to delete {count} {} record(s): {source}",
        ErrorCode::StoreDeleteFailed.code(),
        .collection.noun()
    )]
    Delete {
        collection: Collection,
        count: usize,
        #[source]
        source: BackendError,
    },
}

impl StoreError {
    pub fn query(collection: Collection, source: impl Into<BackendError>) -> Self {
        Self::Query {
            collection,
            source: source.into(),
        }
    }

    pub fn delete(collection: Collection, count: usize, source: impl Into<BackendError>) -> Self {
        Self::Delete {
            collection,
            count,
            source: source.into(),
        }
    }

    /// Machine-readable code associated with this store error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Query { .. } => ErrorCode::StoreQueryFailed,
            Self::Delete { .. } => ErrorCode::StoreDeleteFailed,
        }
    }

    #[must_use]
    pub const fn collection(&self) -> Collection {
        match self {
            Self::Query { collection, .. } | Self::Delete { collection, .. } => *collection,
        }
    }
}

/// Campaign collection: unbounded history, grouped by content and target.
pub trait CampaignStore {
    /// Return every identity group in the collection.
    ///
    /// Implementations may omit or include singleton groups.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] when the scan fails.
    fn query_grouped_by_identity(&self) -> Result<Vec<DuplicateGroup<CampaignKey>>, StoreError>;

    /// Delete the given ids as one atomic operation and return how many rows
    /// were removed. Ids that no longer exist are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Delete`] when the delete fails.
    fn delete_by_ids(&self, ids: &[RecordId]) -> Result<usize, StoreError>;
}

/// Per-recipient notification collection, scanned over a recent window.
pub trait NotificationStore {
    /// Return identity groups built only from records with
    /// `created_at >= since`. Older records must not appear in any group.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] when the scan fails.
    fn query_recent_grouped_by_identity(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DuplicateGroup<NotificationKey>>, StoreError>;

    /// Delete the given ids as one atomic operation and return how many rows
    /// were removed. Ids that no longer exist are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Delete`] when the delete fails.
    fn delete_by_ids(&self, ids: &[RecordId]) -> Result<usize, StoreError>;
}

impl<T: CampaignStore + ?Sized> CampaignStore for &T {
    fn query_grouped_by_identity(&self) -> Result<Vec<DuplicateGroup<CampaignKey>>, StoreError> {
        (**self).query_grouped_by_identity()
    }

    fn delete_by_ids(&self, ids: &[RecordId]) -> Result<usize, StoreError> {
        (**self).delete_by_ids(ids)
    }
}

impl<T: NotificationStore + ?Sized> NotificationStore for &T {
    fn query_recent_grouped_by_identity(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<DuplicateGroup<NotificationKey>>, StoreError> {
        (**self).query_recent_grouped_by_identity(since)
    }

    fn delete_by_ids(&self, ids: &[RecordId]) -> Result<usize, StoreError> {
        (**self).delete_by_ids(ids)
    }
}
