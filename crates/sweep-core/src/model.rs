//! Record identities and duplicate groups.
//!
//! A record's *identity key* is the tuple of fields whose equality defines
//! "the same logical campaign/notification". Everything else about a record
//! (its id and creation time) only matters for picking the canonical survivor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned record identifier.
pub type RecordId = String;

/// The two collections the cleanup engine operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Campaigns,
    Notifications,
}

impl Collection {
    /// Singular noun used in log lines and error messages.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Campaigns => "campaign",
            Self::Notifications => "notification",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Campaigns => f.write_str("campaigns"),
            Self::Notifications => f.write_str("notifications"),
        }
    }
}

/// Identity of a broadcast campaign: same content sent to the same target.
///
/// `class_id`/`class_number` are absent for campaigns addressed to everyone;
/// two absent values compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CampaignKey {
    pub title: String,
    pub body: String,
    pub notification_type: String,
    pub class_id: Option<String>,
    pub class_number: Option<i64>,
}

/// Identity of a single inbox entry: same content delivered to the same user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NotificationKey {
    pub recipient_id: String,
    pub title: String,
    pub body: String,
    pub notification_type: String,
}

/// A persisted campaign row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: RecordId,
    pub key: CampaignKey,
    pub created_at: DateTime<Utc>,
}

/// A persisted per-recipient notification row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: RecordId,
    pub key: NotificationKey,
    pub created_at: DateTime<Utc>,
}

/// One record inside a [`DuplicateGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
}

impl GroupMember {
    #[must_use]
    pub fn new(id: impl Into<RecordId>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
        }
    }
}

/// All records sharing one identity key, as returned by a store scan.
///
/// Members arrive in store order; callers must not assume they are sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup<K> {
    pub key: K,
    pub members: Vec<GroupMember>,
}

impl<K> DuplicateGroup<K> {
    #[must_use]
    pub const fn new(key: K, members: Vec<GroupMember>) -> Self {
        Self { key, members }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// A group only needs work when more than one record shares the key.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.members.len() > 1
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.members.iter().map(|m| m.id.as_str())
    }

    pub fn created_ats(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.members.iter().map(|m| m.created_at)
    }
}
