//! Duplicate resolution: which member of a group survives, which are deleted.
//!
//! The canonical survivor of a group is its oldest member; ties on creation
//! time go to the smallest id so repeated runs always pick the same record.

pub mod campaign;
pub mod notification;

pub use campaign::{CampaignDedupOutcome, CampaignDeduplicator};
pub use notification::{NotificationDedupOutcome, NotificationDeduplicator, NotificationWindow};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::{Collection, DuplicateGroup, GroupMember, RecordId};
use crate::store::StoreError;

/// How notification duplicates spread over time are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Keep only the oldest record of the group, whatever the gaps between
    /// members. Gaps wider than the merge threshold are logged.
    #[default]
    Collapse,
    /// Merge a record into its predecessor only when the gap between them is
    /// at most the merge threshold; a wider gap starts a new survivor.
    WithinThreshold,
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collapse => f.write_str("collapse"),
            Self::WithinThreshold => f.write_str("within-threshold"),
        }
    }
}

/// Error returned when parsing an unknown merge policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown merge policy '{0}': expected one of collapse, within-threshold")]
pub struct ParseMergePolicyError(String);

impl FromStr for MergePolicy {
    type Err = ParseMergePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collapse" => Ok(Self::Collapse),
            "within-threshold" | "within_threshold" | "windowed" => Ok(Self::WithinThreshold),
            other => Err(ParseMergePolicyError(other.to_string())),
        }
    }
}

/// Outcome of resolving one duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Records kept, oldest first. Never empty for a non-empty group.
    pub survivors: Vec<RecordId>,
    /// Records to delete, in canonical order.
    pub duplicates: Vec<RecordId>,
    /// Consecutive pairs whose gap exceeded the merge threshold.
    pub wide_gaps: usize,
}

/// Members sorted oldest-first, ties broken by id.
#[must_use]
pub fn canonical_order(members: &[GroupMember]) -> Vec<&GroupMember> {
    let mut sorted: Vec<&GroupMember> = members.iter().collect();
    sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    sorted
}

/// Keep the canonical survivor and mark every other member for deletion.
#[must_use]
pub fn collapse<K>(group: &DuplicateGroup<K>) -> Resolution {
    let sorted = canonical_order(&group.members);
    let mut members = sorted.into_iter().map(|m| m.id.clone());
    Resolution {
        survivors: members.next().into_iter().collect(),
        duplicates: members.collect(),
        wide_gaps: 0,
    }
}

/// Delete one group's duplicates (unless `dry_run`) and return the number of
/// records the group gives up.
///
/// The returned count is the planned count, `duplicates.len()`. A store that
/// reports fewer rows removed (someone else deleted them first) is logged but
/// does not change the count.
pub(crate) fn apply_resolution(
    collection: Collection,
    resolution: &Resolution,
    dry_run: bool,
    delete: impl FnOnce(&[RecordId]) -> Result<usize, StoreError>,
) -> Result<usize, StoreError> {
    let planned = resolution.duplicates.len();
    if planned == 0 || dry_run {
        return Ok(planned);
    }

    let removed = delete(&resolution.duplicates)?;
    if removed != planned {
        tracing::warn!(
            %collection,
            planned,
            removed,
            "store removed a different number of duplicates than planned"
        );
    }
    Ok(planned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600 + secs, 0).expect("valid timestamp")
    }

    #[test]
    fn collapse_keeps_oldest_member() {
        let group = DuplicateGroup::new(
            "k",
            vec![
                GroupMember::new("t2", at(20)),
                GroupMember::new("t0", at(0)),
                GroupMember::new("t1", at(10)),
            ],
        );

        let resolution = collapse(&group);
        assert_eq!(resolution.survivors, vec!["t0"]);
        assert_eq!(resolution.duplicates, vec!["t1", "t2"]);
    }

    #[test]
    fn ties_go_to_smallest_id() {
        let group = DuplicateGroup::new(
            "k",
            vec![GroupMember::new("b", at(0)), GroupMember::new("a", at(0))],
        );

        assert_eq!(collapse(&group).survivors, vec!["a"]);
    }

    #[test]
    fn singleton_and_empty_groups_delete_nothing() {
        let single = DuplicateGroup::new("k", vec![GroupMember::new("only", at(0))]);
        let resolution = collapse(&single);
        assert_eq!(resolution.survivors, vec!["only"]);
        assert!(resolution.duplicates.is_empty());

        let empty: DuplicateGroup<&str> = DuplicateGroup::new("k", Vec::new());
        assert_eq!(collapse(&empty), Resolution::default());
    }

    #[test]
    fn merge_policy_parses_aliases() {
        assert_eq!("collapse".parse::<MergePolicy>(), Ok(MergePolicy::Collapse));
        assert_eq!(
            " Within-Threshold ".parse::<MergePolicy>(),
            Ok(MergePolicy::WithinThreshold)
        );
        assert_eq!("windowed".parse::<MergePolicy>(), Ok(MergePolicy::WithinThreshold));
        assert!("sometimes".parse::<MergePolicy>().is_err());
        assert_eq!(MergePolicy::WithinThreshold.to_string(), "within-threshold");
    }

    #[test]
    fn dry_run_skips_the_delete_call() {
        let resolution = Resolution {
            survivors: vec!["a".into()],
            duplicates: vec!["b".into(), "c".into()],
            wide_gaps: 0,
        };

        let planned = apply_resolution(Collection::Campaigns, &resolution, true, |_| {
            panic!("dry run must not delete")
        })
        .expect("dry run");
        assert_eq!(planned, 2);
    }

    #[test]
    fn short_delete_still_reports_planned_count() {
        let resolution = Resolution {
            survivors: vec!["a".into()],
            duplicates: vec!["b".into(), "c".into()],
            wide_gaps: 0,
        };

        let planned =
            apply_resolution(Collection::Notifications, &resolution, false, |ids| Ok(ids.len() - 1))
                .expect("apply");
        assert_eq!(planned, 2);
    }
}
