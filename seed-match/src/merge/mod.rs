//! Provenance-aware merging of two snapshots
//!
//! The same rule applies to scalar fields and extra data: the preferred
//! snapshot's value wins unless it is blank, in which case the other
//! snapshot's value is used. Each chosen value is attributed to the snapshot
//! that supplied it.

pub mod extra_data;
pub mod fields;

pub use extra_data::merge_extra_data;
pub use fields::merge_fields;

use crate::models::{BuildingField, ExtraData, Snapshot};
use seed_common::SnapshotId;
use std::collections::BTreeMap;

/// Which input supplied a merged value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pick {
    Preferred,
    Other,
}

/// Choose between the preferred and the other value of one key
///
/// Returns `None` only when neither side has the key. When both are blank the
/// preferred side's blank value is kept.
pub(crate) fn pick<'a, V>(
    preferred: Option<&'a V>,
    other: Option<&'a V>,
    is_blank: impl Fn(&V) -> bool,
) -> Option<(&'a V, Pick)> {
    match (preferred, other) {
        (Some(p), Some(o)) => {
            if !is_blank(p) {
                Some((p, Pick::Preferred))
            } else if !is_blank(o) {
                Some((o, Pick::Other))
            } else {
                Some((p, Pick::Preferred))
            }
        }
        (Some(p), None) => Some((p, Pick::Preferred)),
        (None, Some(o)) => Some((o, Pick::Other)),
        (None, None) => None,
    }
}

/// Complete merge result for a new child snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub fields: BTreeMap<BuildingField, String>,
    pub field_sources: BTreeMap<BuildingField, SnapshotId>,
    pub extra_data: ExtraData,
    pub extra_data_sources: BTreeMap<String, SnapshotId>,
}

/// Merge scalar fields and extra data, preferring `preferred`
pub fn merge_snapshots(preferred: &Snapshot, other: &Snapshot) -> MergeOutcome {
    let (fields, field_sources) = merge_fields(preferred, other);
    let (extra_data, extra_data_sources) = merge_extra_data(preferred, other);
    MergeOutcome {
        fields,
        field_sources,
        extra_data,
        extra_data_sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(s: &&str) -> bool {
        s.trim().is_empty()
    }

    #[test]
    fn test_pick_rules() {
        assert_eq!(pick(Some(&"a"), Some(&"b"), blank), Some((&"a", Pick::Preferred)));
        assert_eq!(pick(Some(&""), Some(&"b"), blank), Some((&"b", Pick::Other)));
        assert_eq!(pick(Some(&""), Some(&" "), blank), Some((&"", Pick::Preferred)));
        assert_eq!(pick(None, Some(&""), blank), Some((&"", Pick::Other)));
        assert_eq!(pick::<&str>(None, None, blank), None);
    }
}
