//! Extra-data merging with source attribution

use super::{pick, Pick};
use crate::models::{ExtraData, Snapshot};
use seed_common::values::is_blank_value;
use seed_common::SnapshotId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Merge the extra data of two snapshots
///
/// For every key in either snapshot the first snapshot's value is kept unless
/// it is blank, in which case the second's is used. Both blank keeps the
/// first's blank value, attributed to the first snapshot. Keys held by one
/// snapshot only pass through attributed to that snapshot.
///
/// Returns the merged data and a key → contributing snapshot map.
pub fn merge_extra_data(
    first: &Snapshot,
    second: &Snapshot,
) -> (ExtraData, BTreeMap<String, SnapshotId>) {
    let keys: BTreeSet<&String> = first
        .extra_data
        .keys()
        .chain(second.extra_data.keys())
        .collect();

    let mut merged = ExtraData::new();
    let mut sources = BTreeMap::new();

    for key in keys {
        let chosen = pick(
            first.extra_data.get(key),
            second.extra_data.get(key),
            is_blank_value,
        );
        if let Some((value, from)) = chosen {
            let source = match from {
                Pick::Preferred => first.id,
                Pick::Other => second.id,
            };
            merged.insert(key.clone(), value.clone());
            sources.insert(key.clone(), source);
        }
    }

    debug!(
        first = %first.id,
        second = %second.id,
        keys = merged.len(),
        "Merged extra data"
    );

    (merged, sources)
}
