//! Splitting a snapshot back out of its merged lineage

use super::{SnapshotTree, TreeError, TreeResult};
use crate::models::{BuildingField, ExtraData, MatchType, Snapshot};
use seed_common::{CanonicalId, SnapshotId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Result of a successful `unmatch`
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchOutcome {
    /// Merge-created descendants that were removed
    pub deleted: Vec<SnapshotId>,
    /// Snapshots that are tips of their own canonical building again
    pub restored: Vec<SnapshotId>,
    /// Canonical buildings that were inactive (or missing) and now stand alone
    pub reactivated: Vec<CanonicalId>,
    /// Snapshots re-created by replaying downstream merges and edits
    pub replayed: Vec<SnapshotId>,
    /// Tip of the lineage the snapshot was split from
    pub remaining_tip: SnapshotId,
}

/// Downstream step that did not involve the unmatched snapshot
#[derive(Debug, Clone)]
enum Replay {
    Merge {
        other: SnapshotId,
        trunk_first: bool,
        trunk_is_default: bool,
        confidence: Option<f64>,
        match_type: Option<MatchType>,
    },
    Edit {
        fields: BTreeMap<BuildingField, String>,
        extra_data: ExtraData,
    },
}

fn other_parent(node: &Snapshot, known: SnapshotId) -> TreeResult<SnapshotId> {
    node.parents
        .iter()
        .copied()
        .find(|p| *p != known)
        .ok_or_else(|| {
            TreeError::Inconsistent(format!("merge {} has no parent besides {}", node.id, known))
        })
}

impl SnapshotTree {
    /// Undo the match that merged `id` into its child
    ///
    /// Every descendant of `id` is deleted. `id`, the other parent of the
    /// first merge, and the other parents of later merges become tips of their
    /// own (re)activated canonical buildings. Later merges and edits are then
    /// replayed, in order, onto the other parent of the first merge.
    pub fn unmatch(&mut self, id: SnapshotId) -> TreeResult<UnmatchOutcome> {
        let snapshot = self.get(id)?;
        self.check_organization(snapshot)?;
        let first_child = *snapshot
            .children
            .first()
            .ok_or(TreeError::NotMatched(id))?;

        let first_merge = self.get(first_child)?;
        if !first_merge.is_merge() {
            return Err(TreeError::NotMatched(id));
        }
        let sibling = other_parent(first_merge, id)?;

        let mut trunk = vec![first_child];
        let mut current = first_child;
        while let Some(next) = self.get(current)?.children.first().copied() {
            if trunk.len() > self.snapshots.len() {
                return Err(TreeError::Inconsistent(format!(
                    "child cycle below {}",
                    id
                )));
            }
            trunk.push(next);
            current = next;
        }

        let mut replays = Vec::new();
        let mut restored = vec![id, sibling];
        for pair in trunk.windows(2) {
            let (prev, node) = (pair[0], self.get(pair[1])?);
            if node.is_merge() {
                let other = other_parent(node, prev)?;
                let trunk_first = node.parents.first() == Some(&prev);
                let trunk_is_default = node.default_parent.map_or(trunk_first, |d| d == prev);
                restored.push(other);
                replays.push(Replay::Merge {
                    other,
                    trunk_first,
                    trunk_is_default,
                    confidence: node.confidence,
                    match_type: node.match_type,
                });
            } else {
                let fields = node
                    .fields
                    .iter()
                    .filter(|(f, _)| node.field_sources.get(f) == Some(&node.id))
                    .map(|(f, v)| (*f, v.clone()))
                    .collect();
                let extra_data = node
                    .extra_data
                    .iter()
                    .filter(|(k, _)| node.extra_data_sources.get(*k) == Some(&node.id))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                replays.push(Replay::Edit { fields, extra_data });
            }
        }

        // Canonical buildings carried by the trunk, the tip's first
        let trunk_set: BTreeSet<SnapshotId> = trunk.iter().copied().collect();
        let mut trunk_canonicals: Vec<CanonicalId> = Vec::new();
        for node in trunk.iter().rev() {
            if let Some(c) = self.get(*node)?.canonical_building {
                if !trunk_canonicals.contains(&c) {
                    trunk_canonicals.push(c);
                }
            }
        }
        let mut pointing: Vec<CanonicalId> = self
            .canonicals
            .values()
            .filter(|c| c.canonical_snapshot.is_some_and(|s| trunk_set.contains(&s)))
            .map(|c| c.id)
            .collect();
        pointing.sort();
        for c in pointing {
            if !trunk_canonicals.contains(&c) {
                trunk_canonicals.push(c);
            }
        }

        for node in trunk.iter().rev() {
            self.remove_snapshot(*node)?;
        }
        debug!(snapshot = %id, deleted = trunk.len(), "Removed merged descendants");

        let referenced: BTreeSet<CanonicalId> = self
            .snapshots
            .values()
            .filter_map(|s| s.canonical_building)
            .collect();
        let mut orphans: Vec<CanonicalId> = trunk_canonicals
            .into_iter()
            .filter(|c| !referenced.contains(c))
            .collect();
        orphans.reverse();

        let mut reactivated = Vec::new();
        for node in &restored {
            let existing = self
                .get(*node)?
                .canonical_building
                .filter(|c| self.canonicals.contains_key(c));
            let canonical = match existing {
                Some(c) => {
                    if !self.canonical(c)?.active {
                        reactivated.push(c);
                    }
                    c
                }
                None => {
                    let c = match orphans.pop() {
                        Some(c) => c,
                        None => self.create_canonical(*node),
                    };
                    let snapshot = self.get_mut(*node)?;
                    snapshot.canonical_building = Some(c);
                    self.changes.touched_snapshots.insert(*node);
                    reactivated.push(c);
                    c
                }
            };
            self.point_canonical(canonical, *node)?;
        }

        for orphan in orphans {
            debug!(canonical = %orphan, "Removing canonical building left without snapshots");
            self.remove_canonical(orphan);
        }

        let mut replayed = Vec::new();
        let mut tip = sibling;
        for replay in replays {
            tip = match replay {
                Replay::Merge {
                    other,
                    trunk_first,
                    trunk_is_default,
                    confidence,
                    match_type,
                } => {
                    let (first, second) = if trunk_first { (tip, other) } else { (other, tip) };
                    let default = if trunk_is_default { tip } else { other };
                    self.merge_tips(first, second, confidence, Some(default), match_type)?
                        .merged
                }
                Replay::Edit { fields, extra_data } => {
                    self.update_snapshot(tip, fields, extra_data)?
                }
            };
            replayed.push(tip);
        }

        info!(
            snapshot = %id,
            deleted = trunk.len(),
            reactivated = reactivated.len(),
            replayed = replayed.len(),
            "Unmatched snapshot"
        );

        Ok(UnmatchOutcome {
            deleted: trunk,
            restored,
            reactivated,
            replayed,
            remaining_tip: tip,
        })
    }
}
