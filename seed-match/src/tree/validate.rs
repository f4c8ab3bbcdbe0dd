//! Structural invariant checks

use super::{SnapshotTree, TreeError, TreeResult};
use std::collections::HashMap;

impl SnapshotTree {
    /// Check the tree's invariants
    ///
    /// - lineage links are symmetric and reference known snapshots
    /// - every snapshot has at most one child and no cycles
    /// - every active canonical building points at a tip that carries it,
    ///   and no two active canonical buildings share a tip
    /// - every source points at a known snapshot
    pub fn validate(&self) -> TreeResult<()> {
        let fail = |msg: String| Err(TreeError::Inconsistent(msg));

        for snapshot in self.snapshots.values() {
            self.check_organization(snapshot)?;

            if snapshot.children.len() > 1 {
                return fail(format!("snapshot {} has {} children", snapshot.id, snapshot.children.len()));
            }
            for child in &snapshot.children {
                match self.snapshots.get(child) {
                    Some(c) if c.parents.contains(&snapshot.id) => {}
                    _ => return fail(format!("child link {} -> {} is one-sided", snapshot.id, child)),
                }
            }
            for parent in &snapshot.parents {
                match self.snapshots.get(parent) {
                    Some(p) if p.children.contains(&snapshot.id) => {}
                    _ => return fail(format!("parent link {} -> {} is one-sided", snapshot.id, parent)),
                }
            }
            for source in snapshot
                .field_sources
                .values()
                .chain(snapshot.extra_data_sources.values())
            {
                if !self.snapshots.contains_key(source) {
                    return fail(format!("snapshot {} cites unknown source {}", snapshot.id, source));
                }
            }
            if let Some(canonical) = snapshot.canonical_building {
                if !self.canonicals.contains_key(&canonical) {
                    return fail(format!(
                        "snapshot {} references unknown canonical building {}",
                        snapshot.id, canonical
                    ));
                }
            }
            self.tip(snapshot.id)?;
        }

        let mut claimed = HashMap::new();
        for canonical in self.canonicals.values() {
            let Some(tip) = canonical.canonical_snapshot else {
                if canonical.active {
                    return fail(format!("active canonical building {} has no snapshot", canonical.id));
                }
                continue;
            };
            let Some(snapshot) = self.snapshots.get(&tip) else {
                return fail(format!("canonical building {} points at missing snapshot {}", canonical.id, tip));
            };
            if !canonical.active {
                continue;
            }
            if !snapshot.is_tip() {
                return fail(format!("canonical building {} points at non-tip {}", canonical.id, tip));
            }
            if snapshot.canonical_building != Some(canonical.id) {
                return fail(format!(
                    "tip {} of canonical building {} belongs to {:?}",
                    tip, canonical.id, snapshot.canonical_building
                ));
            }
            if let Some(other) = claimed.insert(tip, canonical.id) {
                return fail(format!(
                    "canonical buildings {} and {} share tip {}",
                    other, canonical.id, tip
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::tree_with_canonical_snapshots;
    use super::*;
    use crate::models::MatchType;

    #[test]
    fn test_valid_after_match() {
        let (mut tree, ids) = tree_with_canonical_snapshots(2);
        tree.save_match(ids[0], ids[1], 1.0, None, MatchType::Auto).unwrap();
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_detects_one_sided_link() {
        let (mut tree, ids) = tree_with_canonical_snapshots(2);
        tree.snapshots.get_mut(&ids[0]).unwrap().children.push(ids[1]);
        assert!(matches!(tree.validate(), Err(TreeError::Inconsistent(_))));
    }

    #[test]
    fn test_detects_active_canonical_on_non_tip() {
        let (mut tree, ids) = tree_with_canonical_snapshots(2);
        let canonical = tree.get(ids[1]).unwrap().canonical_building.unwrap();
        tree.save_match(ids[0], ids[1], 1.0, None, MatchType::Auto).unwrap();
        tree.canonicals.get_mut(&canonical).unwrap().active = true;
        assert!(matches!(tree.validate(), Err(TreeError::Inconsistent(_))));
    }
}
