//! Lineage queries over the snapshot DAG

use super::{SnapshotTree, TreeError, TreeResult};
use seed_common::values::{is_blank_str, is_blank_value};
use seed_common::SnapshotId;
use std::collections::HashSet;

impl SnapshotTree {
    /// Terminal snapshot reached by following children from `id`
    pub fn tip(&self, id: SnapshotId) -> TreeResult<SnapshotId> {
        let mut current = self.get(id)?;
        let mut steps = 0;
        while let Some(child) = current.children.first() {
            steps += 1;
            if steps > self.snapshots.len() {
                return Err(TreeError::Inconsistent(format!(
                    "child cycle reachable from {}",
                    id
                )));
            }
            current = self.get(*child)?;
        }
        Ok(current.id)
    }

    /// Descendants of `id` in child order, each listed once
    ///
    /// Empty for a tip.
    pub fn child_tree(&self, id: SnapshotId) -> TreeResult<Vec<SnapshotId>> {
        let mut tree = Vec::new();
        let mut seen = HashSet::new();
        let mut queue: std::collections::VecDeque<SnapshotId> =
            self.get(id)?.children.iter().copied().collect();

        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            tree.push(next);
            queue.extend(self.get(next)?.children.iter().copied());
        }
        Ok(tree)
    }

    /// Ancestors of `id`, oldest first, each listed once
    ///
    /// Empty for a root.
    pub fn parent_tree(&self, id: SnapshotId) -> TreeResult<Vec<SnapshotId>> {
        let mut tree = Vec::new();
        let mut seen = HashSet::new();
        self.collect_ancestors(id, &mut seen, &mut tree)?;
        Ok(tree)
    }

    fn collect_ancestors(
        &self,
        id: SnapshotId,
        seen: &mut HashSet<SnapshotId>,
        tree: &mut Vec<SnapshotId>,
    ) -> TreeResult<()> {
        for parent in &self.get(id)?.parents {
            if !seen.insert(*parent) {
                continue;
            }
            self.collect_ancestors(*parent, seen, tree)?;
            tree.push(*parent);
        }
        Ok(())
    }

    /// Attribute every populated value of a freshly imported snapshot to itself
    pub fn set_initial_sources(&mut self, id: SnapshotId) -> TreeResult<()> {
        let snapshot = self.get_mut(id)?;
        let own = snapshot.id;

        snapshot.field_sources = snapshot
            .fields
            .iter()
            .filter(|(_, v)| !is_blank_str(v))
            .map(|(field, _)| (*field, own))
            .collect();
        snapshot.extra_data_sources = snapshot
            .extra_data
            .iter()
            .filter(|(_, v)| !is_blank_value(v))
            .map(|(key, _)| (key.clone(), own))
            .collect();

        self.changes.touched_snapshots.insert(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::tree_with_canonical_snapshots;
    use super::*;
    use crate::models::{BuildingField, Snapshot, SourceType};
    use serde_json::json;

    /// bs1 → bs3 → bs4 → bs5 as a plain edit chain
    fn chain() -> (SnapshotTree, Vec<SnapshotId>) {
        let (mut tree, ids) = tree_with_canonical_snapshots(5);
        for (parent, child) in [(0, 2), (2, 3), (3, 4)] {
            let (p, c) = (ids[parent], ids[child]);
            tree.snapshots.get_mut(&p).unwrap().children.push(c);
            tree.snapshots.get_mut(&c).unwrap().parents.push(p);
        }
        (tree, ids)
    }

    #[test]
    fn test_child_tree() {
        let (tree, ids) = chain();
        assert_eq!(tree.child_tree(ids[0]).unwrap(), vec![ids[2], ids[3], ids[4]]);
        assert!(tree.child_tree(ids[4]).unwrap().is_empty());
    }

    #[test]
    fn test_parent_tree() {
        let (tree, ids) = chain();
        assert_eq!(tree.parent_tree(ids[4]).unwrap(), vec![ids[0], ids[2], ids[3]]);
        assert!(tree.parent_tree(ids[0]).unwrap().is_empty());
    }

    #[test]
    fn test_tip() {
        let (tree, ids) = chain();
        assert_eq!(tree.tip(ids[0]).unwrap(), ids[4]);
        assert_eq!(tree.tip(ids[4]).unwrap(), ids[4]);
        assert_eq!(tree.tip(ids[1]).unwrap(), ids[1]);
        assert!(matches!(
            tree.tip(SnapshotId::new()),
            Err(TreeError::UnknownSnapshot(_))
        ));
    }

    #[test]
    fn test_tip_detects_cycle() {
        let (mut tree, ids) = chain();
        tree.snapshots.get_mut(&ids[4]).unwrap().children.push(ids[0]);
        assert!(matches!(tree.tip(ids[0]), Err(TreeError::Inconsistent(_))));
    }

    #[test]
    fn test_initial_sources_skip_blank_values() {
        let org = seed_common::OrganizationId::new();
        let mut tree = SnapshotTree::new(org);
        let snapshot = Snapshot::new(org, SourceType::Portfolio)
            .with_field(BuildingField::PmPropertyId, "2264")
            .with_field(BuildingField::AddressLine2, "")
            .with_extra("Year Built", json!("1803"))
            .with_extra("Notes", json!(null));
        let id = tree.add_snapshot(snapshot).unwrap();

        tree.set_initial_sources(id).unwrap();

        let snapshot = tree.get(id).unwrap();
        assert_eq!(snapshot.field_sources.get(&BuildingField::PmPropertyId), Some(&id));
        assert!(!snapshot.field_sources.contains_key(&BuildingField::AddressLine2));
        assert_eq!(snapshot.extra_data_sources.get("Year Built"), Some(&id));
        assert!(!snapshot.extra_data_sources.contains_key("Notes"));
    }
}
