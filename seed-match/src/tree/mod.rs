//! Canonical snapshot tree
//!
//! In-memory view of one organization's snapshot DAG and canonical buildings.
//! Operations (`save_match`, `unmatch`, `update_snapshot`) mutate the tree and
//! record what they touched in a [`ChangeSet`], which the repository writes
//! back inside the same transaction the tree was loaded in.
//!
//! The tree is plain data. It performs no I/O.

mod lineage;
mod matching;
mod unmatch;
mod validate;

pub use matching::MatchOutcome;
pub use unmatch::UnmatchOutcome;

use crate::models::{CanonicalBuilding, Snapshot};
use seed_common::{CanonicalId, OrganizationId, SnapshotId};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors raised by tree operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreeError {
    #[error("Unknown snapshot: {0}")]
    UnknownSnapshot(SnapshotId),

    #[error("Unknown canonical building: {0}")]
    UnknownCanonical(CanonicalId),

    #[error("Snapshot {0} is not a tip (it already has children)")]
    NotATip(SnapshotId),

    #[error("Cannot match snapshot {0} with itself")]
    SameSnapshot(SnapshotId),

    #[error("Snapshot {snapshot} belongs to organization {found}, expected {expected}")]
    OrganizationMismatch {
        snapshot: SnapshotId,
        expected: OrganizationId,
        found: OrganizationId,
    },

    #[error("Snapshots {first} and {second} already share canonical building {canonical}")]
    AlreadyMatched {
        first: SnapshotId,
        second: SnapshotId,
        canonical: CanonicalId,
    },

    #[error("Snapshot {0} has not been matched")]
    NotMatched(SnapshotId),

    #[error("Default snapshot {0} is not one of the matched snapshots")]
    InvalidDefault(SnapshotId),

    #[error("Confidence {0} is outside [0, 1]")]
    InvalidConfidence(f64),

    #[error("Snapshot {0} already exists")]
    DuplicateSnapshot(SnapshotId),

    #[error("Tree is inconsistent: {0}")]
    Inconsistent(String),
}

pub type TreeResult<T> = Result<T, TreeError>;

/// Rows touched by tree operations since the last [`SnapshotTree::take_changes`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Created or modified snapshots (lineage, sources or canonical link)
    pub touched_snapshots: BTreeSet<SnapshotId>,
    pub deleted_snapshots: BTreeSet<SnapshotId>,
    pub touched_canonicals: BTreeSet<CanonicalId>,
    pub deleted_canonicals: BTreeSet<CanonicalId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.touched_snapshots.is_empty()
            && self.deleted_snapshots.is_empty()
            && self.touched_canonicals.is_empty()
            && self.deleted_canonicals.is_empty()
    }
}

/// Snapshot DAG plus canonical buildings of one organization
#[derive(Debug, Clone)]
pub struct SnapshotTree {
    organization_id: OrganizationId,
    snapshots: HashMap<SnapshotId, Snapshot>,
    canonicals: HashMap<CanonicalId, CanonicalBuilding>,
    changes: ChangeSet,
}

impl SnapshotTree {
    pub fn new(organization_id: OrganizationId) -> Self {
        Self {
            organization_id,
            snapshots: HashMap::new(),
            canonicals: HashMap::new(),
            changes: ChangeSet::default(),
        }
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    /// Insert a stored snapshot without recording a change (used when loading)
    pub fn insert(&mut self, snapshot: Snapshot) {
        self.snapshots.insert(snapshot.id, snapshot);
    }

    /// Insert a stored canonical building without recording a change
    pub fn insert_canonical(&mut self, canonical: CanonicalBuilding) {
        self.canonicals.insert(canonical.id, canonical);
    }

    /// Add a freshly created root snapshot
    pub fn add_snapshot(&mut self, snapshot: Snapshot) -> TreeResult<SnapshotId> {
        self.check_organization(&snapshot)?;
        if self.snapshots.contains_key(&snapshot.id) {
            return Err(TreeError::DuplicateSnapshot(snapshot.id));
        }
        if !snapshot.parents.is_empty() || !snapshot.children.is_empty() {
            return Err(TreeError::Inconsistent(format!(
                "new snapshot {} must not carry lineage",
                snapshot.id
            )));
        }
        let id = snapshot.id;
        self.snapshots.insert(id, snapshot);
        self.changes.touched_snapshots.insert(id);
        Ok(id)
    }

    /// Give a snapshot its own new canonical building pointing at it
    pub fn assign_canonical(&mut self, id: SnapshotId) -> TreeResult<CanonicalId> {
        let canonical_id = self.create_canonical(id);
        let snapshot = self.get_mut(id)?;
        snapshot.canonical_building = Some(canonical_id);
        self.changes.touched_snapshots.insert(id);
        Ok(canonical_id)
    }

    pub fn get(&self, id: SnapshotId) -> TreeResult<&Snapshot> {
        self.snapshots.get(&id).ok_or(TreeError::UnknownSnapshot(id))
    }

    pub fn canonical(&self, id: CanonicalId) -> TreeResult<&CanonicalBuilding> {
        self.canonicals.get(&id).ok_or(TreeError::UnknownCanonical(id))
    }

    pub fn contains(&self, id: SnapshotId) -> bool {
        self.snapshots.contains_key(&id)
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.values()
    }

    pub fn canonicals(&self) -> impl Iterator<Item = &CanonicalBuilding> {
        self.canonicals.values()
    }

    /// Tip snapshots of all active canonical buildings, oldest first
    pub fn active_tips(&self) -> Vec<&Snapshot> {
        let mut tips: Vec<&Snapshot> = self
            .canonicals
            .values()
            .filter(|c| c.active)
            .filter_map(|c| c.canonical_snapshot)
            .filter_map(|id| self.snapshots.get(&id))
            .collect();
        tips.sort_by_key(|s| (s.created_at, s.id));
        tips
    }

    /// Changes recorded so far
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Drain the recorded changes
    pub fn take_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.changes)
    }

    fn get_mut(&mut self, id: SnapshotId) -> TreeResult<&mut Snapshot> {
        self.snapshots
            .get_mut(&id)
            .ok_or(TreeError::UnknownSnapshot(id))
    }

    fn canonical_mut(&mut self, id: CanonicalId) -> TreeResult<&mut CanonicalBuilding> {
        self.canonicals
            .get_mut(&id)
            .ok_or(TreeError::UnknownCanonical(id))
    }

    fn create_canonical(&mut self, snapshot: SnapshotId) -> CanonicalId {
        let mut canonical = CanonicalBuilding::new(self.organization_id);
        canonical.canonical_snapshot = Some(snapshot);
        let id = canonical.id;
        self.canonicals.insert(id, canonical);
        self.changes.touched_canonicals.insert(id);
        id
    }

    /// Point a canonical building at `snapshot` and (re)activate it
    fn point_canonical(&mut self, canonical: CanonicalId, snapshot: SnapshotId) -> TreeResult<()> {
        let entry = self.canonical_mut(canonical)?;
        entry.canonical_snapshot = Some(snapshot);
        entry.active = true;
        self.changes.touched_canonicals.insert(canonical);
        Ok(())
    }

    fn deactivate_canonical(&mut self, canonical: CanonicalId) -> TreeResult<()> {
        self.canonical_mut(canonical)?.active = false;
        self.changes.touched_canonicals.insert(canonical);
        Ok(())
    }

    fn check_organization(&self, snapshot: &Snapshot) -> TreeResult<()> {
        if snapshot.organization_id != self.organization_id {
            return Err(TreeError::OrganizationMismatch {
                snapshot: snapshot.id,
                expected: self.organization_id,
                found: snapshot.organization_id,
            });
        }
        Ok(())
    }

    /// Attach a new child snapshot to its (already set) parents
    fn attach_child(&mut self, child: Snapshot) -> TreeResult<SnapshotId> {
        let id = child.id;
        for parent in child.parents.clone() {
            self.get_mut(parent)?.children.push(id);
            self.changes.touched_snapshots.insert(parent);
        }
        self.snapshots.insert(id, child);
        self.changes.touched_snapshots.insert(id);
        Ok(id)
    }

    /// Remove a snapshot and unlink it from its surviving parents
    fn remove_snapshot(&mut self, id: SnapshotId) -> TreeResult<Snapshot> {
        let removed = self
            .snapshots
            .remove(&id)
            .ok_or(TreeError::UnknownSnapshot(id))?;
        for parent in &removed.parents {
            if let Some(p) = self.snapshots.get_mut(parent) {
                p.children.retain(|c| *c != id);
                self.changes.touched_snapshots.insert(*parent);
            }
        }
        for child in &removed.children {
            if let Some(c) = self.snapshots.get_mut(child) {
                c.parents.retain(|p| *p != id);
            }
        }
        self.changes.touched_snapshots.remove(&id);
        self.changes.deleted_snapshots.insert(id);
        Ok(removed)
    }

    fn remove_canonical(&mut self, id: CanonicalId) {
        if self.canonicals.remove(&id).is_some() {
            self.changes.touched_canonicals.remove(&id);
            self.changes.deleted_canonicals.insert(id);
        }
    }
}
