//! Match and edit operations

use super::{SnapshotTree, TreeError, TreeResult};
use crate::merge::merge_snapshots;
use crate::models::{BuildingField, ExtraData, MatchType, Snapshot, SourceType};
use seed_common::{CanonicalId, SnapshotId};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Result of a successful `save_match`
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// New merge child, now the tip of the surviving canonical building
    pub merged: SnapshotId,
    pub canonical_building: CanonicalId,
    /// Canonical building of the second snapshot, now inactive
    pub deactivated: Option<CanonicalId>,
}

impl SnapshotTree {
    /// Merge two tips into a new child snapshot
    ///
    /// The child's parents are `[first, second]`. Field values prefer
    /// `default` (which must be one of the two and defaults to `first`) unless
    /// blank. `first`'s canonical building survives, created if missing, and
    /// points at the child; `second`'s canonical building becomes inactive.
    pub fn save_match(
        &mut self,
        first: SnapshotId,
        second: SnapshotId,
        confidence: f64,
        default: Option<SnapshotId>,
        match_type: MatchType,
    ) -> TreeResult<MatchOutcome> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(TreeError::InvalidConfidence(confidence));
        }
        self.merge_tips(first, second, Some(confidence), default, Some(match_type))
    }

    /// Shared by `save_match` and unmatch replay
    pub(super) fn merge_tips(
        &mut self,
        first: SnapshotId,
        second: SnapshotId,
        confidence: Option<f64>,
        default: Option<SnapshotId>,
        match_type: Option<MatchType>,
    ) -> TreeResult<MatchOutcome> {
        if first == second {
            return Err(TreeError::SameSnapshot(first));
        }

        let a = self.get(first)?;
        let b = self.get(second)?;
        self.check_organization(a)?;
        self.check_organization(b)?;
        for snapshot in [a, b] {
            if !snapshot.is_tip() {
                return Err(TreeError::NotATip(snapshot.id));
            }
        }
        if let (Some(ca), Some(cb)) = (a.canonical_building, b.canonical_building) {
            if ca == cb {
                return Err(TreeError::AlreadyMatched {
                    first,
                    second,
                    canonical: ca,
                });
            }
        }

        let default = default.unwrap_or(first);
        let (preferred, other) = if default == first {
            (a, b)
        } else if default == second {
            (b, a)
        } else {
            return Err(TreeError::InvalidDefault(default));
        };

        let merged = merge_snapshots(preferred, other);
        let surviving = a.canonical_building;
        let losing = b.canonical_building;

        let mut child = Snapshot::new(self.organization_id, SourceType::Composite);
        child.fields = merged.fields;
        child.field_sources = merged.field_sources;
        child.extra_data = merged.extra_data;
        child.extra_data_sources = merged.extra_data_sources;
        child.parents = vec![first, second];
        child.confidence = confidence;
        child.match_type = match_type;
        child.default_parent = Some(default);
        let child_id = child.id;

        let canonical = match surviving {
            Some(id) => {
                self.point_canonical(id, child_id)?;
                id
            }
            None => self.create_canonical(child_id),
        };
        child.canonical_building = Some(canonical);
        self.attach_child(child)?;

        if let Some(losing) = losing {
            self.deactivate_canonical(losing)?;
        }

        info!(
            first = %first,
            second = %second,
            merged = %child_id,
            canonical = %canonical,
            confidence = ?confidence,
            "Saved snapshot match"
        );

        Ok(MatchOutcome {
            merged: child_id,
            canonical_building: canonical,
            deactivated: losing,
        })
    }

    /// Record a user edit of a tip as a new single-parent child
    ///
    /// `fields` and `extra_data` are applied over the parent's values. Values
    /// that change are attributed to the new child, everything else keeps the
    /// parent's source. The canonical building moves to the child.
    pub fn update_snapshot(
        &mut self,
        id: SnapshotId,
        fields: BTreeMap<BuildingField, String>,
        extra_data: ExtraData,
    ) -> TreeResult<SnapshotId> {
        let parent = self.get(id)?;
        self.check_organization(parent)?;
        if !parent.is_tip() {
            return Err(TreeError::NotATip(id));
        }

        let parent_canonical = parent.canonical_building;
        let mut child = Snapshot::new(self.organization_id, SourceType::Composite);
        let child_id = child.id;
        child.import_file_id = parent.import_file_id;
        child.match_type = parent.match_type;
        child.fields = parent.fields.clone();
        child.extra_data = parent.extra_data.clone();
        child.parents = vec![id];

        for field in parent.fields.keys() {
            let source = parent.field_sources.get(field).copied().unwrap_or(id);
            child.field_sources.insert(*field, source);
        }
        for key in parent.extra_data.keys() {
            let source = parent.extra_data_sources.get(key).copied().unwrap_or(id);
            child.extra_data_sources.insert(key.clone(), source);
        }

        for (field, value) in fields {
            let value = field.clean(&value);
            if parent.fields.get(&field) != Some(&value) {
                debug!(field = field.as_str(), value = %value, "Edited field");
                child.fields.insert(field, value);
                child.field_sources.insert(field, child_id);
            }
        }
        for (key, value) in extra_data {
            if parent.extra_data.get(&key) != Some(&value) {
                debug!(key = %key, "Edited extra data");
                child.extra_data_sources.insert(key.clone(), child_id);
                child.extra_data.insert(key, value);
            }
        }

        let canonical = match parent_canonical {
            Some(canonical) => {
                self.point_canonical(canonical, child_id)?;
                canonical
            }
            None => self.create_canonical(child_id),
        };
        child.canonical_building = Some(canonical);
        self.attach_child(child)?;

        info!(parent = %id, snapshot = %child_id, "Updated snapshot");
        Ok(child_id)
    }
}
