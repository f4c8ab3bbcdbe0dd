//! Match service
//!
//! Manual match, unmatch, edit and lookup operations over the stored trees,
//! plus column mapping management.

use crate::db::{columns, snapshots};
use crate::error::{MatchError, MatchResult};
use crate::mapping::MappingTable;
use crate::models::{BuildingField, ColumnMapping, ExtraData, MappingRequest, MappingSide, MatchType, Snapshot};
use crate::tree::{MatchOutcome, SnapshotTree, TreeError, TreeResult, UnmatchOutcome};
use chrono::Utc;
use seed_common::config::MatchingConfig;
use seed_common::events::{EventBus, SeedEvent};
use seed_common::{OrganizationId, SnapshotId};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use tracing::info;

/// Database-backed match operations
#[derive(Clone)]
pub struct MatchService {
    db: SqlitePool,
    event_bus: EventBus,
    config: MatchingConfig,
}

impl MatchService {
    pub fn new(db: SqlitePool, event_bus: EventBus, config: MatchingConfig) -> Self {
        Self { db, event_bus, config }
    }

    async fn organization_of(conn: &mut SqliteConnection, id: SnapshotId) -> MatchResult<OrganizationId> {
        snapshots::snapshot_organization(conn, id)
            .await?
            .ok_or(MatchError::Tree(TreeError::UnknownSnapshot(id)))
    }

    /// Run one tree operation inside a transaction and persist its changes
    async fn apply<T>(
        &self,
        organization_id: OrganizationId,
        op: impl FnOnce(&mut SnapshotTree) -> TreeResult<T>,
    ) -> MatchResult<(T, SnapshotTree)> {
        let mut tx = self.db.begin().await?;
        let mut tree = snapshots::load_tree(&mut tx, organization_id).await?;

        let value = op(&mut tree)?;
        let changes = tree.take_changes();
        if cfg!(debug_assertions) {
            tree.validate()?;
        }
        snapshots::persist_changes(&mut tx, &tree, &changes).await?;

        tx.commit().await?;
        Ok((value, tree))
    }

    /// Merge two tip snapshots; see [`SnapshotTree::save_match`]
    pub async fn save_match(
        &self,
        first: SnapshotId,
        second: SnapshotId,
        confidence: f64,
        default: Option<SnapshotId>,
        match_type: MatchType,
    ) -> MatchResult<MatchOutcome> {
        let mut conn = self.db.acquire().await?;
        let organization_id = Self::organization_of(&mut conn, first).await?;
        let second_org = Self::organization_of(&mut conn, second).await?;
        drop(conn);

        if second_org != organization_id {
            return Err(TreeError::OrganizationMismatch {
                snapshot: second,
                expected: organization_id,
                found: second_org,
            }
            .into());
        }

        let (outcome, _) = self
            .apply(organization_id, |tree| {
                tree.save_match(first, second, confidence, default, match_type)
            })
            .await?;

        self.event_bus.emit_lossy(SeedEvent::SnapshotsMatched {
            organization_id,
            first,
            second,
            merged: outcome.merged,
            canonical_building: outcome.canonical_building,
            confidence,
            timestamp: Utc::now(),
        });
        Ok(outcome)
    }

    /// Split a snapshot back out of its merged lineage
    pub async fn unmatch(&self, id: SnapshotId) -> MatchResult<UnmatchOutcome> {
        let mut conn = self.db.acquire().await?;
        let organization_id = Self::organization_of(&mut conn, id).await?;
        drop(conn);

        let (outcome, _) = self.apply(organization_id, |tree| tree.unmatch(id)).await?;

        self.event_bus.emit_lossy(SeedEvent::SnapshotUnmatched {
            organization_id,
            snapshot: id,
            deleted: outcome.deleted.clone(),
            reactivated: outcome.reactivated.clone(),
            timestamp: Utc::now(),
        });
        Ok(outcome)
    }

    /// Record a user edit of a tip and register its extra-data keys
    pub async fn update_snapshot(
        &self,
        id: SnapshotId,
        fields: BTreeMap<BuildingField, String>,
        extra_data: ExtraData,
    ) -> MatchResult<SnapshotId> {
        let mut conn = self.db.acquire().await?;
        let organization_id = Self::organization_of(&mut conn, id).await?;
        drop(conn);

        let (child, tree) = self
            .apply(organization_id, |tree| tree.update_snapshot(id, fields, extra_data))
            .await?;

        let mut conn = self.db.acquire().await?;
        let keys = tree.get(child)?.extra_data.keys();
        columns::register_extra_data_columns(&mut conn, organization_id, keys).await?;
        Ok(child)
    }

    /// Terminal snapshot of the lineage containing `id`
    pub async fn tip(&self, id: SnapshotId) -> MatchResult<Snapshot> {
        let mut conn = self.db.acquire().await?;
        let organization_id = Self::organization_of(&mut conn, id).await?;
        let tree = snapshots::load_tree(&mut conn, organization_id).await?;
        let tip = tree.tip(id)?;
        Ok(tree.get(tip)?.clone())
    }

    /// Descendants and ancestors of a snapshot
    pub async fn lineage(&self, id: SnapshotId) -> MatchResult<(Vec<SnapshotId>, Vec<SnapshotId>)> {
        let mut conn = self.db.acquire().await?;
        let organization_id = Self::organization_of(&mut conn, id).await?;
        let tree = snapshots::load_tree(&mut conn, organization_id).await?;
        Ok((tree.child_tree(id)?, tree.parent_tree(id)?))
    }

    pub async fn create_mappings(
        &self,
        organization_id: OrganizationId,
        requests: &[MappingRequest],
    ) -> MatchResult<Vec<ColumnMapping>> {
        let mut tx = self.db.begin().await?;
        let created = columns::create_mappings(&mut tx, organization_id, requests).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Mapping dictionary of an organization
    pub async fn column_mappings(&self, organization_id: OrganizationId) -> MatchResult<MappingTable> {
        let mut conn = self.db.acquire().await?;
        let resolver =
            columns::load_resolver(&mut conn, organization_id, &self.config.concat_delimiter).await?;
        let table = resolver.get_column_mappings(organization_id);
        info!(
            organization = %organization_id,
            direct = table.direct.len(),
            concatenated = table.concat.len(),
            "Resolved column mappings"
        );
        Ok(table)
    }

    pub async fn get_column_mapping(
        &self,
        raw_columns: &[&str],
        organization_id: OrganizationId,
        side: MappingSide,
    ) -> MatchResult<Option<(Vec<String>, u8)>> {
        let mut conn = self.db.acquire().await?;
        columns::get_column_mapping(&mut conn, raw_columns, organization_id, side).await
    }
}
