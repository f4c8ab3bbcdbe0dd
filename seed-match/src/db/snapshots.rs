//! Snapshot and canonical building persistence
//!
//! An organization's whole tree is loaded, mutated in memory, and written
//! back from the tree's change set.

use super::{format_timestamp, parse_optional, parse_stored, parse_timestamp};
use crate::error::MatchResult;
use crate::models::{CanonicalBuilding, Snapshot};
use crate::tree::{ChangeSet, SnapshotTree};
use seed_common::{OrganizationId, SnapshotId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::collections::HashMap;
use tracing::debug;

fn snapshot_from_row(row: &SqliteRow) -> MatchResult<Snapshot> {
    let id: String = row.get("id");
    let organization_id: String = row.get("organization_id");
    let source_type: String = row.get("source_type");
    let fields: String = row.get("fields");
    let field_sources: String = row.get("field_sources");
    let extra_data: String = row.get("extra_data");
    let extra_data_sources: String = row.get("extra_data_sources");
    let match_type: Option<String> = row.get("match_type");
    let created_at: String = row.get("created_at");

    Ok(Snapshot {
        id: parse_stored("snapshots.id", &id)?,
        organization_id: parse_stored("snapshots.organization_id", &organization_id)?,
        import_file_id: parse_optional("snapshots.import_file_id", row.get("import_file_id"))?,
        source_type: parse_stored("snapshots.source_type", &source_type)?,
        fields: serde_json::from_str(&fields)?,
        field_sources: serde_json::from_str(&field_sources)?,
        extra_data: serde_json::from_str(&extra_data)?,
        extra_data_sources: serde_json::from_str(&extra_data_sources)?,
        parents: Vec::new(),
        children: Vec::new(),
        canonical_building: parse_optional(
            "snapshots.canonical_building_id",
            row.get("canonical_building_id"),
        )?,
        confidence: row.get("confidence"),
        match_type: parse_optional("snapshots.match_type", match_type)?,
        default_parent: parse_optional("snapshots.default_parent_id", row.get("default_parent_id"))?,
        created_at: parse_timestamp("snapshots.created_at", &created_at)?,
    })
}

fn canonical_from_row(row: &SqliteRow) -> MatchResult<CanonicalBuilding> {
    let id: String = row.get("id");
    let organization_id: String = row.get("organization_id");
    Ok(CanonicalBuilding {
        id: parse_stored("canonical_buildings.id", &id)?,
        organization_id: parse_stored("canonical_buildings.organization_id", &organization_id)?,
        canonical_snapshot: parse_optional(
            "canonical_buildings.canonical_snapshot_id",
            row.get("canonical_snapshot_id"),
        )?,
        active: row.get::<i64, _>("active") != 0,
    })
}

/// Organization owning a snapshot, if the snapshot exists
pub async fn snapshot_organization(
    conn: &mut SqliteConnection,
    id: SnapshotId,
) -> MatchResult<Option<OrganizationId>> {
    let org: Option<String> = sqlx::query_scalar("SELECT organization_id FROM snapshots WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    org.map(|o| parse_stored("snapshots.organization_id", &o)).transpose()
}

/// Load every snapshot, lineage link and canonical building of an organization
pub async fn load_tree(
    conn: &mut SqliteConnection,
    organization_id: OrganizationId,
) -> MatchResult<SnapshotTree> {
    let org = organization_id.to_string();

    let rows = sqlx::query(
        r#"
        SELECT id, organization_id, import_file_id, source_type,
               fields, field_sources, extra_data, extra_data_sources,
               canonical_building_id, confidence, match_type, default_parent_id, created_at
        FROM snapshots
        WHERE organization_id = ?
        ORDER BY created_at, id
        "#,
    )
    .bind(&org)
    .fetch_all(&mut *conn)
    .await?;

    let mut snapshots: HashMap<SnapshotId, Snapshot> = HashMap::with_capacity(rows.len());
    let mut order = Vec::with_capacity(rows.len());
    for row in &rows {
        let snapshot = snapshot_from_row(row)?;
        order.push(snapshot.id);
        snapshots.insert(snapshot.id, snapshot);
    }

    let links = sqlx::query(
        r#"
        SELECT p.child_id, p.parent_id
        FROM snapshot_parents p
        JOIN snapshots s ON s.id = p.child_id
        WHERE s.organization_id = ?
        ORDER BY s.created_at, p.child_id, p.position
        "#,
    )
    .bind(&org)
    .fetch_all(&mut *conn)
    .await?;

    for link in &links {
        let child: SnapshotId = parse_stored("snapshot_parents.child_id", &link.get::<String, _>("child_id"))?;
        let parent: SnapshotId = parse_stored("snapshot_parents.parent_id", &link.get::<String, _>("parent_id"))?;
        if let Some(c) = snapshots.get_mut(&child) {
            c.parents.push(parent);
        }
        if let Some(p) = snapshots.get_mut(&parent) {
            p.children.push(child);
        }
    }

    let mut tree = SnapshotTree::new(organization_id);
    for id in order {
        if let Some(snapshot) = snapshots.remove(&id) {
            tree.insert(snapshot);
        }
    }

    let canonical_rows = sqlx::query(
        r#"
        SELECT id, organization_id, canonical_snapshot_id, active
        FROM canonical_buildings
        WHERE organization_id = ?
        "#,
    )
    .bind(&org)
    .fetch_all(&mut *conn)
    .await?;
    for row in &canonical_rows {
        tree.insert_canonical(canonical_from_row(row)?);
    }

    debug!(
        organization = %organization_id,
        snapshots = rows.len(),
        links = links.len(),
        canonical_buildings = canonical_rows.len(),
        "Loaded snapshot tree"
    );

    Ok(tree)
}

async fn upsert_snapshot(conn: &mut SqliteConnection, snapshot: &Snapshot) -> MatchResult<()> {
    sqlx::query(
        r#"
        INSERT INTO snapshots (
            id, organization_id, import_file_id, source_type,
            fields, field_sources, extra_data, extra_data_sources,
            canonical_building_id, confidence, match_type, default_parent_id, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            fields = excluded.fields,
            field_sources = excluded.field_sources,
            extra_data = excluded.extra_data,
            extra_data_sources = excluded.extra_data_sources,
            canonical_building_id = excluded.canonical_building_id,
            confidence = excluded.confidence,
            match_type = excluded.match_type,
            default_parent_id = excluded.default_parent_id
        "#,
    )
    .bind(snapshot.id.to_string())
    .bind(snapshot.organization_id.to_string())
    .bind(snapshot.import_file_id.map(|id| id.to_string()))
    .bind(snapshot.source_type.as_str())
    .bind(serde_json::to_string(&snapshot.fields)?)
    .bind(serde_json::to_string(&snapshot.field_sources)?)
    .bind(serde_json::to_string(&snapshot.extra_data)?)
    .bind(serde_json::to_string(&snapshot.extra_data_sources)?)
    .bind(snapshot.canonical_building.map(|id| id.to_string()))
    .bind(snapshot.confidence)
    .bind(snapshot.match_type.map(|m| m.as_str()))
    .bind(snapshot.default_parent.map(|id| id.to_string()))
    .bind(format_timestamp(&snapshot.created_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn replace_parents(conn: &mut SqliteConnection, snapshot: &Snapshot) -> MatchResult<()> {
    sqlx::query("DELETE FROM snapshot_parents WHERE child_id = ?")
        .bind(snapshot.id.to_string())
        .execute(&mut *conn)
        .await?;

    for (position, parent) in snapshot.parents.iter().enumerate() {
        sqlx::query("INSERT INTO snapshot_parents (child_id, parent_id, position) VALUES (?, ?, ?)")
            .bind(snapshot.id.to_string())
            .bind(parent.to_string())
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn upsert_canonical(conn: &mut SqliteConnection, canonical: &CanonicalBuilding) -> MatchResult<()> {
    sqlx::query(
        r#"
        INSERT INTO canonical_buildings (id, organization_id, canonical_snapshot_id, active, updated_at)
        VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(id) DO UPDATE SET
            canonical_snapshot_id = excluded.canonical_snapshot_id,
            active = excluded.active,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(canonical.id.to_string())
    .bind(canonical.organization_id.to_string())
    .bind(canonical.canonical_snapshot.map(|id| id.to_string()))
    .bind(canonical.active as i64)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Write a change set recorded by `tree` back to the database
///
/// Deletions run first (lineage rows cascade), then snapshot rows, then their
/// parent links, so every link references a stored snapshot.
pub async fn persist_changes(
    conn: &mut SqliteConnection,
    tree: &SnapshotTree,
    changes: &ChangeSet,
) -> MatchResult<()> {
    for id in &changes.deleted_snapshots {
        sqlx::query("DELETE FROM snapshots WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
    }
    for id in &changes.deleted_canonicals {
        sqlx::query("DELETE FROM canonical_buildings WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *conn)
            .await?;
    }

    let touched: Vec<&Snapshot> = changes
        .touched_snapshots
        .iter()
        .filter_map(|id| tree.get(*id).ok())
        .collect();
    for snapshot in &touched {
        upsert_snapshot(conn, snapshot).await?;
    }
    for snapshot in &touched {
        replace_parents(conn, snapshot).await?;
    }

    for id in &changes.touched_canonicals {
        if let Ok(canonical) = tree.canonical(*id) {
            upsert_canonical(conn, canonical).await?;
        }
    }

    debug!(
        snapshots = touched.len(),
        deleted = changes.deleted_snapshots.len(),
        canonical_buildings = changes.touched_canonicals.len(),
        "Persisted tree changes"
    );
    Ok(())
}
