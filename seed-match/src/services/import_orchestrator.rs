//! Import orchestrator
//!
//! Drives one uploaded file through the import pipeline:
//!
//! 1. **Loading**: each raw row becomes a raw snapshot holding every cell as
//!    extra data.
//! 2. **Mapping**: each row is translated through the organization's column
//!    mappings into a mapped snapshot with its own canonical building.
//! 3. **Matching**: each mapped snapshot is compared with the tips of the
//!    buildings that existed before the import. A confident hit is merged into
//!    the existing building; anything else is a new building. A building
//!    absorbs at most one row per file; later duplicate rows stay new
//!    buildings. Existing buildings previously imported from the same kind
//!    of source that this file did not match are recorded as missing.
//!
//! The whole file is processed in one transaction.

use crate::db::{columns, imports, snapshots};
use crate::error::{MatchError, MatchResult};
use crate::mapping::map_row;
use crate::matcher::DuplicateMatcher;
use crate::models::{
    summarize, BuildingImportRecord, ImportFile, ImportRecord, ImportStatus, MatchType, Snapshot,
    SourceType,
};
use crate::tree::SnapshotTree;
use chrono::Utc;
use seed_common::config::MatchingConfig;
use seed_common::events::{EventBus, ImportPhase, ImportStatistics, SeedEvent};
use seed_common::values::is_blank_str;
use seed_common::{CanonicalId, ImportRecordId, OrganizationId, SnapshotId};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One parsed spreadsheet row: header → cell text
pub type RawRow = BTreeMap<String, String>;

/// Outcome of importing one file
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub import_record_id: ImportRecordId,
    pub statistics: ImportStatistics,
    pub buildings: Vec<BuildingImportRecord>,
}

/// Import pipeline service
#[derive(Clone)]
pub struct ImportOrchestrator {
    db: SqlitePool,
    event_bus: EventBus,
    config: MatchingConfig,
    matcher: DuplicateMatcher,
}

impl ImportOrchestrator {
    pub fn new(db: SqlitePool, event_bus: EventBus, config: MatchingConfig) -> Self {
        let matcher = DuplicateMatcher::from_config(&config);
        Self {
            db,
            event_bus,
            config,
            matcher,
        }
    }

    /// Create and store a new import batch
    pub async fn create_import_record(
        &self,
        organization_id: OrganizationId,
        name: &str,
    ) -> MatchResult<ImportRecord> {
        let record = ImportRecord::new(organization_id, name);
        let mut conn = self.db.acquire().await?;
        imports::insert_import_record(&mut conn, &record).await?;
        info!(import_record = %record.id, organization = %organization_id, "Created import record");
        Ok(record)
    }

    /// Import the rows of one file into `record`
    ///
    /// `file.source_type` must be a raw source type. On failure nothing from
    /// the file is kept and the record is marked failed.
    pub async fn import_file(
        &self,
        record: &ImportRecord,
        mut file: ImportFile,
        rows: Vec<RawRow>,
    ) -> MatchResult<ImportSummary> {
        if !file.source_type.is_raw() {
            return Err(MatchError::InvalidInput(format!(
                "import files must have a raw source type, got {}",
                file.source_type
            )));
        }
        file.import_record_id = record.id;
        file.num_rows = rows.len();
        file.num_columns = rows
            .iter()
            .flat_map(|r| r.keys())
            .collect::<HashSet<_>>()
            .len();

        self.event_bus.emit_lossy(SeedEvent::ImportStarted {
            import_record_id: record.id,
            organization_id: record.organization_id,
            file_name: file.file_name.clone(),
            total_rows: rows.len(),
            timestamp: Utc::now(),
        });

        let started = Instant::now();
        match self.run_import(record, &file, &rows).await {
            Ok((summary, matches)) => {
                for event in matches {
                    self.event_bus.emit_lossy(event);
                }
                self.event_bus.emit_lossy(SeedEvent::ImportCompleted {
                    import_record_id: record.id,
                    statistics: summary.statistics.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    timestamp: Utc::now(),
                });
                info!(
                    import_record = %record.id,
                    file = %file.file_name,
                    rows = summary.statistics.rows,
                    matched = summary.statistics.matched_buildings,
                    new = summary.statistics.new_buildings,
                    missing = summary.statistics.missing_buildings,
                    "Import complete"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(import_record = %record.id, file = %file.file_name, "Import failed: {}", e);
                let mut conn = self.db.acquire().await?;
                imports::update_import_status(&mut conn, record.id, ImportStatus::Failed, Some(Utc::now()))
                    .await?;
                Err(e)
            }
        }
    }

    async fn run_import(
        &self,
        record: &ImportRecord,
        file: &ImportFile,
        rows: &[RawRow],
    ) -> MatchResult<(ImportSummary, Vec<SeedEvent>)> {
        let organization_id = record.organization_id;
        let mut tx = self.db.begin().await?;

        imports::update_import_status(&mut tx, record.id, ImportStatus::Importing, None).await?;
        imports::insert_import_file(&mut tx, file).await?;

        let mut tree = snapshots::load_tree(&mut tx, organization_id).await?;
        let existing: BTreeSet<CanonicalId> = tree
            .canonicals()
            .filter(|c| c.active)
            .map(|c| c.id)
            .collect();

        let (kept, skipped_rows) = self.load_raw_rows(&mut tree, record.id, file, rows)?;
        let mapped = self
            .map_rows(&mut tx, &mut tree, record.id, file, &kept)
            .await?;
        let (mut buildings, events) = self.match_rows(&mut tree, record.id, &existing, &mapped)?;
        buildings.extend(self.missing_buildings(&tree, record.id, file, &existing, &buildings)?);

        let changes = tree.take_changes();
        if cfg!(debug_assertions) {
            tree.validate()?;
        }
        snapshots::persist_changes(&mut tx, &tree, &changes).await?;
        imports::insert_building_import_records(&mut tx, &buildings).await?;
        imports::update_import_status(&mut tx, record.id, ImportStatus::Complete, Some(Utc::now())).await?;
        tx.commit().await?;

        let statistics = ImportStatistics {
            rows: rows.len(),
            skipped_rows,
            ..summarize(&buildings)
        };
        Ok((
            ImportSummary {
                import_record_id: record.id,
                statistics,
                buildings,
            },
            events,
        ))
    }

    fn progress(&self, import_record_id: ImportRecordId, phase: ImportPhase, current: usize, total: usize) {
        self.event_bus.emit_lossy(SeedEvent::ImportProgress {
            import_record_id,
            phase,
            current,
            total,
            timestamp: Utc::now(),
        });
    }

    /// Store each non-blank row as a raw snapshot; returns the kept rows and
    /// the number skipped
    fn load_raw_rows<'r>(
        &self,
        tree: &mut SnapshotTree,
        import_record_id: ImportRecordId,
        file: &ImportFile,
        rows: &'r [RawRow],
    ) -> MatchResult<(Vec<&'r RawRow>, usize)> {
        let mut kept = Vec::with_capacity(rows.len());
        let mut skipped = 0;

        for (index, row) in rows.iter().enumerate() {
            if row.values().all(|cell| is_blank_str(cell)) {
                warn!(row = index, file = %file.file_name, "Skipping blank row");
                skipped += 1;
                continue;
            }

            let mut raw = Snapshot::new(tree.organization_id(), file.source_type);
            raw.import_file_id = Some(file.id);
            raw.extra_data = row
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            let id = tree.add_snapshot(raw)?;
            tree.set_initial_sources(id)?;
            kept.push(row);
            self.progress(import_record_id, ImportPhase::Loading, index + 1, rows.len());
        }

        debug!(kept = kept.len(), skipped, "Loaded raw rows");
        Ok((kept, skipped))
    }

    /// Translate kept rows into mapped snapshots, each with its own canonical building
    async fn map_rows(
        &self,
        conn: &mut SqliteConnection,
        tree: &mut SnapshotTree,
        import_record_id: ImportRecordId,
        file: &ImportFile,
        rows: &[&RawRow],
    ) -> MatchResult<Vec<SnapshotId>> {
        let organization_id = tree.organization_id();
        let resolver = columns::load_resolver(conn, organization_id, &self.config.concat_delimiter).await?;
        let table = resolver.get_column_mappings(organization_id);

        let mut mapped = Vec::with_capacity(rows.len());
        let mut extra_keys = BTreeSet::new();
        for (position, row) in rows.iter().enumerate() {
            let mut snapshot = map_row(row, &table, organization_id, file.source_type);
            snapshot.import_file_id = Some(file.id);
            extra_keys.extend(snapshot.extra_data.keys().cloned());

            let id = tree.add_snapshot(snapshot)?;
            tree.set_initial_sources(id)?;
            tree.assign_canonical(id)?;
            mapped.push(id);
            self.progress(import_record_id, ImportPhase::Mapping, position + 1, rows.len());
        }

        let registered = columns::register_extra_data_columns(conn, organization_id, &extra_keys).await?;
        debug!(mapped = mapped.len(), registered, "Mapped rows");
        Ok(mapped)
    }

    /// Merge confident duplicates into existing buildings
    fn match_rows(
        &self,
        tree: &mut SnapshotTree,
        import_record_id: ImportRecordId,
        existing: &BTreeSet<CanonicalId>,
        mapped: &[SnapshotId],
    ) -> MatchResult<(Vec<BuildingImportRecord>, Vec<SeedEvent>)> {
        let mut buildings = Vec::with_capacity(mapped.len());
        let mut events = Vec::new();
        // Buildings already merged with a row of this file
        let mut claimed: HashSet<CanonicalId> = HashSet::new();

        for (position, id) in mapped.iter().enumerate() {
            let candidate = {
                let snapshot = tree.get(*id)?;
                let tips = tree.active_tips().into_iter().filter(|tip| {
                    tip.canonical_building
                        .is_some_and(|c| existing.contains(&c) && !claimed.contains(&c))
                });
                self.matcher.find_match(snapshot, tips)
            };

            let record = match candidate {
                Some(hit) if hit.confidence >= self.config.auto_match_threshold => {
                    let outcome =
                        tree.save_match(hit.snapshot, *id, hit.confidence, Some(*id), MatchType::Auto)?;
                    claimed.insert(outcome.canonical_building);
                    events.push(SeedEvent::SnapshotsMatched {
                        organization_id: tree.organization_id(),
                        first: hit.snapshot,
                        second: *id,
                        merged: outcome.merged,
                        canonical_building: outcome.canonical_building,
                        confidence: hit.confidence,
                        timestamp: Utc::now(),
                    });
                    BuildingImportRecord {
                        id: Uuid::new_v4(),
                        import_record_id,
                        canonical_building: outcome.canonical_building,
                        snapshot: Some(outcome.merged),
                        was_in_database: true,
                        is_missing_from_import: false,
                        confidence: Some(hit.confidence),
                    }
                }
                other => {
                    if let Some(low) = other {
                        debug!(
                            snapshot = %id,
                            candidate = %low.snapshot,
                            confidence = low.confidence,
                            "Candidate below auto-match threshold"
                        );
                    }
                    let snapshot = tree.get(*id)?;
                    BuildingImportRecord {
                        id: Uuid::new_v4(),
                        import_record_id,
                        canonical_building: snapshot
                            .canonical_building
                            .ok_or_else(|| MatchError::NotFound(format!("canonical building of {}", id)))?,
                        snapshot: Some(*id),
                        was_in_database: false,
                        is_missing_from_import: false,
                        confidence: None,
                    }
                }
            };
            buildings.push(record);
            self.progress(import_record_id, ImportPhase::Matching, position + 1, mapped.len());
        }

        Ok((buildings, events))
    }

    /// Pre-existing buildings from an earlier import of the same source type
    /// that this file did not match
    fn missing_buildings(
        &self,
        tree: &SnapshotTree,
        import_record_id: ImportRecordId,
        file: &ImportFile,
        existing: &BTreeSet<CanonicalId>,
        buildings: &[BuildingImportRecord],
    ) -> MatchResult<Vec<BuildingImportRecord>> {
        let matched: HashSet<CanonicalId> = buildings
            .iter()
            .filter(|b| b.was_in_database)
            .map(|b| b.canonical_building)
            .collect();
        let mapped_type: SourceType = file.source_type.mapped();

        let mut missing = Vec::new();
        for canonical_id in existing.iter().filter(|c| !matched.contains(c)) {
            let canonical = tree.canonical(*canonical_id)?;
            let Some(tip) = canonical.canonical_snapshot else {
                continue;
            };

            let mut lineage = tree.parent_tree(tip)?;
            lineage.push(tip);
            let from_earlier_import = lineage.iter().filter_map(|id| tree.get(*id).ok()).any(|s| {
                s.source_type == mapped_type && s.import_file_id.is_some_and(|f| f != file.id)
            });

            if from_earlier_import {
                missing.push(BuildingImportRecord {
                    id: Uuid::new_v4(),
                    import_record_id,
                    canonical_building: *canonical_id,
                    snapshot: Some(tip),
                    was_in_database: true,
                    is_missing_from_import: true,
                    confidence: None,
                });
            }
        }

        debug!(missing = missing.len(), "Computed missing buildings");
        Ok(missing)
    }
}
