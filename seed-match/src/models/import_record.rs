//! Import batches and their per-building outcomes

use super::fields::SourceType;
use chrono::{DateTime, Utc};
use seed_common::events::ImportStatistics;
use seed_common::{CanonicalId, ImportFileId, ImportRecordId, OrganizationId, SnapshotId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Import batch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Created,
    Importing,
    Complete,
    Failed,
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ImportStatus::Created => "CREATED",
            ImportStatus::Importing => "IMPORTING",
            ImportStatus::Complete => "COMPLETE",
            ImportStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

impl FromStr for ImportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED" => Ok(ImportStatus::Created),
            "IMPORTING" => Ok(ImportStatus::Importing),
            "COMPLETE" => Ok(ImportStatus::Complete),
            "FAILED" => Ok(ImportStatus::Failed),
            other => Err(format!("unknown import status: {}", other)),
        }
    }
}

/// One import batch for an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: ImportRecordId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub status: ImportStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ImportRecord {
    pub fn new(organization_id: OrganizationId, name: impl Into<String>) -> Self {
        Self {
            id: ImportRecordId::new(),
            organization_id,
            name: name.into(),
            status: ImportStatus::Created,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// One uploaded file (sheet) of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFile {
    pub id: ImportFileId,
    pub import_record_id: ImportRecordId,
    pub file_name: String,
    /// Raw source type of the rows in this file
    pub source_type: SourceType,
    pub num_rows: usize,
    pub num_columns: usize,
}

impl ImportFile {
    pub fn new(import_record_id: ImportRecordId, file_name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            id: ImportFileId::new(),
            import_record_id,
            file_name: file_name.into(),
            source_type,
            num_rows: 0,
            num_columns: 0,
        }
    }
}

/// Outcome for one building touched by an import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingImportRecord {
    pub id: Uuid,
    pub import_record_id: ImportRecordId,
    pub canonical_building: CanonicalId,
    pub snapshot: Option<SnapshotId>,
    /// Matched a building already in the database
    pub was_in_database: bool,
    /// Known building that this import did not contain
    pub is_missing_from_import: bool,
    pub confidence: Option<f64>,
}

impl BuildingImportRecord {
    pub fn is_matched(&self) -> bool {
        self.was_in_database && !self.is_missing_from_import
    }

    pub fn is_new(&self) -> bool {
        !self.was_in_database && !self.is_missing_from_import
    }
}

/// Derive the batch counters from its building records
pub fn summarize(records: &[BuildingImportRecord]) -> ImportStatistics {
    ImportStatistics {
        matched_buildings: records.iter().filter(|r| r.is_matched()).count(),
        new_buildings: records.iter().filter(|r| r.is_new()).count(),
        missing_buildings: records.iter().filter(|r| r.is_missing_from_import).count(),
        ..Default::default()
    }
}
