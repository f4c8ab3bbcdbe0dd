//! Snapshot: one versioned record of a building or tax lot

use super::fields::{BuildingField, MatchType, SourceType};
use chrono::{DateTime, SubsecRound, Utc};
use seed_common::values::is_blank_str;
use seed_common::{CanonicalId, ImportFileId, OrganizationId, SnapshotId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-form extra data attached to a snapshot
pub type ExtraData = BTreeMap<String, Value>;

/// Versioned building/tax-lot record
///
/// Field values are kept as the text the import supplied. `field_sources` and
/// `extra_data_sources` name the snapshot each value came from; a merge child
/// attributes each value to the parent that supplied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub organization_id: OrganizationId,
    pub import_file_id: Option<ImportFileId>,
    pub source_type: SourceType,

    pub fields: BTreeMap<BuildingField, String>,
    pub field_sources: BTreeMap<BuildingField, SnapshotId>,
    pub extra_data: ExtraData,
    pub extra_data_sources: BTreeMap<String, SnapshotId>,

    /// Ordered parents: for a merge child `[first, second]` as passed to the match
    pub parents: Vec<SnapshotId>,
    pub children: Vec<SnapshotId>,

    pub canonical_building: Option<CanonicalId>,

    /// Match metadata, set on merge children only
    pub confidence: Option<f64>,
    pub match_type: Option<MatchType>,
    pub default_parent: Option<SnapshotId>,

    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(organization_id: OrganizationId, source_type: SourceType) -> Self {
        Self {
            id: SnapshotId::new(),
            organization_id,
            import_file_id: None,
            source_type,
            fields: BTreeMap::new(),
            field_sources: BTreeMap::new(),
            extra_data: ExtraData::new(),
            extra_data_sources: BTreeMap::new(),
            parents: Vec::new(),
            children: Vec::new(),
            canonical_building: None,
            confidence: None,
            match_type: None,
            default_parent: None,
            // Stored with microsecond precision
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    /// Builder-style field setter, mostly for fixtures and row mapping
    pub fn with_field(mut self, field: BuildingField, value: impl Into<String>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra_data.insert(key.into(), value);
        self
    }

    pub fn field(&self, field: BuildingField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Field value when present and not blank
    pub fn populated(&self, field: BuildingField) -> Option<&str> {
        self.field(field).filter(|v| !is_blank_str(v))
    }

    /// A tip has no children
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }

    /// Created by merging two snapshots
    pub fn is_merge(&self) -> bool {
        self.parents.len() == 2
    }

    /// Created by editing a single parent
    pub fn is_edit(&self) -> bool {
        self.parents.len() == 1
    }

    /// Whether every field and extra-data value is blank
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(|v| is_blank_str(v))
            && self.extra_data.values().all(seed_common::values::is_blank_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_populated_skips_blank() {
        let snap = Snapshot::new(OrganizationId::new(), SourceType::Assessed)
            .with_field(BuildingField::PropertyName, "Greenfield Complex")
            .with_field(BuildingField::AddressLine2, "  ");

        assert_eq!(snap.populated(BuildingField::PropertyName), Some("Greenfield Complex"));
        assert_eq!(snap.field(BuildingField::AddressLine2), Some("  "));
        assert_eq!(snap.populated(BuildingField::AddressLine2), None);
        assert_eq!(snap.populated(BuildingField::City), None);
    }

    #[test]
    fn test_is_empty() {
        let org = OrganizationId::new();
        assert!(Snapshot::new(org, SourceType::PortfolioRaw)
            .with_extra("Year Built", json!(""))
            .is_empty());
        assert!(!Snapshot::new(org, SourceType::PortfolioRaw)
            .with_extra("Year Built", json!("1803"))
            .is_empty());
    }

    #[test]
    fn test_fields_serialize_by_column_name() {
        let snap = Snapshot::new(OrganizationId::new(), SourceType::Assessed)
            .with_field(BuildingField::AddressLine1, "555 Database LN.");
        let json = serde_json::to_value(&snap.fields).unwrap();
        assert_eq!(json, json!({"address_line_1": "555 Database LN."}));
    }
}
