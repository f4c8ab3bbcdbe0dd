//! Per-organization column mapping lookup

use crate::models::{ColumnMapping, ConcatConfig, MappingSide};
use seed_common::OrganizationId;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Confidence reported for a user-defined mapping
pub const MAPPING_CONFIDENCE: u8 = 100;

/// Mapping dictionary consumed by the row mapper
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    /// Raw column name → mapped column name
    pub direct: BTreeMap<String, String>,
    pub concat: Vec<ConcatConfig>,
}

/// Resolves raw column names against a set of column mappings
///
/// Lookups only ever see mappings of the organization they are asked about.
#[derive(Debug, Clone)]
pub struct ColumnMappingResolver {
    mappings: Vec<ColumnMapping>,
    delimiter: String,
}

impl ColumnMappingResolver {
    pub fn new(mappings: Vec<ColumnMapping>, delimiter: impl Into<String>) -> Self {
        Self {
            mappings,
            delimiter: delimiter.into(),
        }
    }

    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    fn for_organization(
        &self,
        organization: OrganizationId,
    ) -> impl Iterator<Item = &ColumnMapping> {
        self.mappings
            .iter()
            .filter(move |m| m.super_organization == Some(organization))
    }

    /// Column names on `side` of the mapping for `raw_columns`
    ///
    /// Pass several raw names to look up a concatenated mapping; a mapping
    /// whose raw side is exactly those names wins over one that merely
    /// contains one of them.
    pub fn get_column_mapping(
        &self,
        raw_columns: &[&str],
        organization: OrganizationId,
        side: MappingSide,
    ) -> Option<(Vec<String>, u8)> {
        let exact = self.for_organization(organization).find(|m| {
            m.column_raw.len() == raw_columns.len()
                && raw_columns.iter().all(|name| m.has_raw_name(name))
        });
        let mapping = exact.or_else(|| {
            self.for_organization(organization)
                .find(|m| raw_columns.iter().any(|name| m.has_raw_name(name)))
        })?;

        let names: Vec<String> = mapping
            .side(side)
            .iter()
            .map(|c| c.column_name.clone())
            .collect();
        if names.is_empty() {
            return None;
        }
        debug!(raw = ?raw_columns, resolved = ?names, "Resolved column mapping");
        Some((names, MAPPING_CONFIDENCE))
    }

    /// Mapping dictionary for every mapping of `organization`
    ///
    /// Mappings without a mapped column are skipped.
    pub fn get_column_mappings(&self, organization: OrganizationId) -> MappingTable {
        let mut table = MappingTable::default();

        for mapping in self.for_organization(organization) {
            let Some(target) = mapping.column_mapped.first() else {
                continue;
            };

            if mapping.is_concatenated() {
                table.concat.push(ConcatConfig {
                    source_columns: mapping
                        .column_raw
                        .iter()
                        .map(|c| c.column_name.clone())
                        .collect(),
                    target: target.column_name.clone(),
                    delimiter: self.delimiter.clone(),
                });
                continue;
            }

            let Some(raw) = mapping.column_raw.first() else {
                continue;
            };
            if !mapping.is_direct() {
                warn!(
                    raw = %raw.column_name,
                    targets = mapping.column_mapped.len(),
                    "Mapping has several targets; using the first"
                );
            }
            table
                .direct
                .insert(raw.column_name.clone(), target.column_name.clone());
        }

        table
    }
}
