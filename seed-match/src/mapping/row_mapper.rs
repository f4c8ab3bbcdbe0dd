//! Raw row → mapped snapshot translation

use super::MappingTable;
use crate::models::{BuildingField, Snapshot, SourceType};
use seed_common::values::is_blank_str;
use seed_common::OrganizationId;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use tracing::trace;

fn put(snapshot: &mut Snapshot, target: &str, value: &str) {
    match target.parse::<BuildingField>() {
        Ok(field) => {
            snapshot.fields.insert(field, field.clean(value));
        }
        Err(_) => {
            snapshot
                .extra_data
                .insert(target.to_string(), Value::String(value.to_string()));
        }
    }
}

/// Translate one raw row into a mapped snapshot
///
/// Concatenated mappings join their non-blank source cells with the
/// configured delimiter. Direct mappings onto a canonical field fill that
/// field (dates rewritten to ISO form); any other target, and any unmapped raw
/// column, lands in extra data. Sources are left unset.
pub fn map_row(
    row: &BTreeMap<String, String>,
    table: &MappingTable,
    organization_id: OrganizationId,
    source_type: SourceType,
) -> Snapshot {
    let mut snapshot = Snapshot::new(organization_id, source_type.mapped());
    let mut consumed = HashSet::new();

    for concat in &table.concat {
        let parts: Vec<&str> = concat
            .source_columns
            .iter()
            .filter_map(|column| row.get(column))
            .map(|cell| cell.trim())
            .filter(|cell| !is_blank_str(cell))
            .collect();
        consumed.extend(concat.source_columns.iter().map(String::as_str));
        if concat.source_columns.iter().any(|c| row.contains_key(c)) {
            put(&mut snapshot, &concat.target, &parts.join(&concat.delimiter));
        }
    }

    for (raw, cell) in row {
        if consumed.contains(raw.as_str()) {
            continue;
        }
        match table.direct.get(raw) {
            Some(target) => put(&mut snapshot, target, cell),
            None => {
                trace!(column = %raw, "Unmapped column kept as extra data");
                snapshot
                    .extra_data
                    .insert(raw.clone(), Value::String(cell.clone()));
            }
        }
    }

    snapshot
}
