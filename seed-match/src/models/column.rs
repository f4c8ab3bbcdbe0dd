//! Columns and column mappings
//!
//! A mapping ties one or more raw spreadsheet columns to one or more
//! canonical (mapped) columns inside one organization. One raw → one mapped is
//! a direct mapping; several raw columns feeding one target is a concatenation.

use seed_common::values::source_string_sha;
use seed_common::OrganizationId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Known column name, raw or mapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: Uuid,
    pub organization_id: Option<OrganizationId>,
    pub column_name: String,
    pub table_name: Option<String>,
    pub is_extra_data: bool,
}

impl Column {
    pub fn new(organization_id: Option<OrganizationId>, column_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            column_name: column_name.into(),
            table_name: None,
            is_extra_data: false,
        }
    }

    /// Stable hash of the column name
    pub fn source_string_sha(&self) -> String {
        source_string_sha(&self.column_name)
    }
}

/// Which side of a mapping to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingSide {
    Raw,
    Mapped,
}

/// Raw column(s) → mapped column(s), scoped to an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub id: Uuid,
    pub super_organization: Option<OrganizationId>,
    pub column_raw: Vec<Column>,
    pub column_mapped: Vec<Column>,
}

impl ColumnMapping {
    pub fn new(
        super_organization: Option<OrganizationId>,
        column_raw: Vec<Column>,
        column_mapped: Vec<Column>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            super_organization,
            column_raw,
            column_mapped,
        }
    }

    /// Exactly one raw column to exactly one mapped column
    pub fn is_direct(&self) -> bool {
        self.column_raw.len() == 1 && self.column_mapped.len() == 1
    }

    /// More than one raw column feeds the mapped side
    pub fn is_concatenated(&self) -> bool {
        self.column_raw.len() > 1
    }

    pub fn side(&self, side: MappingSide) -> &[Column] {
        match side {
            MappingSide::Raw => &self.column_raw,
            MappingSide::Mapped => &self.column_mapped,
        }
    }

    pub fn has_raw_name(&self, name: &str) -> bool {
        self.column_raw.iter().any(|c| c.column_name == name)
    }
}

/// Concatenation rule produced for the row mapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatConfig {
    /// Raw columns in concatenation order
    pub source_columns: Vec<String>,
    /// Mapped column receiving the joined value
    pub target: String,
    pub delimiter: String,
}

/// One entry of a mapping upload: `from_field` (raw) → `to_field` (mapped)
///
/// `from_field` accepts a single header or a list of headers; a list creates a
/// concatenated mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRequest {
    #[serde(deserialize_with = "one_or_many")]
    pub from_field: Vec<String>,
    pub to_field: String,
    #[serde(default)]
    pub to_table_name: Option<String>,
}

impl MappingRequest {
    pub fn direct(from_field: impl Into<String>, to_field: impl Into<String>) -> Self {
        Self {
            from_field: vec![from_field.into()],
            to_field: to_field.into(),
            to_table_name: None,
        }
    }
}

fn one_or_many<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(raw: &[&str], mapped: &[&str]) -> ColumnMapping {
        ColumnMapping::new(
            None,
            raw.iter().map(|n| Column::new(None, *n)).collect(),
            mapped.iter().map(|n| Column::new(None, *n)).collect(),
        )
    }

    #[test]
    fn test_is_direct() {
        assert!(mapping(&["foo"], &["baz"]).is_direct());
        assert!(!mapping(&["foo", "bar"], &["baz"]).is_direct());
    }

    #[test]
    fn test_mapping_request_accepts_one_or_many() {
        let one: MappingRequest =
            serde_json::from_str(r#"{"from_field": "Property Id", "to_field": "pm_property_id"}"#).unwrap();
        assert_eq!(one, MappingRequest::direct("Property Id", "pm_property_id"));

        let many: MappingRequest = serde_json::from_str(
            r#"{"from_field": ["Number", "Street"], "to_field": "address_line_1", "to_table_name": "PropertyState"}"#,
        )
        .unwrap();
        assert_eq!(many.from_field, vec!["Number", "Street"]);
        assert_eq!(many.to_table_name.as_deref(), Some("PropertyState"));
    }

    #[test]
    fn test_is_concatenated() {
        assert!(!mapping(&["foo"], &["baz"]).is_concatenated());
        assert!(mapping(&["foo", "bar"], &["baz"]).is_concatenated());
    }
}
