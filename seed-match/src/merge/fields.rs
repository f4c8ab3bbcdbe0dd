//! Scalar field merging with source attribution

use super::{pick, Pick};
use crate::models::{BuildingField, Snapshot};
use seed_common::values::is_blank_str;
use seed_common::SnapshotId;
use std::collections::BTreeMap;
use tracing::debug;

/// Merge the canonical fields of two snapshots, preferring `default`
///
/// Same rule as extra data: a blank default value falls back to the other
/// snapshot's value. A field absent from both stays absent.
pub fn merge_fields(
    default: &Snapshot,
    other: &Snapshot,
) -> (BTreeMap<BuildingField, String>, BTreeMap<BuildingField, SnapshotId>) {
    let mut fields = BTreeMap::new();
    let mut sources = BTreeMap::new();

    for field in BuildingField::ALL {
        let chosen = pick(
            default.fields.get(&field),
            other.fields.get(&field),
            |v: &String| is_blank_str(v),
        );
        let Some((value, from)) = chosen else {
            continue;
        };

        let source = match from {
            Pick::Preferred => default.id,
            Pick::Other => other.id,
        };

        debug!(
            field = field.as_str(),
            value = %value,
            source = %source,
            "Selected value for field"
        );

        fields.insert(field, value.clone());
        sources.insert(field, source);
    }

    (fields, sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;
    use seed_common::OrganizationId;

    #[test]
    fn test_default_wins_unless_blank() {
        let org = OrganizationId::new();
        let a = Snapshot::new(org, SourceType::Assessed)
            .with_field(BuildingField::PropertyName, "Greenfield Complex")
            .with_field(BuildingField::AddressLine2, "");
        let b = Snapshot::new(org, SourceType::Portfolio)
            .with_field(BuildingField::PropertyName, "A Place")
            .with_field(BuildingField::AddressLine2, "Apt 4")
            .with_field(BuildingField::City, "Gotham City");

        let (fields, sources) = merge_fields(&a, &b);

        assert_eq!(fields[&BuildingField::PropertyName], "Greenfield Complex");
        assert_eq!(sources[&BuildingField::PropertyName], a.id);
        assert_eq!(fields[&BuildingField::AddressLine2], "Apt 4");
        assert_eq!(sources[&BuildingField::AddressLine2], b.id);
        assert_eq!(sources[&BuildingField::City], b.id);
        assert!(!fields.contains_key(&BuildingField::Owner));

        let (fields, sources) = merge_fields(&b, &a);
        assert_eq!(fields[&BuildingField::PropertyName], "A Place");
        assert_eq!(sources[&BuildingField::PropertyName], b.id);
    }
}
