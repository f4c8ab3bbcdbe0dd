//! Data model of the matching engine

pub mod canonical;
pub mod column;
pub mod fields;
pub mod import_record;
pub mod snapshot;

pub use canonical::CanonicalBuilding;
pub use column::{Column, ColumnMapping, ConcatConfig, MappingRequest, MappingSide};
pub use fields::{BuildingField, MatchType, SourceType};
pub use import_record::{summarize, BuildingImportRecord, ImportFile, ImportRecord, ImportStatus};
pub use snapshot::{ExtraData, Snapshot};
