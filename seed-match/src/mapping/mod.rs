//! Column mapping resolution and row mapping
//!
//! Raw spreadsheet headers are resolved to canonical fields through the
//! organization's column mappings, then each raw row is translated into a
//! mapped snapshot.

pub mod resolver;
pub mod row_mapper;

pub use resolver::{ColumnMappingResolver, MappingTable, MAPPING_CONFIDENCE};
pub use row_mapper::map_row;
