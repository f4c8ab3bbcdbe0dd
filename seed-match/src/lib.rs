//! seed-match library interface
//!
//! Record matching and merge engine: column mapping resolution, provenance
//! aware merging, the canonical snapshot tree (match / unmatch / tip), the
//! duplicate matcher and the import orchestrator.

pub mod db;
pub mod error;
pub mod mapping;
pub mod matcher;
pub mod merge;
pub mod models;
pub mod services;
pub mod tree;

pub use crate::error::{MatchError, MatchResult};
pub use crate::mapping::{ColumnMappingResolver, MappingTable};
pub use crate::merge::{merge_extra_data, merge_fields};
pub use crate::services::{ImportOrchestrator, ImportSummary, MatchService};
pub use crate::tree::{ChangeSet, MatchOutcome, SnapshotTree, TreeError, UnmatchOutcome};
