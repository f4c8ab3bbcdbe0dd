//! Services for seed-match
//!
//! Database-backed entry points: manual match/unmatch and the import
//! orchestrator. Each operation loads the organization's tree in a
//! transaction, applies the tree operation, persists the change set and
//! commits.

pub mod import_orchestrator;
pub mod match_service;

pub use import_orchestrator::{ImportOrchestrator, ImportSummary, RawRow};
pub use match_service::MatchService;
