//! # SEED Common Library
//!
//! Shared code for the SEED record matching engine and its tools:
//! - Error and result types
//! - Bootstrap configuration loading and root folder resolution
//! - SQLite database initialization (schema)
//! - Event types (SeedEvent enum) and the EventBus
//! - Identifier newtypes and blank-value helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod ids;
pub mod values;

pub use error::{Error, Result};
pub use ids::{CanonicalId, ImportFileId, ImportRecordId, OrganizationId, SnapshotId};
