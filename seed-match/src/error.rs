//! Error types for seed-match

use crate::tree::TreeError;
use thiserror::Error;

/// Service-level error
#[derive(Debug, Error)]
pub enum MatchError {
    /// Tree operation rejected
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// seed-common error
    #[error("Common error: {0}")]
    Common(#[from] seed_common::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded
    #[error("Corrupt stored value in {column}: {value}")]
    Corrupt { column: &'static str, value: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for seed-match operations
pub type MatchResult<T> = Result<T, MatchError>;
