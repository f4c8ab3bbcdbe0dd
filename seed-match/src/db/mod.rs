//! SQLite persistence for seed-match
//!
//! Functions take a `&mut SqliteConnection` so callers can run them on a
//! pooled connection or inside a transaction (`&mut *tx`).

pub mod columns;
pub mod imports;
pub mod snapshots;

use crate::error::{MatchError, MatchResult};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Display;
use std::str::FromStr;

/// Parse a stored TEXT value
pub(crate) fn parse_stored<T>(column: &'static str, value: &str) -> MatchResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|_| MatchError::Corrupt {
        column,
        value: value.to_string(),
    })
}

pub(crate) fn parse_optional<T>(column: &'static str, value: Option<String>) -> MatchResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    value.map(|v| parse_stored(column, &v)).transpose()
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &'static str, value: &str) -> MatchResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| MatchError::Corrupt {
            column,
            value: value.to_string(),
        })
}
