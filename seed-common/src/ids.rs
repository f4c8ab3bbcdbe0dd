//! Identifier newtypes
//!
//! Every persisted entity is keyed by a UUIDv4. The newtypes keep snapshot,
//! canonical building and organization ids from being mixed up at call sites;
//! in the database they are stored as their hyphenated TEXT form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Tenant boundary; every mapping, snapshot and canonical building belongs to one
    OrganizationId
);
uuid_id!(
    /// Versioned building/tax-lot record
    SnapshotId
);
uuid_id!(
    /// Stable building identity pointing at its current tip snapshot
    CanonicalId
);
uuid_id!(
    /// One import batch
    ImportRecordId
);
uuid_id!(
    /// One file (sheet) inside an import batch
    ImportFileId
);
