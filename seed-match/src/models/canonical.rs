//! Canonical building: the stable identity of a building across imports

use seed_common::{CanonicalId, OrganizationId, SnapshotId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity pointing at the current tip snapshot
///
/// Inactive once its identity has been absorbed into another canonical
/// building by a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalBuilding {
    pub id: CanonicalId,
    pub organization_id: OrganizationId,
    pub canonical_snapshot: Option<SnapshotId>,
    pub active: bool,
}

impl CanonicalBuilding {
    pub fn new(organization_id: OrganizationId) -> Self {
        Self {
            id: CanonicalId::new(),
            organization_id,
            canonical_snapshot: None,
            active: true,
        }
    }
}

impl fmt::Display for CanonicalBuilding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self
            .canonical_snapshot
            .map(|s| s.to_string())
            .unwrap_or_else(|| "None".to_string());
        write!(f, "pk: {} - snapshot: {} - active: {}", self.id, snapshot, self.active)
    }
}
