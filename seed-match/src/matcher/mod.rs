//! Duplicate detection against an organization's active buildings
//!
//! A freshly mapped snapshot is compared with the tips of the organization's
//! active canonical buildings. An exact identifier match is certain; failing
//! that, addresses are compared with Jaro-Winkler similarity after
//! normalization.

mod address;

pub use address::{normalize_address, normalize_postal_code};

use crate::models::{BuildingField, Snapshot};
use seed_common::config::MatchingConfig;
use seed_common::SnapshotId;
use tracing::debug;

/// Why a candidate was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    /// Same non-blank identifier
    Identifier(BuildingField),
    /// Normalized addresses are similar enough
    Address,
}

/// Best existing tip for a new snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub snapshot: SnapshotId,
    /// 0.0-1.0
    pub confidence: f64,
    pub reason: MatchReason,
}

/// Scores new snapshots against existing tips
#[derive(Debug, Clone)]
pub struct DuplicateMatcher {
    address_threshold: f64,
}

impl Default for DuplicateMatcher {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl DuplicateMatcher {
    pub fn new(address_threshold: f64) -> Self {
        Self { address_threshold }
    }

    pub fn from_config(config: &MatchingConfig) -> Self {
        Self::new(config.address_similarity_threshold)
    }

    /// Score `candidate` against one existing snapshot
    pub fn score(&self, candidate: &Snapshot, existing: &Snapshot) -> Option<(f64, MatchReason)> {
        for field in BuildingField::IDENTIFIERS {
            if let (Some(a), Some(b)) = (candidate.populated(field), existing.populated(field)) {
                if a.trim() == b.trim() {
                    return Some((1.0, MatchReason::Identifier(field)));
                }
            }
        }

        if let (Some(a), Some(b)) = (
            candidate.populated(BuildingField::PostalCode),
            existing.populated(BuildingField::PostalCode),
        ) {
            if normalize_postal_code(a) != normalize_postal_code(b) {
                return None;
            }
        }

        let a = normalize_address(&address_key(candidate)?);
        let b = normalize_address(&address_key(existing)?);
        if a.is_empty() || b.is_empty() {
            return None;
        }

        let similarity = strsim::jaro_winkler(&a, &b);
        (similarity >= self.address_threshold).then_some((similarity, MatchReason::Address))
    }

    /// Best scoring tip, ties going to the earliest in `tips`
    ///
    /// `tips` should be ordered oldest first. Tips under the candidate's own
    /// canonical building are ignored.
    pub fn find_match<'a>(
        &self,
        candidate: &Snapshot,
        tips: impl IntoIterator<Item = &'a Snapshot>,
    ) -> Option<MatchCandidate> {
        let mut best: Option<MatchCandidate> = None;

        for tip in tips {
            if tip.id == candidate.id
                || (tip.canonical_building.is_some()
                    && tip.canonical_building == candidate.canonical_building)
            {
                continue;
            }
            let Some((confidence, reason)) = self.score(candidate, tip) else {
                continue;
            };
            if best.as_ref().map_or(true, |b| confidence > b.confidence) {
                best = Some(MatchCandidate {
                    snapshot: tip.id,
                    confidence,
                    reason,
                });
            }
        }

        debug!(
            snapshot = %candidate.id,
            matched = ?best.as_ref().map(|b| b.snapshot),
            confidence = ?best.as_ref().map(|b| b.confidence),
            "Duplicate search complete"
        );
        best
    }
}

/// Address lines joined for comparison
fn address_key(snapshot: &Snapshot) -> Option<String> {
    let line1 = snapshot.populated(BuildingField::AddressLine1)?;
    Some(match snapshot.populated(BuildingField::AddressLine2) {
        Some(line2) => format!("{} {}", line1, line2),
        None => line1.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;
    use seed_common::OrganizationId;

    fn building(address: &str, postal: &str) -> Snapshot {
        Snapshot::new(OrganizationId::new(), SourceType::Assessed)
            .with_field(BuildingField::AddressLine1, address)
            .with_field(BuildingField::PostalCode, postal)
    }

    #[test]
    fn test_identifier_match_is_certain() {
        let matcher = DuplicateMatcher::default();
        let a = building("1 Main St", "").with_field(BuildingField::PmPropertyId, "2264");
        let b = building("999 Other Rd", "").with_field(BuildingField::PmPropertyId, " 2264");
        assert_eq!(
            matcher.score(&a, &b),
            Some((1.0, MatchReason::Identifier(BuildingField::PmPropertyId)))
        );
    }

    #[test]
    fn test_blank_identifier_does_not_match() {
        let matcher = DuplicateMatcher::default();
        let a = building("1 Main St", "").with_field(BuildingField::TaxLotId, "");
        let b = building("999 Other Rd", "").with_field(BuildingField::TaxLotId, "");
        assert_eq!(matcher.score(&a, &b), None);
    }

    #[test]
    fn test_address_similarity() {
        let matcher = DuplicateMatcher::default();
        let a = building("555 Database Lane", "94111");
        let b = building("555 database LN.", "94111-0001");
        let (score, reason) = matcher.score(&a, &b).unwrap();
        assert_eq!(reason, MatchReason::Address);
        assert!((score - 1.0).abs() < f64::EPSILON);

        let c = building("555 Database Lane", "10001");
        assert_eq!(matcher.score(&a, &c), None);

        let d = building("17 Harbor View Drive", "94111");
        assert_eq!(matcher.score(&a, &d), None);
    }

    #[test]
    fn test_find_match_prefers_best_then_earliest() {
        let matcher = DuplicateMatcher::new(0.9);
        let candidate = building("555 Database Lane", "");
        let first = building("555 Database Ln", "");
        let second = building("555 Database Ln", "");
        let near = building("555 Databse Ln", "");

        let found = matcher
            .find_match(&candidate, [&near, &first, &second])
            .unwrap();
        assert_eq!(found.snapshot, first.id);

        assert!(matcher.find_match(&candidate, []).is_none());
    }
}
