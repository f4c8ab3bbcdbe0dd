//! Event types for the SEED event system
//!
//! Provides shared event definitions and the EventBus used by the import
//! orchestrator and the match service.

mod import_types;

pub use import_types::{ImportPhase, ImportStatistics};

use crate::ids::{CanonicalId, ImportRecordId, OrganizationId, SnapshotId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// SEED event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so they
/// can be forwarded as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SeedEvent {
    /// An import batch started processing a file
    ImportStarted {
        import_record_id: ImportRecordId,
        organization_id: OrganizationId,
        file_name: String,
        total_rows: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress inside one phase of an import
    ImportProgress {
        import_record_id: ImportRecordId,
        phase: ImportPhase,
        current: usize,
        total: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An import batch finished
    ImportCompleted {
        import_record_id: ImportRecordId,
        statistics: ImportStatistics,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Two snapshots were merged into a new tip
    SnapshotsMatched {
        organization_id: OrganizationId,
        first: SnapshotId,
        second: SnapshotId,
        merged: SnapshotId,
        canonical_building: CanonicalId,
        confidence: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A snapshot was split out of its merged lineage
    SnapshotUnmatched {
        organization_id: OrganizationId,
        snapshot: SnapshotId,
        deleted: Vec<SnapshotId>,
        reactivated: Vec<CanonicalId>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast bus for SeedEvent values
///
/// Cloning the bus yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SeedEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow receivers lag (and miss the oldest events) once `capacity`
    /// events are buffered.
    ///
    /// # Examples
    ///
    /// ```
    /// use seed_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SeedEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: SeedEvent) -> Result<usize, broadcast::error::SendError<SeedEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SeedEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unmatched_event() -> SeedEvent {
        SeedEvent::SnapshotUnmatched {
            organization_id: OrganizationId::new(),
            snapshot: SnapshotId::new(),
            deleted: vec![SnapshotId::new()],
            reactivated: vec![],
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(unmatched_event()).is_err());
        // lossy variant must not panic
        bus.emit_lossy(unmatched_event());
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(unmatched_event()).unwrap();

        match rx.recv().await.unwrap() {
            SeedEvent::SnapshotUnmatched { deleted, .. } => assert_eq!(deleted.len(), 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(unmatched_event()).unwrap();
        assert_eq!(json["type"], "SnapshotUnmatched");
    }
}
