use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::types::{EventKind, WorldEvent};

/// A not-yet-applied submission, captured at the moment `submit()` returns.
/// Holds everything needed to build a [`WorldEvent`] once a tick id is
/// assigned.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub event_id: u64,
    pub kind: EventKind,
    pub entity_id: u32,
    pub target_entity_id: Option<u32>,
    pub source_player_id: u32,
    pub submitted_at_ms: u64,
}

/// Thread-safe submit queue: any connection-handling thread may call
/// [`EventQueue::submit`] concurrently, while only the simulator thread
/// drains it once per tick.
#[derive(Debug, Default)]
pub struct EventQueue {
    next_event_id: AtomicU64,
    pending: Mutex<VecDeque<PendingEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            next_event_id: AtomicU64::new(1),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Assigns a monotonically increasing event id and enqueues the event.
    /// Returns the assigned id immediately; the event is not applied to
    /// world state until the simulator drains the queue.
    pub fn submit(
        &self,
        kind: EventKind,
        entity_id: u32,
        target_entity_id: Option<u32>,
        source_player_id: u32,
        submitted_at_ms: u64,
    ) -> u64 {
        let event_id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
        let pending = PendingEvent {
            event_id,
            kind,
            entity_id,
            target_entity_id,
            source_player_id,
            submitted_at_ms,
        };
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(pending);
        event_id
    }

    /// Drains every event submitted since the last drain, in submission
    /// order: events are applied in the order they were submitted, not the
    /// order threads happened to race in.
    pub fn drain(&self) -> Vec<PendingEvent> {
        let mut guard = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.drain(..).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl PendingEvent {
    pub fn into_world_event(self, tick_id: u64) -> WorldEvent {
        WorldEvent {
            event_id: self.event_id,
            tick_id,
            kind: self.kind,
            entity_id: self.entity_id,
            target_entity_id: self.target_entity_id,
            source_player_id: self.source_player_id,
            submitted_at: self.submitted_at_ms,
            processed_at: None,
            applied: false,
            rejection_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_kind() -> EventKind {
        EventKind::EntityRemoved
    }

    #[test]
    fn event_ids_are_monotonic_and_unique() {
        let queue = EventQueue::new();
        let a = queue.submit(spawn_kind(), 1, None, 0, 0);
        let b = queue.submit(spawn_kind(), 2, None, 0, 0);
        assert!(b > a);
    }

    #[test]
    fn drain_preserves_submission_order() {
        let queue = EventQueue::new();
        queue.submit(spawn_kind(), 1, None, 0, 0);
        queue.submit(spawn_kind(), 2, None, 0, 0);
        queue.submit(spawn_kind(), 3, None, 0, 0);
        let drained = queue.drain();
        let ids: Vec<u32> = drained.iter().map(|p| p.entity_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn drain_is_empty_after_first_drain() {
        let queue = EventQueue::new();
        queue.submit(spawn_kind(), 1, None, 0, 0);
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.drain().is_empty());
    }
}
