use std::collections::VecDeque;

use super::types::WorldSnapshot;

/// Snapshots are taken every `SNAPSHOT_INTERVAL_TICKS` ticks.
pub const SNAPSHOT_INTERVAL_TICKS: u64 = 600;

/// At most this many snapshots are retained, oldest discarded first.
pub const MAX_SNAPSHOTS: usize = 10;

/// Bounded-retention, tick-ordered store of [`WorldSnapshot`]s, used for
/// replay: find the nearest snapshot with tick-id <= target.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    snapshots: VecDeque<WorldSnapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: VecDeque::new(),
        }
    }

    /// Inserts a snapshot, evicting the oldest if retention is exceeded.
    /// Snapshots must be pushed in non-decreasing tick order; this is the
    /// simulator's responsibility, not enforced here.
    pub fn push(&mut self, snapshot: WorldSnapshot) {
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > MAX_SNAPSHOTS {
            self.snapshots.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&WorldSnapshot> {
        self.snapshots.back()
    }

    /// The most recent snapshot with `tick_id <= target_tick`, or `None`
    /// if every retained snapshot is newer than `target_tick` (or the
    /// store is empty) — the replay caller treats this as
    /// `ReplayError::NoSnapshotForTarget`.
    pub fn nearest_at_or_before(&self, target_tick: u64) -> Option<&WorldSnapshot> {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.tick_id <= target_tick)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldSnapshot> {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn snapshot(tick_id: u64) -> WorldSnapshot {
        WorldSnapshot {
            world_id: 1,
            tick_id,
            state_version: tick_id,
            timestamp_ms: 0,
            world_time_hours: 0.0,
            entities: Vec::new(),
            faction_relations: HashMap::new(),
            active_zone_ids: Vec::new(),
            economy_prices: HashMap::new(),
        }
    }

    #[test]
    fn retention_keeps_only_the_newest_max_snapshots() {
        let mut store = SnapshotStore::new();
        for tick in (0..20).map(|n| n * SNAPSHOT_INTERVAL_TICKS) {
            store.push(snapshot(tick));
        }
        assert_eq!(store.len(), MAX_SNAPSHOTS);
        assert_eq!(store.latest().unwrap().tick_id, 19 * SNAPSHOT_INTERVAL_TICKS);
        let oldest_tick = store.iter().next().unwrap().tick_id;
        assert_eq!(oldest_tick, 10 * SNAPSHOT_INTERVAL_TICKS);
    }

    #[test]
    fn nearest_at_or_before_finds_closest_match() {
        let mut store = SnapshotStore::new();
        store.push(snapshot(0));
        store.push(snapshot(600));
        store.push(snapshot(1200));
        assert_eq!(store.nearest_at_or_before(1800).unwrap().tick_id, 1200);
        assert_eq!(store.nearest_at_or_before(700).unwrap().tick_id, 600);
    }

    #[test]
    fn no_snapshot_before_target_returns_none() {
        let mut store = SnapshotStore::new();
        store.push(snapshot(600));
        assert!(store.nearest_at_or_before(100).is_none());
    }
}
