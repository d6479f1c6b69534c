mod store;
mod types;

pub use store::{SnapshotStore, MAX_SNAPSHOTS, SNAPSHOT_INTERVAL_TICKS};
pub use types::{EntitySnapshot, WorldSnapshot};
