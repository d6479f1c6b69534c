//! Per-entity snapshot ring buffer and render-time sampling: snapshot
//! buffer, lerp/slerp sampling, extrapolation-limit cutoff. Buffers are
//! kept per-entity, fixed at a ring capacity of 10, and sample directly
//! off wall-clock "now" rather than a smoothed render clock, since nothing
//! here needs to hide jitter in the sender's broadcast cadence.
//! Client-side prediction/reconciliation is out of scope for this crate.

use std::collections::{HashMap, VecDeque};

use glam::{Quat, Vec3};

/// Ring buffer depth per entity.
pub const RING_BUFFER_CAPACITY: usize = 10;

/// Display time lags "now" by this much so the renderer always has two
/// bracketing snapshots to interpolate between.
pub const INTERP_DELAY_MS: f64 = 100.0;

/// How far past the newest snapshot the buffer will extrapolate using last
/// known velocity before giving up and marking the entity stale.
pub const EXTRAPOLATION_MS: f64 = 50.0;

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    server_time_ms: f64,
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    animation_state: u8,
    move_speed: u8,
    flags: u8,
}

/// The sampled state of one entity at render time, ready to hand to a
/// renderer (which this crate does not provide).
#[derive(Debug, Clone, Copy)]
pub struct InterpolatedEntity {
    pub entity_id: u32,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub animation_state: u8,
    pub move_speed: u8,
    pub flags: u8,
    /// Set once display time has run past the extrapolation window with no
    /// fresher snapshot arriving.
    pub stale: bool,
}

#[derive(Debug, Default)]
struct EntityBuffer {
    snapshots: VecDeque<Snapshot>,
}

impl EntityBuffer {
    fn push(&mut self, snapshot: Snapshot) {
        let insert_at = self
            .snapshots
            .iter()
            .position(|s| s.server_time_ms > snapshot.server_time_ms)
            .unwrap_or(self.snapshots.len());
        self.snapshots.insert(insert_at, snapshot);
        while self.snapshots.len() > RING_BUFFER_CAPACITY {
            self.snapshots.pop_front();
        }
    }

    fn sample(&self, entity_id: u32, display_time_ms: f64) -> Option<InterpolatedEntity> {
        let oldest = self.snapshots.front()?;
        let newest = self.snapshots.back()?;

        if display_time_ms <= oldest.server_time_ms {
            return Some(from_snapshot(entity_id, oldest, false));
        }

        if display_time_ms >= newest.server_time_ms {
            let overrun = display_time_ms - newest.server_time_ms;
            if overrun > EXTRAPOLATION_MS {
                return Some(from_snapshot(entity_id, newest, true));
            }
            let dt = (overrun / 1000.0) as f32;
            return Some(InterpolatedEntity {
                entity_id,
                position: newest.position + newest.velocity * dt,
                rotation: newest.rotation,
                velocity: newest.velocity,
                animation_state: newest.animation_state,
                move_speed: newest.move_speed,
                flags: newest.flags,
                stale: false,
            });
        }

        for pair in self.snapshots.iter().zip(self.snapshots.iter().skip(1)) {
            let (from, to) = pair;
            if from.server_time_ms <= display_time_ms && display_time_ms <= to.server_time_ms {
                let span = to.server_time_ms - from.server_time_ms;
                let t = if span > 0.0 {
                    ((display_time_ms - from.server_time_ms) / span) as f32
                } else {
                    0.0
                };
                return Some(interpolate(entity_id, from, to, t));
            }
        }

        Some(from_snapshot(entity_id, newest, false))
    }
}

fn from_snapshot(entity_id: u32, snapshot: &Snapshot, stale: bool) -> InterpolatedEntity {
    InterpolatedEntity {
        entity_id,
        position: snapshot.position,
        rotation: snapshot.rotation,
        velocity: snapshot.velocity,
        animation_state: snapshot.animation_state,
        move_speed: snapshot.move_speed,
        flags: snapshot.flags,
        stale,
    }
}

/// Nearest-neighbour for everything except position (lerp) and rotation
/// (slerp).
fn interpolate(entity_id: u32, from: &Snapshot, to: &Snapshot, t: f32) -> InterpolatedEntity {
    let rotation = if from.rotation.dot(to.rotation) < 0.0 {
        from.rotation.slerp(-to.rotation, t)
    } else {
        from.rotation.slerp(to.rotation, t)
    };
    let nearest = if t < 0.5 { from } else { to };
    InterpolatedEntity {
        entity_id,
        position: from.position.lerp(to.position, t),
        rotation,
        velocity: from.velocity.lerp(to.velocity, t),
        animation_state: nearest.animation_state,
        move_speed: nearest.move_speed,
        flags: nearest.flags,
        stale: false,
    }
}

/// Owns one [`EntityBuffer`] per tracked entity and samples all of them at
/// a shared render time.
#[derive(Debug, Default)]
pub struct InterpolationBuffer {
    entities: HashMap<u32, EntityBuffer>,
}

impl InterpolationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_snapshot(
        &mut self,
        entity_id: u32,
        server_time_ms: u64,
        position: Vec3,
        rotation: Quat,
        velocity: Vec3,
        animation_state: u8,
        move_speed: u8,
        flags: u8,
    ) {
        self.entities.entry(entity_id).or_default().push(Snapshot {
            server_time_ms: server_time_ms as f64,
            position,
            rotation,
            velocity,
            animation_state,
            move_speed,
            flags,
        });
    }

    /// Drops all buffered history for an entity (on `S2C_EntityDespawn`).
    pub fn remove_entity(&mut self, entity_id: u32) {
        self.entities.remove(&entity_id);
    }

    /// Re-keys an entity's buffered history from a local speculative id to
    /// the authoritative one the server echoed back, driven by
    /// [`crate::remap::RemapTable`]. A no-op if nothing has been buffered
    /// yet under `old_id`.
    pub fn remap_entity(&mut self, old_id: u32, new_id: u32) {
        if let Some(buffer) = self.entities.remove(&old_id) {
            self.entities.insert(new_id, buffer);
        }
    }

    /// Samples one entity at `now_ms - INTERP_DELAY_MS`. Returns `None` if
    /// nothing has ever been received for this entity.
    pub fn sample(&self, entity_id: u32, now_ms: u64) -> Option<InterpolatedEntity> {
        let display_time_ms = now_ms as f64 - INTERP_DELAY_MS;
        self.entities.get(&entity_id)?.sample(entity_id, display_time_ms)
    }

    /// Samples every tracked entity at the shared render time.
    pub fn sample_all(&self, now_ms: u64) -> Vec<InterpolatedEntity> {
        let display_time_ms = now_ms as f64 - INTERP_DELAY_MS;
        self.entities
            .iter()
            .filter_map(|(id, buffer)| buffer.sample(*id, display_time_ms))
            .collect()
    }

    pub fn tracked_entity_count(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(buffer: &mut InterpolationBuffer, entity_id: u32, time_ms: u64, x: f32) {
        buffer.push_snapshot(
            entity_id,
            time_ms,
            Vec3::new(x, 0.0, 0.0),
            Quat::IDENTITY,
            Vec3::ZERO,
            0,
            0,
            0,
        );
    }

    #[test]
    fn interpolates_between_two_bracketing_snapshots() {
        let mut buffer = InterpolationBuffer::new();
        push(&mut buffer, 1, 0, 0.0);
        push(&mut buffer, 1, 200, 10.0);

        // now=150ms -> display=50ms, halfway between the 0ms and 200ms snapshots.
        let sampled = buffer.sample(1, 150).unwrap();
        assert!((sampled.position.x - 2.5).abs() < 0.01);
        assert!(!sampled.stale);
    }

    #[test]
    fn buffer_underrun_clamps_to_oldest_snapshot() {
        let mut buffer = InterpolationBuffer::new();
        push(&mut buffer, 1, 500, 7.0);

        // now=200ms -> display=100ms, before the only snapshot at 500ms.
        let sampled = buffer.sample(1, 200).unwrap();
        assert_eq!(sampled.position.x, 7.0);
    }

    #[test]
    fn extrapolates_within_window_then_goes_stale_beyond_it() {
        let mut buffer = InterpolationBuffer::new();
        push(&mut buffer, 1, 0, 0.0);
        buffer.push_snapshot(1, 100, Vec3::ZERO, Quat::IDENTITY, Vec3::new(1.0, 0.0, 0.0), 0, 0, 0);

        // display = now - 100; now=220 -> display=120, 20ms past the newest snapshot.
        let sampled = buffer.sample(1, 220).unwrap();
        assert!(!sampled.stale);
        assert!(sampled.position.x > 0.0);

        // now=400 -> display=300, 200ms past the newest snapshot: beyond the window.
        let sampled = buffer.sample(1, 400).unwrap();
        assert!(sampled.stale);
    }

    #[test]
    fn ring_buffer_evicts_oldest_beyond_capacity() {
        let mut buffer = InterpolationBuffer::new();
        for i in 0..(RING_BUFFER_CAPACITY as u64 + 5) {
            push(&mut buffer, 1, i * 100, i as f32);
        }
        assert_eq!(buffer.entities.get(&1).unwrap().snapshots.len(), RING_BUFFER_CAPACITY);
    }

    #[test]
    fn unknown_entity_samples_to_none() {
        let buffer = InterpolationBuffer::new();
        assert!(buffer.sample(99, 1000).is_none());
    }
}
