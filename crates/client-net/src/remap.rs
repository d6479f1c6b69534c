//! Client-side remap table: swaps a locally-assigned speculative entity id
//! over to the authoritative id the server echoes back in `S2C_EntitySpawn`.
//! Covers the client's entity registry, interpolation buffer, and outgoing
//! command queue behind one lock, preferring a single lock covering all
//! state that must move together rather than three locks that could be
//! observed mid-remap relative to one another.

use std::collections::VecDeque;
use std::sync::Mutex;

use glam::{Quat, Vec3};
use worldsim_core::entity::{Entity, EntityRegistry, EntityType};
use worldsim_core::net::Payload;

use crate::interpolation::{InterpolatedEntity, InterpolationBuffer};

/// Local ids are drawn from the top of the id space so they can never
/// collide with an authoritative id, which `EntityRegistry::spawn` allocates
/// sequentially starting at 1 on the server. A documented client-side
/// convention, not a spec-mandated wire value.
const LOCAL_ID_BASE: u32 = 0x8000_0000;

/// A command still waiting to go out over the wire, tagged with whichever
/// entity id was known when it was queued (local or authoritative). Entries
/// tagged with a local id are retagged in place by [`RemapTable::apply_remap`].
#[derive(Debug, Clone)]
pub struct OutgoingCommand {
    pub entity_id: u32,
    pub payload: Payload,
}

struct RemapState {
    registry: EntityRegistry,
    interpolation: InterpolationBuffer,
    outgoing: VecDeque<OutgoingCommand>,
    next_local_id: u32,
}

/// Thread-safe remap table. One `Mutex` guards the registry, interpolation
/// buffer, and outgoing queue together so a remap is never visible as
/// applied to one of the three but not the others.
pub struct RemapTable {
    inner: Mutex<RemapState>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RemapState {
                registry: EntityRegistry::new(),
                interpolation: InterpolationBuffer::new(),
                outgoing: VecDeque::new(),
                next_local_id: LOCAL_ID_BASE,
            }),
        }
    }

    /// Speculatively spawns an entity under a freshly allocated local id
    /// ahead of server acknowledgement (e.g. a thrown item or a building
    /// placed client-side for immediate feedback). Returns the local id to
    /// tag the `C2S_EntitySpawnReq` and any follow-up commands with.
    pub fn spawn_local(&self, entity_type: EntityType, owner_player_id: u32) -> u32 {
        let mut state = self.inner.lock().unwrap();
        let local_id = state.next_local_id;
        state.next_local_id += 1;
        let entity = Entity::new(local_id, entity_type, owner_player_id);
        let _ = state.registry.register(local_id, entity);
        local_id
    }

    /// Queues an outgoing command tagged with the entity id known at call
    /// time. If that id is later remapped, the queued entry is retagged in
    /// place — callers never re-tag anything themselves.
    pub fn enqueue_outgoing(&self, entity_id: u32, payload: Payload) {
        let mut state = self.inner.lock().unwrap();
        state.outgoing.push_back(OutgoingCommand { entity_id, payload });
    }

    pub fn drain_outgoing(&self) -> Vec<OutgoingCommand> {
        let mut state = self.inner.lock().unwrap();
        state.outgoing.drain(..).collect()
    }

    /// Applies the authoritative `S2C_EntitySpawn`'s echoed `local_id`:
    /// moves the registry entry, retags any still-queued outgoing commands,
    /// and re-keys interpolation history, all under one lock acquisition.
    /// A no-op if `local_id` is unknown (e.g. a duplicate echo) or already
    /// equal to `authoritative_id`.
    pub fn apply_remap(&self, local_id: u32, authoritative_id: u32) {
        if local_id == authoritative_id {
            return;
        }
        let mut state = self.inner.lock().unwrap();

        if let Some(mut entity) = state.registry.despawn(local_id) {
            entity.net_id = authoritative_id;
            let _ = state.registry.register(authoritative_id, entity);
        }

        for command in state.outgoing.iter_mut() {
            if command.entity_id == local_id {
                command.entity_id = authoritative_id;
            }
        }

        state.interpolation.remap_entity(local_id, authoritative_id);
    }

    /// Registers (or re-registers) an entity the client did not spawn
    /// itself — the common case, an `S2C_EntitySpawn` for someone else's
    /// entity arriving with no matching `local_id`.
    pub fn register_remote(&self, entity_id: u32, entity_type: EntityType, owner_player_id: u32) {
        let mut state = self.inner.lock().unwrap();
        state.registry.despawn(entity_id);
        let entity = Entity::new(entity_id, entity_type, owner_player_id);
        let _ = state.registry.register(entity_id, entity);
    }

    pub fn entity_type_of(&self, entity_id: u32) -> Option<EntityType> {
        let state = self.inner.lock().unwrap();
        state.registry.get(entity_id).map(|e| e.entity_type)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_snapshot(
        &self,
        entity_id: u32,
        server_time_ms: u64,
        position: Vec3,
        rotation: Quat,
        velocity: Vec3,
        animation_state: u8,
        move_speed: u8,
        flags: u8,
    ) {
        let mut state = self.inner.lock().unwrap();
        state.interpolation.push_snapshot(
            entity_id,
            server_time_ms,
            position,
            rotation,
            velocity,
            animation_state,
            move_speed,
            flags,
        );
    }

    pub fn sample(&self, entity_id: u32, now_ms: u64) -> Option<InterpolatedEntity> {
        let state = self.inner.lock().unwrap();
        state.interpolation.sample(entity_id, now_ms)
    }

    /// Drops an entity from the registry and interpolation buffer together
    /// (on `S2C_EntityDespawn`).
    pub fn remove_entity(&self, entity_id: u32) {
        let mut state = self.inner.lock().unwrap();
        state.registry.despawn(entity_id);
        state.interpolation.remove_entity(entity_id);
    }

    pub fn tracked_entity_count(&self) -> usize {
        let state = self.inner.lock().unwrap();
        state.registry.len()
    }
}

impl Default for RemapTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_moves_registry_interpolation_and_outgoing_queue_together() {
        let table = RemapTable::new();
        let local_id = table.spawn_local(EntityType::Item, 7);
        assert!(local_id >= LOCAL_ID_BASE);

        table.push_snapshot(local_id, 0, Vec3::ZERO, Quat::IDENTITY, Vec3::ZERO, 0, 0, 0);
        table.enqueue_outgoing(local_id, Payload::Heartbeat { tick: 0 });

        table.apply_remap(local_id, 42);

        assert!(table.entity_type_of(local_id).is_none());
        assert_eq!(table.entity_type_of(42), Some(EntityType::Item));
        assert!(table.sample(local_id, 200).is_none());
        assert!(table.sample(42, 200).is_some());

        let outgoing = table.drain_outgoing();
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].entity_id, 42);
    }

    #[test]
    fn remap_of_unknown_local_id_is_a_no_op() {
        let table = RemapTable::new();
        table.apply_remap(LOCAL_ID_BASE + 999, 5);
        assert!(table.entity_type_of(5).is_none());
    }

    #[test]
    fn register_remote_entity_is_queryable_by_type() {
        let table = RemapTable::new();
        table.register_remote(10, EntityType::Npc, 0);
        assert_eq!(table.entity_type_of(10), Some(EntityType::Npc));
        assert_eq!(table.tracked_entity_count(), 1);
    }
}
