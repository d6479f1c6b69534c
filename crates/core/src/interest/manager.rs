use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::entity::EntityRegistry;
use crate::net::{
    compress_quat, encode_move_speed, encode_position_absolute, encode_position_delta,
    encode_velocity, CharacterFlags, CharacterPosition, EntitySpawnPayload, SPRINT_SPEED_MPS,
};

use super::zone_grid::ZoneGrid;

/// `S2C_EntityDespawn` reason code for an AOI exit — the only reason code
/// this module emits.
pub const REASON_OUT_OF_RANGE: u8 = 0;

/// What one session needs broadcast this tick, derived from the AOI
/// transition of every candidate entity.
#[derive(Debug, Default)]
pub struct SessionDelta {
    pub spawns: Vec<EntitySpawnPayload>,
    pub position_batch: Vec<CharacterPosition>,
    pub despawns: Vec<(u32, u8)>,
}

/// Tracks, per session, which entities are currently in view, plus the last
/// position broadcast to that session (for delta-position encoding).
/// Generalizes per-connection dirty-tracking from "one peer" to "one
/// peer's AOI set".
#[derive(Debug, Default)]
pub struct InterestManager {
    aoi: HashMap<u32, HashSet<u32>>,
    last_sent_position: HashMap<(u32, u32), Vec3>,
}

impl InterestManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drop_session(&mut self, session_id: u32) {
        if let Some(entity_ids) = self.aoi.remove(&session_id) {
            for entity_id in entity_ids {
                self.last_sent_position.remove(&(session_id, entity_id));
            }
        }
    }

    /// Computes this tick's AOI delta for one session. Observer points are
    /// the positions of every entity in `owned_entities` — an entity is in
    /// view if it is within `sync_radius` of *any* of them. Session-id
    /// ordering is the caller's responsibility (it's the tie-break rule for
    /// who sees a spawn first): iterate sessions in session-id order and
    /// call this once per session, in order.
    pub fn compute_delta(
        &mut self,
        session_id: u32,
        owned_entities: &HashSet<u32>,
        registry: &EntityRegistry,
        grid: &ZoneGrid,
    ) -> SessionDelta {
        let observer_positions: Vec<Vec3> = owned_entities
            .iter()
            .filter_map(|id| registry.get(*id))
            .map(|e| e.position)
            .collect();

        let mut delta = SessionDelta::default();
        if observer_positions.is_empty() {
            if let Some(previous) = self.aoi.remove(&session_id) {
                for entity_id in previous {
                    delta.despawns.push((entity_id, REASON_OUT_OF_RANGE));
                    self.last_sent_position.remove(&(session_id, entity_id));
                }
            }
            return delta;
        }

        let previous = self.aoi.entry(session_id).or_default().clone();

        let mut candidate_ids: HashSet<u32> = previous.clone();
        for observer in &observer_positions {
            candidate_ids.extend(grid.candidates_near(*observer));
        }

        let mut new_aoi = HashSet::new();

        for entity_id in candidate_ids {
            let entity = match registry.get(entity_id) {
                Some(e) if e.active => e,
                _ => {
                    if previous.contains(&entity_id) {
                        delta.despawns.push((entity_id, REASON_OUT_OF_RANGE));
                        self.last_sent_position.remove(&(session_id, entity_id));
                    }
                    continue;
                }
            };

            let nearest = observer_positions
                .iter()
                .map(|o| entity.position.distance(*o))
                .fold(f32::INFINITY, f32::min);
            let in_aoi = nearest <= entity.entity_type.sync_radius();

            if !in_aoi {
                if previous.contains(&entity_id) {
                    delta.despawns.push((entity_id, REASON_OUT_OF_RANGE));
                    self.last_sent_position.remove(&(session_id, entity_id));
                }
                continue;
            }

            new_aoi.insert(entity_id);

            if !previous.contains(&entity_id) {
                delta.spawns.push(EntitySpawnPayload {
                    entity_id: entity.net_id,
                    entity_type: entity.entity_type as u8,
                    owner: entity.owner_player_id,
                    template_id: 0,
                    position: entity.position.to_array(),
                    rotation_compressed: compress_quat(entity.rotation),
                    faction: entity.faction_id,
                    template_name: entity.template_name.clone().unwrap_or_default(),
                    local_id: None,
                });
                self.last_sent_position.insert((session_id, entity_id), entity.position);
            } else if entity.dirty {
                let last = self
                    .last_sent_position
                    .get(&(session_id, entity_id))
                    .copied();
                let (position_bits, is_delta) = match last {
                    Some(previous_position) => (
                        encode_position_delta(previous_position, entity.position),
                        true,
                    ),
                    None => (encode_position_absolute(entity.position), false),
                };
                let mut flags = CharacterFlags::empty();
                if entity.velocity.length() > SPRINT_SPEED_MPS {
                    flags |= CharacterFlags::SPRINTING;
                }
                if entity.health.is_some_and(|h| h.is_dead()) {
                    flags |= CharacterFlags::DEAD;
                }
                delta.position_batch.push(CharacterPosition {
                    entity_id: entity.net_id,
                    position_bits,
                    is_delta,
                    rotation_compressed: compress_quat(entity.rotation),
                    velocity: encode_velocity(entity.velocity),
                    animation_state: 0,
                    move_speed: encode_move_speed(entity.velocity.length()),
                    flags: flags.bits(),
                });
                self.last_sent_position.insert((session_id, entity_id), entity.position);
            }
        }

        self.aoi.insert(session_id, new_aoi);
        delta
    }

    /// Clears the movement-dirty bit on every entity once all sessions have
    /// been offered this tick's deltas, so an unmoved entity is not
    /// rebroadcast next tick (caller invokes this once, after iterating all
    /// sessions in session-id order).
    pub fn clear_dirty_flags(registry: &mut EntityRegistry) {
        for entity in registry.iter_mut() {
            entity.dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;
    use std::collections::HashSet as Set;

    fn owned(id: u32) -> HashSet<u32> {
        let mut set = Set::new();
        set.insert(id);
        set
    }

    #[test]
    fn entering_aoi_emits_spawn_then_moving_emits_position_update() {
        let mut registry = EntityRegistry::new();
        let observer = registry.spawn(EntityType::PlayerCharacter, 1);
        let target = registry.spawn(EntityType::Npc, 0);
        registry.get_mut(target.id()).unwrap().position = Vec3::new(10.0, 0.0, 0.0);

        let mut grid = ZoneGrid::new();
        grid.rebuild(&registry);

        let mut manager = InterestManager::new();
        let delta = manager.compute_delta(1, &owned(observer.id()), &registry, &grid);
        assert_eq!(delta.spawns.len(), 2); // observer + target both come into view

        // Move target, mark dirty as move_to would.
        let entity = registry.get_mut(target.id()).unwrap();
        entity.position = Vec3::new(20.0, 0.0, 0.0);
        entity.dirty = true;
        grid.rebuild(&registry);

        let delta = manager.compute_delta(1, &owned(observer.id()), &registry, &grid);
        assert!(delta.spawns.is_empty());
        assert_eq!(delta.position_batch.len(), 1);
        assert_eq!(delta.position_batch[0].entity_id, target.id());
    }

    #[test]
    fn leaving_aoi_emits_despawn_with_out_of_range_reason() {
        let mut registry = EntityRegistry::new();
        let observer = registry.spawn(EntityType::PlayerCharacter, 1);
        let target = registry.spawn(EntityType::Item, 0);
        registry.get_mut(target.id()).unwrap().position = Vec3::new(10.0, 0.0, 0.0);

        let mut grid = ZoneGrid::new();
        grid.rebuild(&registry);

        let mut manager = InterestManager::new();
        manager.compute_delta(1, &owned(observer.id()), &registry, &grid);

        registry.get_mut(target.id()).unwrap().position = Vec3::new(10_000.0, 0.0, 0.0);
        grid.rebuild(&registry);

        let delta = manager.compute_delta(1, &owned(observer.id()), &registry, &grid);
        assert!(delta
            .despawns
            .iter()
            .any(|(id, reason)| *id == target.id() && *reason == REASON_OUT_OF_RANGE));
    }

    #[test]
    fn session_with_no_owned_entities_clears_its_aoi() {
        let mut registry = EntityRegistry::new();
        let observer = registry.spawn(EntityType::PlayerCharacter, 1);
        let mut grid = ZoneGrid::new();
        grid.rebuild(&registry);

        let mut manager = InterestManager::new();
        manager.compute_delta(1, &owned(observer.id()), &registry, &grid);

        let delta = manager.compute_delta(1, &Set::new(), &registry, &grid);
        assert!(!delta.despawns.is_empty());
    }
}
