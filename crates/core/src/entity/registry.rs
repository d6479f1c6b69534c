use std::collections::HashMap;

use glam::Vec3;

use super::entity::{Entity, EntityHandle, EntityType};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("entity id must not be empty")]
    EmptyId,
    #[error("entity id {0} already registered")]
    Collision(u32),
}

/// Thread-safety for the registry is provided by its owner — the world
/// lock, since the world, entity registry, and event log live behind one
/// exclusive lock; this type itself is a plain, single-threaded map.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<u32, Entity>,
    next_id: u32,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_id: 1,
        }
    }

    /// Formats a typed display id, e.g. `"NPC_17"`.
    pub fn typed_id(entity_type: EntityType, net_id: u32) -> String {
        format!("{:?}_{}", entity_type, net_id)
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn spawn(&mut self, entity_type: EntityType, owner_player_id: u32) -> EntityHandle {
        let id = self.allocate_id();
        let entity = Entity::new(id, entity_type, owner_player_id);
        self.entities.insert(id, entity);
        EntityHandle(id)
    }

    /// Registers an entity at a caller-chosen id, used when replaying a
    /// snapshot or applying a remap. Fails if the id is 0 (an "empty" id)
    /// or already taken.
    pub fn register(&mut self, net_id: u32, entity: Entity) -> Result<EntityHandle, RegistryError> {
        if net_id == 0 {
            return Err(RegistryError::EmptyId);
        }
        if self.entities.contains_key(&net_id) {
            return Err(RegistryError::Collision(net_id));
        }
        self.entities.insert(net_id, entity);
        if net_id >= self.next_id {
            self.next_id = net_id + 1;
        }
        Ok(EntityHandle(net_id))
    }

    pub fn despawn(&mut self, net_id: u32) -> Option<Entity> {
        self.entities.remove(&net_id)
    }

    /// Transfers ownership of an entity spawned under one player id to
    /// another, as part of the id remap flow: the authoritative server
    /// spawn echoes the client's `local_id`, and the client-side
    /// counterpart (`crates/client-net/src/remap.rs`) swaps its local
    /// bookkeeping over to the server-issued id. On the server this is only
    /// used for control-transfer events (`PlayerControlTransferred`), never
    /// for the local-id echo itself, which the client resolves unilaterally.
    pub fn reassign_owner_id(&mut self, net_id: u32, new_owner_player_id: u32) -> Option<()> {
        let entity = self.entities.get_mut(&net_id)?;
        entity.owner_player_id = new_owner_player_id;
        Some(())
    }

    pub fn get(&self, net_id: u32) -> Option<&Entity> {
        self.entities.get(&net_id)
    }

    pub fn get_mut(&mut self, net_id: u32) -> Option<&mut Entity> {
        self.entities.get_mut(&net_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// O(N) spatial query: acceptable for N <= a few thousand; a caller may
    /// substitute a grid/quadtree while preserving semantics — the interest
    /// manager layers a zone-grid prefilter on top of this for the
    /// broadcast hot path.
    pub fn entities_in_radius(&self, center: Vec3, radius: f32) -> Vec<&Entity> {
        self.entities
            .values()
            .filter(|e| e.active && e.position.distance(center) <= radius)
            .collect()
    }

    pub fn owned_by(&self, player_id: u32) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(move |e| e.owner_player_id == player_id)
    }

    /// Sweeps entities with `marked_for_removal` set (pipeline step 8).
    /// Returns the ids actually removed.
    pub fn cleanup_marked(&mut self) -> Vec<u32> {
        let marked: Vec<u32> = self
            .entities
            .iter()
            .filter(|(_, e)| e.marked_for_removal)
            .map(|(id, _)| *id)
            .collect();
        for id in &marked {
            self.entities.remove(id);
        }
        marked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_empty_and_duplicate_ids() {
        let mut registry = EntityRegistry::new();
        let entity = Entity::new(5, EntityType::Item, 0);
        assert!(matches!(
            registry.register(0, entity.clone()),
            Err(RegistryError::EmptyId)
        ));
        registry.register(5, entity.clone()).unwrap();
        assert!(matches!(
            registry.register(5, entity),
            Err(RegistryError::Collision(5))
        ));
    }

    #[test]
    fn id_never_reused_after_spawn() {
        let mut registry = EntityRegistry::new();
        let a = registry.spawn(EntityType::Item, 0);
        registry.despawn(a.id());
        let b = registry.spawn(EntityType::Item, 0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn radius_query_excludes_inactive() {
        let mut registry = EntityRegistry::new();
        let handle = registry.spawn(EntityType::PlayerCharacter, 1);
        registry.get_mut(handle.id()).unwrap().position = Vec3::new(1.0, 0.0, 0.0);

        let handle2 = registry.spawn(EntityType::PlayerCharacter, 2);
        let e2 = registry.get_mut(handle2.id()).unwrap();
        e2.position = Vec3::new(2.0, 0.0, 0.0);
        e2.active = false;

        let nearby = registry.entities_in_radius(Vec3::ZERO, 5.0);
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].net_id, handle.id());
    }

    #[test]
    fn reassign_owner_id_updates_existing_entity_only() {
        let mut registry = EntityRegistry::new();
        let handle = registry.spawn(EntityType::Item, 1);
        assert!(registry.reassign_owner_id(handle.id(), 2).is_some());
        assert_eq!(registry.get(handle.id()).unwrap().owner_player_id, 2);
        assert!(registry.reassign_owner_id(999, 2).is_none());
    }

    #[test]
    fn cleanup_marked_removes_and_reports() {
        let mut registry = EntityRegistry::new();
        let handle = registry.spawn(EntityType::Item, 0);
        registry.get_mut(handle.id()).unwrap().mark_for_removal();
        let removed = registry.cleanup_marked();
        assert_eq!(removed, vec![handle.id()]);
        assert!(registry.get(handle.id()).is_none());
    }
}
