use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Closed variant over the entity kinds the wire protocol knows about.
/// A typed enum plus typed component fields on [`Entity`] replace an open
/// string-to-boxed-value component bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum EntityType {
    #[default]
    PlayerCharacter = 0,
    Npc = 1,
    Item = 2,
    Building = 3,
    Vehicle = 4,
    Projectile = 5,
    Effect = 6,
}

impl EntityType {
    /// Sync radius in meters for this type. `Building` returns
    /// `f32::INFINITY` (global relevance).
    pub fn sync_radius(self) -> f32 {
        match self {
            EntityType::PlayerCharacter | EntityType::Npc => 100.0,
            EntityType::Item | EntityType::Projectile | EntityType::Effect => 50.0,
            EntityType::Building => f32::INFINITY,
            EntityType::Vehicle => 100.0,
        }
    }
}

impl From<u8> for EntityType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::PlayerCharacter,
            1 => Self::Npc,
            2 => Self::Item,
            3 => Self::Building,
            4 => Self::Vehicle,
            5 => Self::Projectile,
            6 => Self::Effect,
            _ => Self::Effect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityHandle(pub u32);

impl EntityHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Fixed health track: a chest-hitbox style array rather than a single HP
/// scalar, matching the wire protocol's `S2C_HealthUpdate` shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct Health {
    pub head: f32,
    pub chest: f32,
    pub limbs: f32,
}

impl Health {
    pub const FULL: Health = Health {
        head: 100.0,
        chest: 100.0,
        limbs: 100.0,
    };

    /// Chest health at or below -100 is a death threshold.
    pub fn is_dead(&self) -> bool {
        self.chest <= -100.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct InventorySlot {
    pub item_type: u32,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Equipment {
    pub weapon: Option<u32>,
    pub armor: Option<u32>,
    pub accessory: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub net_id: u32,
    pub entity_type: EntityType,
    pub owner_player_id: u32,
    pub position: Vec3,
    pub rotation: Quat,
    pub active: bool,
    pub marked_for_removal: bool,
    pub last_update_tick: u64,
    pub state_version: u64,

    pub health: Option<Health>,
    pub inventory: Vec<InventorySlot>,
    pub equipment: Equipment,
    pub faction_id: u32,
    pub template_name: Option<String>,

    /// Dirty bit: set whenever an applied event changes observable state
    /// beyond the `POS_CHANGE_THRESHOLD`.
    pub dirty: bool,
    pub velocity: Vec3,
}

/// Position deltas at or below this magnitude are not broadcast.
pub const POS_CHANGE_THRESHOLD: f32 = 0.1;

impl Entity {
    pub fn new(net_id: u32, entity_type: EntityType, owner_player_id: u32) -> Self {
        Self {
            net_id,
            entity_type,
            owner_player_id,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            active: true,
            marked_for_removal: false,
            last_update_tick: 0,
            state_version: 0,
            health: matches!(entity_type, EntityType::PlayerCharacter | EntityType::Npc)
                .then_some(Health::FULL),
            inventory: Vec::new(),
            equipment: Equipment::default(),
            faction_id: 0,
            template_name: None,
            dirty: true,
            velocity: Vec3::ZERO,
        }
    }

    pub fn handle(&self) -> EntityHandle {
        EntityHandle(self.net_id)
    }

    /// Is the owner the server itself (owner id 0)?
    pub fn is_server_owned(&self) -> bool {
        self.owner_player_id == 0
    }

    /// Ownership enforcement: only the owner or the server may submit
    /// events mutating this entity.
    pub fn may_be_mutated_by(&self, source_player_id: u32) -> bool {
        source_player_id == 0 || source_player_id == self.owner_player_id
    }

    pub fn mark_for_removal(&mut self) {
        self.marked_for_removal = true;
        self.active = false;
    }

    /// Moves the entity, flipping `dirty` only if the move exceeds the
    /// broadcast threshold.
    pub fn move_to(&mut self, new_position: Vec3, tick: u64) {
        if new_position.distance(self.position) > POS_CHANGE_THRESHOLD {
            self.dirty = true;
        }
        self.position = new_position;
        self.last_update_tick = tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_enforcement() {
        let entity = Entity::new(1, EntityType::PlayerCharacter, 42);
        assert!(entity.may_be_mutated_by(42));
        assert!(entity.may_be_mutated_by(0));
        assert!(!entity.may_be_mutated_by(7));
    }

    #[test]
    fn mark_for_removal_implies_inactive() {
        let mut entity = Entity::new(1, EntityType::Item, 0);
        entity.mark_for_removal();
        assert!(entity.marked_for_removal);
        assert!(!entity.active);
    }

    #[test]
    fn small_moves_do_not_dirty() {
        let mut entity = Entity::new(1, EntityType::PlayerCharacter, 1);
        entity.dirty = false;
        entity.move_to(Vec3::new(0.01, 0.0, 0.0), 5);
        assert!(!entity.dirty);
        entity.move_to(Vec3::new(1.0, 0.0, 0.0), 6);
        assert!(entity.dirty);
    }

    #[test]
    fn death_threshold() {
        let mut health = Health::FULL;
        assert!(!health.is_dead());
        health.chest = -100.0;
        assert!(health.is_dead());
    }
}
