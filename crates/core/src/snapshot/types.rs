use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityType};

/// Per-entity state captured into a [`super::WorldSnapshot`]. A deep copy,
/// not a reference: snapshots must outlive the entity they were taken
/// from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub net_id: u32,
    pub entity_type: u8,
    pub owner_player_id: u32,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub health: Option<[f32; 3]>,
    pub faction_id: u32,
    pub velocity: [f32; 3],
}

impl From<&Entity> for EntitySnapshot {
    fn from(entity: &Entity) -> Self {
        Self {
            net_id: entity.net_id,
            entity_type: entity.entity_type as u8,
            owner_player_id: entity.owner_player_id,
            position: entity.position.to_array(),
            rotation: entity.rotation.to_array(),
            health: entity.health.map(|h| [h.head, h.chest, h.limbs]),
            faction_id: entity.faction_id,
            velocity: entity.velocity.to_array(),
        }
    }
}

impl EntitySnapshot {
    pub fn entity_type(&self) -> EntityType {
        EntityType::from(self.entity_type)
    }
}

/// Full image of world state at a tick boundary. Immutable once produced
/// and freely shareable across threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub world_id: u32,
    pub tick_id: u64,
    pub state_version: u64,
    pub timestamp_ms: u64,
    pub world_time_hours: f32,
    pub entities: Vec<EntitySnapshot>,
    /// Keyed by `"{faction_a}:{faction_b}"` (ordered pair, a < b) to keep
    /// the on-disk form JSON-map-friendly without a tuple key.
    pub faction_relations: HashMap<String, i32>,
    pub active_zone_ids: Vec<u32>,
    pub economy_prices: HashMap<u32, f32>,
}

impl WorldSnapshot {
    pub fn relation_key(a: u32, b: u32) -> String {
        if a <= b {
            format!("{}:{}", a, b)
        } else {
            format!("{}:{}", b, a)
        }
    }
}
