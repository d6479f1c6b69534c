use serde::{Deserialize, Serialize};

use crate::error::EventRejection;

/// Delivery-guarantee classification the transport dispatcher uses to pick
/// a channel for a broadcast *about* an applied event. Distinct from the
/// wire channel a client *submits* on, which the codec pins per message
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reliability {
    ReliableOrdered,
    ReliableUnordered,
    Unreliable,
}

/// One variant per world event type. Payloads are typed per variant
/// (typed fields over an open data bag) with
/// `#[serde(tag = "type", content = "data")]` so the on-disk JSON schema
/// still exposes separate `type` and `data` keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventKind {
    EntitySpawned {
        entity_type: u8,
        owner_player_id: u32,
        position: [f32; 3],
        template_name: Option<String>,
        /// Echoes the client's locally-assigned id so the client can remap
        /// it to the authoritative id.
        local_id: Option<u32>,
    },
    EntityDied {
        killer_entity_id: Option<u32>,
    },
    EntityRemoved,
    EntityMoved {
        position: [f32; 3],
        rotation: [f32; 4],
    },
    EntityTeleported {
        position: [f32; 3],
    },
    CombatAction {
        weapon_id: u8,
    },
    DamageDealt {
        amount: f32,
        hitbox: u8,
    },
    HealingApplied {
        amount: f32,
    },
    StatusEffectApplied {
        effect_id: u32,
        duration_secs: f32,
    },
    StatusEffectRemoved {
        effect_id: u32,
    },
    InventoryChanged {
        item_type: u32,
        delta_quantity: i32,
    },
    ItemDropped {
        item_type: u32,
        position: [f32; 3],
    },
    ItemPickedUp {
        item_type: u32,
    },
    ItemEquipped {
        item_type: u32,
        slot: u8,
    },
    ItemUnequipped {
        slot: u8,
    },
    InteractionStarted {
        interaction_id: u32,
    },
    InteractionCompleted {
        interaction_id: u32,
    },
    FactionRelationChanged {
        other_faction_id: u32,
        delta: i32,
    },
    FactionMemberJoined {
        faction_id: u32,
    },
    FactionMemberLeft {
        faction_id: u32,
    },
    TimeAdvanced {
        game_hours: f32,
    },
    ZoneChanged {
        zone_id: u32,
    },
    BuildingPlaced {
        template_name: String,
        position: [f32; 3],
    },
    BuildingDestroyed,
    PlayerConnected {
        player_id: u32,
    },
    PlayerDisconnected {
        player_id: u32,
    },
    PlayerControlTransferred {
        new_owner_player_id: u32,
    },
}

impl EventKind {
    pub fn reliability(&self) -> Reliability {
        match self {
            EventKind::EntitySpawned { .. }
            | EventKind::EntityRemoved
            | EventKind::EntityDied { .. }
            | EventKind::CombatAction { .. }
            | EventKind::ItemEquipped { .. }
            | EventKind::ItemUnequipped { .. }
            | EventKind::FactionRelationChanged { .. }
            | EventKind::FactionMemberJoined { .. }
            | EventKind::FactionMemberLeft { .. }
            | EventKind::BuildingPlaced { .. }
            | EventKind::BuildingDestroyed
            | EventKind::PlayerConnected { .. }
            | EventKind::PlayerDisconnected { .. }
            | EventKind::PlayerControlTransferred { .. } => Reliability::ReliableOrdered,

            EventKind::InventoryChanged { .. }
            | EventKind::ItemDropped { .. }
            | EventKind::ItemPickedUp { .. }
            | EventKind::StatusEffectApplied { .. }
            | EventKind::StatusEffectRemoved { .. } => Reliability::ReliableUnordered,

            EventKind::EntityMoved { .. }
            | EventKind::EntityTeleported { .. }
            | EventKind::DamageDealt { .. }
            | EventKind::HealingApplied { .. }
            | EventKind::InteractionStarted { .. }
            | EventKind::InteractionCompleted { .. }
            | EventKind::TimeAdvanced { .. }
            | EventKind::ZoneChanged { .. } => Reliability::Unreliable,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::EntitySpawned { .. } => "EntitySpawned",
            EventKind::EntityDied { .. } => "EntityDied",
            EventKind::EntityRemoved => "EntityRemoved",
            EventKind::EntityMoved { .. } => "EntityMoved",
            EventKind::EntityTeleported { .. } => "EntityTeleported",
            EventKind::CombatAction { .. } => "CombatAction",
            EventKind::DamageDealt { .. } => "DamageDealt",
            EventKind::HealingApplied { .. } => "HealingApplied",
            EventKind::StatusEffectApplied { .. } => "StatusEffectApplied",
            EventKind::StatusEffectRemoved { .. } => "StatusEffectRemoved",
            EventKind::InventoryChanged { .. } => "InventoryChanged",
            EventKind::ItemDropped { .. } => "ItemDropped",
            EventKind::ItemPickedUp { .. } => "ItemPickedUp",
            EventKind::ItemEquipped { .. } => "ItemEquipped",
            EventKind::ItemUnequipped { .. } => "ItemUnequipped",
            EventKind::InteractionStarted { .. } => "InteractionStarted",
            EventKind::InteractionCompleted { .. } => "InteractionCompleted",
            EventKind::FactionRelationChanged { .. } => "FactionRelationChanged",
            EventKind::FactionMemberJoined { .. } => "FactionMemberJoined",
            EventKind::FactionMemberLeft { .. } => "FactionMemberLeft",
            EventKind::TimeAdvanced { .. } => "TimeAdvanced",
            EventKind::ZoneChanged { .. } => "ZoneChanged",
            EventKind::BuildingPlaced { .. } => "BuildingPlaced",
            EventKind::BuildingDestroyed => "BuildingDestroyed",
            EventKind::PlayerConnected { .. } => "PlayerConnected",
            EventKind::PlayerDisconnected { .. } => "PlayerDisconnected",
            EventKind::PlayerControlTransferred { .. } => "PlayerControlTransferred",
        }
    }
}

/// A submitted world-mutating command. Field names follow the on-disk
/// schema exactly:
/// `{eventId, type, tickId, entityId, targetEntityId?, data, sourcePlayerId,
/// submittedAt, processedAt, wasApplied, rejectionReason?}` — `type`/`data`
/// come from `kind` via `#[serde(flatten)]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldEvent {
    pub event_id: u64,
    pub tick_id: u64,
    #[serde(flatten)]
    pub kind: EventKind,
    pub entity_id: u32,
    pub target_entity_id: Option<u32>,
    pub source_player_id: u32,
    pub submitted_at: u64,
    pub processed_at: Option<u64>,
    #[serde(rename = "wasApplied")]
    pub applied: bool,
    pub rejection_reason: Option<String>,
}

impl WorldEvent {
    pub fn mark_applied(&mut self, processed_at: u64) {
        self.applied = true;
        self.processed_at = Some(processed_at);
        self.rejection_reason = None;
    }

    pub fn mark_rejected(&mut self, processed_at: u64, reason: EventRejection) {
        self.applied = false;
        self.processed_at = Some(processed_at);
        self.rejection_reason = Some(reason.to_string());
    }
}
