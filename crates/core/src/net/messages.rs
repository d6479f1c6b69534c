use rkyv::{rancor, Archive, Deserialize, Serialize};

use crate::error::CodecError;

use super::protocol::{CharacterPosition, EntitySpawnPayload, PacketHeader, PacketType};

/// Union of every payload body the wire protocol carries. One variant per
/// `PacketType`; `Packet::message_type` keeps the two in lockstep.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum Payload {
    Handshake {
        protocol_version: u32,
        player_name: String,
        password: String,
    },
    HandshakeAck {
        player_id: u32,
        current_players: u32,
        max_players: u32,
        world_time_hours: f32,
    },
    HandshakeReject {
        reason_code: u8,
    },
    Heartbeat {
        tick: u64,
    },
    PlayerJoined {
        player_id: u32,
        player_name: String,
    },
    PlayerLeft {
        player_id: u32,
    },
    EntitySpawnReq(EntitySpawnPayload),
    EntitySpawn(EntitySpawnPayload),
    EntityDespawn {
        entity_id: u32,
        reason_code: u8,
    },
    PositionUpdate {
        entity_id: u32,
        position: [f32; 3],
        rotation_compressed: u32,
    },
    PositionBatch(Vec<CharacterPosition>),
    MoveCommand {
        entity_id: u32,
        target_position: [f32; 3],
    },
    AttackIntent {
        attacker_entity_id: u32,
        target_entity_id: u32,
        weapon_id: u8,
    },
    CombatHit {
        attacker_entity_id: u32,
        target_entity_id: u32,
        amount: f32,
        hitbox: u8,
    },
    CombatDeath {
        entity_id: u32,
        killer_entity_id: Option<u32>,
    },
    WorldSnapshot {
        tick_id: u64,
        server_time_ms: u64,
        entities: Vec<CharacterPosition>,
        removed_entity_ids: Vec<u32>,
    },
    TimeSync {
        world_time_hours: f32,
        day: u32,
    },
    BuildPlaced {
        entity_id: u32,
        template_name: String,
        position: [f32; 3],
    },
    HealthUpdate {
        entity_id: u32,
        head: f32,
        chest: f32,
        limbs: f32,
    },
    EquipmentUpdate {
        entity_id: u32,
        slot: u8,
        item_type: Option<u32>,
    },
    ChatMessage {
        channel: u8,
        sender_player_id: u32,
        /// Recipient for a whisper (`channel == 2`); unused otherwise,
        /// needed for the chat router's explicit-recipient filter.
        target_player_id: Option<u32>,
        text: String,
    },
    SystemMessage {
        text: String,
    },
}

impl Payload {
    pub fn message_type(&self) -> PacketType {
        match self {
            Payload::Handshake { .. } => PacketType::C2sHandshake,
            Payload::HandshakeAck { .. } => PacketType::S2cHandshakeAck,
            Payload::HandshakeReject { .. } => PacketType::S2cHandshakeReject,
            Payload::Heartbeat { .. } => PacketType::C2sHeartbeat,
            Payload::PlayerJoined { .. } => PacketType::S2cPlayerJoined,
            Payload::PlayerLeft { .. } => PacketType::S2cPlayerLeft,
            Payload::EntitySpawnReq(_) => PacketType::C2sEntitySpawnReq,
            Payload::EntitySpawn(_) => PacketType::S2cEntitySpawn,
            Payload::EntityDespawn { .. } => PacketType::S2cEntityDespawn,
            Payload::PositionUpdate { .. } => PacketType::C2sPositionUpdate,
            Payload::PositionBatch(_) => PacketType::S2cPositionUpdate,
            Payload::MoveCommand { .. } => PacketType::S2cMoveCommand,
            Payload::AttackIntent { .. } => PacketType::C2sAttackIntent,
            Payload::CombatHit { .. } => PacketType::S2cCombatHit,
            Payload::CombatDeath { .. } => PacketType::S2cCombatDeath,
            Payload::WorldSnapshot { .. } => PacketType::S2cWorldSnapshot,
            Payload::TimeSync { .. } => PacketType::S2cTimeSync,
            Payload::BuildPlaced { .. } => PacketType::S2cBuildPlaced,
            Payload::HealthUpdate { .. } => PacketType::S2cHealthUpdate,
            Payload::EquipmentUpdate { .. } => PacketType::S2cEquipmentUpdate,
            Payload::ChatMessage { .. } => PacketType::C2sChatMessage,
            Payload::SystemMessage { .. } => PacketType::S2cSystemMessage,
        }
    }
}

/// A framed packet: header plus payload, serialized together with `rkyv`.
/// `PacketHeader::length` is filled in at serialize time from the encoded
/// body length so callers never have to compute it by hand.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Payload,
}

impl Packet {
    pub fn new(payload: Payload) -> Self {
        Self {
            header: PacketHeader::new(payload.message_type(), 0),
            payload,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        if self.header.length as usize == 0 {
            return self.with_computed_length().serialize_with_length();
        }
        self.serialize_with_length()
    }

    fn serialize_with_length(&self) -> Result<Vec<u8>, CodecError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(CodecError::Serialize)
    }

    fn with_computed_length(&self) -> Self {
        // A conservative pre-pass: serialize the payload alone to learn its
        // length, then stamp the header. Avoids requiring every call site to
        // track body size by hand.
        let body_len = rkyv::to_bytes::<rancor::Error>(&self.payload)
            .map(|v| v.len())
            .unwrap_or(0);
        Self {
            header: PacketHeader::new(self.payload.message_type(), body_len.min(u16::MAX as usize) as u16),
            payload: self.payload.clone(),
        }
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < super::protocol::HEADER_LEN {
            return Err(CodecError::ShortRead);
        }
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(CodecError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_round_trips_through_rkyv() {
        let packet = Packet::new(Payload::Heartbeat { tick: 42 });
        let bytes = packet.serialize().unwrap();
        let decoded = Packet::deserialize(&bytes).unwrap();
        match decoded.payload {
            Payload::Heartbeat { tick } => assert_eq!(tick, 42),
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(decoded.header.message_type, PacketType::C2sHeartbeat as u8);
    }

    #[test]
    fn short_buffer_is_rejected_before_decoding() {
        let result = Packet::deserialize(&[0u8; 2]);
        assert!(matches!(result, Err(CodecError::ShortRead)));
    }
}
