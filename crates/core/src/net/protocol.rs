//! Wire framing, message-type enumeration, and the compression codecs:
//! header+payload split, `rkyv` archive packet, hand-rolled fixed-point
//! encodings for position, velocity, and orientation.

use glam::{Quat, Vec3};
use rkyv::{rancor, Archive, Deserialize, Serialize};

use crate::error::CodecError;

pub const PROTOCOL_MAGIC: u16 = 0x4b53; // "KS" — Kenshi Server
pub const PROTOCOL_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 6;

/// `{magic u16, version u8, type u8, length u16}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub struct PacketHeader {
    pub magic: u16,
    pub version: u8,
    pub message_type: u8,
    pub length: u16,
}

impl PacketHeader {
    pub fn new(message_type: PacketType, length: u16) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            message_type: message_type as u8,
            length,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

/// Message-type catalogue. Numeric values are part of the wire contract:
/// `C2S_Handshake` is `0x01`, and every other type follows in this fixed
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    C2sHandshake = 0x01,
    S2cHandshakeAck,
    S2cHandshakeReject,
    C2sHeartbeat,
    S2cPlayerJoined,
    S2cPlayerLeft,
    C2sEntitySpawnReq,
    S2cEntitySpawn,
    S2cEntityDespawn,
    C2sPositionUpdate,
    S2cPositionUpdate,
    S2cMoveCommand,
    C2sAttackIntent,
    S2cCombatHit,
    S2cCombatDeath,
    S2cWorldSnapshot,
    S2cTimeSync,
    S2cBuildPlaced,
    S2cHealthUpdate,
    C2sEquipmentUpdate,
    S2cEquipmentUpdate,
    C2sChatMessage,
    S2cChatMessage,
    S2cSystemMessage,
}

impl TryFrom<u8> for PacketType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use PacketType::*;
        Ok(match value {
            0x01 => C2sHandshake,
            0x02 => S2cHandshakeAck,
            0x03 => S2cHandshakeReject,
            0x04 => C2sHeartbeat,
            0x05 => S2cPlayerJoined,
            0x06 => S2cPlayerLeft,
            0x07 => C2sEntitySpawnReq,
            0x08 => S2cEntitySpawn,
            0x09 => S2cEntityDespawn,
            0x0a => C2sPositionUpdate,
            0x0b => S2cPositionUpdate,
            0x0c => S2cMoveCommand,
            0x0d => C2sAttackIntent,
            0x0e => S2cCombatHit,
            0x0f => S2cCombatDeath,
            0x10 => S2cWorldSnapshot,
            0x11 => S2cTimeSync,
            0x12 => S2cBuildPlaced,
            0x13 => S2cHealthUpdate,
            0x14 => C2sEquipmentUpdate,
            0x15 => S2cEquipmentUpdate,
            0x16 => C2sChatMessage,
            0x17 => S2cChatMessage,
            0x18 => S2cSystemMessage,
            other => return Err(CodecError::UnknownType(other)),
        })
    }
}

/// Entity-spawn payload, both the client's request and the server's
/// broadcast: `{entity-id, type, owner, template-id, pos, rot-compressed,
/// faction, template-name-len, template-name}`. `local_id` lets a client
/// remap its locally-spawned entity once the authoritative id arrives.
#[derive(Debug, Clone, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct EntitySpawnPayload {
    pub entity_id: u32,
    pub entity_type: u8,
    pub owner: u32,
    pub template_id: u32,
    pub position: [f32; 3],
    pub rotation_compressed: u32,
    pub faction: u32,
    pub template_name: String,
    pub local_id: Option<u32>,
}

/// One entity's position record inside a position-batch packet, using
/// delta-compressed position, packed quaternion, int8 velocity, and u8
/// animation state + quantized speed.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct CharacterPosition {
    pub entity_id: u32,
    /// Absolute position on first AOI entry, delta-f16 against the
    /// previously sent position thereafter (the sender decides which via
    /// `is_delta`; the wire record always carries 3 raw halfwords, whose
    /// meaning the receiver resolves using its own last-known position).
    pub position_bits: [u16; 3],
    pub is_delta: bool,
    pub rotation_compressed: u32,
    pub velocity: [i8; 3],
    pub animation_state: u8,
    pub move_speed: u8,
    pub flags: u8,
}

/// Up to 255 [`CharacterPosition`] records in one packet.
pub const MAX_POSITION_BATCH: usize = 255;

bitflags::bitflags! {
    /// Per-character state bits packed into `CharacterPosition::flags`.
    /// Kept as a dedicated type rather than raw `u8` masking at every call
    /// site.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacterFlags: u8 {
        const SPRINTING = 0b0000_0001;
        const CROUCHING = 0b0000_0010;
        const DEAD      = 0b0000_0100;
        const IN_COMBAT = 0b0000_1000;
    }
}

/// Move speed (m/s) above which a character is considered sprinting for
/// [`CharacterFlags::SPRINTING`] purposes.
pub const SPRINT_SPEED_MPS: f32 = 7.0;

// --- Quaternion compression: "smallest-three" ---

const QUAT_RANGE: f32 = std::f32::consts::FRAC_1_SQRT_2;
const QUAT_BITS: u32 = 10;
const QUAT_SCALE: f32 = ((1u32 << QUAT_BITS) - 1) as f32;

/// Packs a unit quaternion into one u32: 2 bits for the index of the
/// largest-magnitude component, then 10 bits for each remaining component
/// mapped from `[-1/sqrt2, 1/sqrt2]`. The dropped (largest) component's
/// sign is always treated as positive; the decoder reconstructs it via
/// `sqrt(1 - x^2 - y^2 - z^2)`.
pub fn compress_quat(q: Quat) -> u32 {
    let components = [q.x, q.y, q.z, q.w];
    let (largest_index, largest) = components
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap())
        .map(|(i, v)| (i, *v))
        .unwrap();

    // Negate all components if the largest is negative, so the dropped
    // component's sign can be assumed positive on decode.
    let sign = if largest < 0.0 { -1.0 } else { 1.0 };

    let mut packed = largest_index as u32;
    for (i, value) in components.iter().enumerate() {
        if i == largest_index {
            continue;
        }
        let normalized = (value * sign).clamp(-QUAT_RANGE, QUAT_RANGE);
        let quantized = (((normalized + QUAT_RANGE) / (2.0 * QUAT_RANGE)) * QUAT_SCALE) as u32;
        packed = (packed << QUAT_BITS) | (quantized & ((1 << QUAT_BITS) - 1));
    }
    packed
}

pub fn decompress_quat(packed: u32) -> Result<Quat, CodecError> {
    let mask = (1u32 << QUAT_BITS) - 1;
    let c0 = (packed >> (2 * QUAT_BITS)) & mask;
    let c1 = (packed >> QUAT_BITS) & mask;
    let c2 = packed & mask;
    let largest_index = (packed >> (3 * QUAT_BITS)) & 0b11;

    let dequantize = |bits: u32| -> f32 {
        (bits as f32 / QUAT_SCALE) * (2.0 * QUAT_RANGE) - QUAT_RANGE
    };
    let a = dequantize(c0);
    let b = dequantize(c1);
    let c = dequantize(c2);

    let sum_sq = a * a + b * b + c * c;
    if sum_sq > 1.0 + 1e-4 {
        return Err(CodecError::InvalidQuaternion);
    }
    let largest = (1.0 - sum_sq.min(1.0)).sqrt();

    let components = match largest_index {
        0 => [largest, a, b, c],
        1 => [a, largest, b, c],
        2 => [a, b, largest, c],
        3 => [a, b, c, largest],
        _ => return Err(CodecError::InvalidQuaternion),
    };
    Ok(Quat::from_xyzw(
        components[0],
        components[1],
        components[2],
        components[3],
    ))
}

// --- Position delta as 3x f16 ---

/// Minimal IEEE-754 binary16 round-trip, used only for position deltas.
/// Hand-rolled rather than pulling in a numeric crate, matching the rest
/// of this module's fixed-point encodings.
pub fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = (bits >> 16) & 0x8000;
    let exponent = ((bits >> 23) & 0xff) as i32 - 127 + 15;
    let mantissa = bits & 0x007f_ffff;

    if exponent <= 0 {
        return sign as u16;
    }
    if exponent >= 0x1f {
        return (sign | 0x7c00) as u16;
    }
    (sign | ((exponent as u32) << 10) | (mantissa >> 13)) as u16
}

pub fn f16_bits_to_f32(bits: u16) -> f32 {
    let sign = (bits & 0x8000) as u32;
    let exponent = ((bits & 0x7c00) >> 10) as u32;
    let mantissa = (bits & 0x03ff) as u32;

    if exponent == 0 {
        return f32::from_bits(sign << 16);
    }
    let raw = (sign << 16) | ((exponent + (127 - 15)) << 23) | (mantissa << 13);
    f32::from_bits(raw)
}

/// Delta-position encoding relative to the last sent position for an
/// entity: absolute on first AOI entry, delta f16 thereafter.
pub fn encode_position_delta(previous: Vec3, current: Vec3) -> [u16; 3] {
    let delta = current - previous;
    [
        f32_to_f16_bits(delta.x),
        f32_to_f16_bits(delta.y),
        f32_to_f16_bits(delta.z),
    ]
}

pub fn decode_position_delta(previous: Vec3, bits: [u16; 3]) -> Vec3 {
    previous
        + Vec3::new(
            f16_bits_to_f32(bits[0]),
            f16_bits_to_f32(bits[1]),
            f16_bits_to_f32(bits[2]),
        )
}

pub fn encode_position_absolute(position: Vec3) -> [u16; 3] {
    [
        f32_to_f16_bits(position.x),
        f32_to_f16_bits(position.y),
        f32_to_f16_bits(position.z),
    ]
}

pub fn decode_position_absolute(bits: [u16; 3]) -> Vec3 {
    Vec3::new(
        f16_bits_to_f32(bits[0]),
        f16_bits_to_f32(bits[1]),
        f16_bits_to_f32(bits[2]),
    )
}

// --- Velocity as 3x int8, units of 15/127 m/s ---

const VELOCITY_UNIT: f32 = 15.0 / 127.0;

pub fn encode_velocity(velocity: Vec3) -> [i8; 3] {
    let encode_axis = |v: f32| ((v / VELOCITY_UNIT).round().clamp(-127.0, 127.0)) as i8;
    [
        encode_axis(velocity.x),
        encode_axis(velocity.y),
        encode_axis(velocity.z),
    ]
}

pub fn decode_velocity(encoded: [i8; 3]) -> Vec3 {
    Vec3::new(
        encoded[0] as f32 * VELOCITY_UNIT,
        encoded[1] as f32 * VELOCITY_UNIT,
        encoded[2] as f32 * VELOCITY_UNIT,
    )
}

// --- Animation + move speed ---

/// Quantizes a 0-15 m/s move speed into a u8 (0-255 maps to 0-15 m/s).
pub fn encode_move_speed(speed_mps: f32) -> u8 {
    ((speed_mps.clamp(0.0, 15.0) / 15.0) * 255.0).round() as u8
}

pub fn decode_move_speed(quantized: u8) -> f32 {
    (quantized as f32 / 255.0) * 15.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quaternion_round_trip_is_close() {
        let original = Quat::from_xyzw(0.1, 0.2, 0.3, 0.9274).normalize();
        let packed = compress_quat(original);
        let decoded = decompress_quat(packed).unwrap();
        assert!(original.angle_between(decoded) < 0.01);
    }

    #[test]
    fn identity_quaternion_round_trips() {
        let packed = compress_quat(Quat::IDENTITY);
        let decoded = decompress_quat(packed).unwrap();
        assert!(Quat::IDENTITY.angle_between(decoded) < 0.001);
    }

    #[test]
    fn f16_round_trip_preserves_small_deltas() {
        for value in [0.0_f32, 0.5, -0.25, 1.0, -10.0, 100.25] {
            let bits = f32_to_f16_bits(value);
            let back = f16_bits_to_f32(bits);
            assert!((back - value).abs() < 0.05, "{value} -> {back}");
        }
    }

    #[test]
    fn position_delta_round_trips() {
        let previous = Vec3::new(10.0, 0.0, 5.0);
        let current = Vec3::new(10.4, 0.0, 4.6);
        let bits = encode_position_delta(previous, current);
        let decoded = decode_position_delta(previous, bits);
        assert!((decoded - current).length() < 0.05);
    }

    #[test]
    fn velocity_clamps_at_encode() {
        let encoded = encode_velocity(Vec3::new(1000.0, -1000.0, 0.0));
        assert_eq!(encoded[0], 127);
        assert_eq!(encoded[1], -127);
    }

    #[test]
    fn move_speed_quantization_round_trips_within_tolerance() {
        let speed = 7.5;
        let quantized = encode_move_speed(speed);
        let decoded = decode_move_speed(quantized);
        assert!((decoded - speed).abs() < 0.1);
    }

    #[test]
    fn unknown_packet_type_is_rejected() {
        assert!(matches!(
            PacketType::try_from(0xff),
            Err(CodecError::UnknownType(0xff))
        ));
        assert!(PacketType::try_from(0x01).is_ok());
    }
}
