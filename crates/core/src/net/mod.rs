//! Wire protocol, framing, reliability tracking, session lifecycle, and
//! channel dispatch.

mod channel;
mod messages;
mod protocol;
mod session;
mod simulator;
mod stats;
mod tracking;

pub use channel::{Channel, ChannelSet, BACKPRESSURE_GRACE_TICKS, CHANNEL_CAPACITY};
pub use messages::{Packet, Payload};
pub use protocol::{
    compress_quat, decode_move_speed, decode_position_absolute, decode_position_delta,
    decode_velocity, decompress_quat, encode_move_speed, encode_position_absolute,
    encode_position_delta, encode_velocity, f16_bits_to_f32, f32_to_f16_bits, CharacterFlags,
    CharacterPosition, EntitySpawnPayload, PacketHeader, PacketType, HEADER_LEN,
    MAX_POSITION_BATCH, PROTOCOL_MAGIC, PROTOCOL_VERSION, SPRINT_SPEED_MPS,
};
pub use session::{
    heartbeat_timeout_ticks, ClientConnection, ConnectionManager, SessionState, AUTH_TIMEOUT,
};
pub use simulator::PacketLossSimulation;
pub use stats::NetworkStats;
pub use tracking::{sequence_greater_than, AckTracker, ReceiveTracker};
