//! Error taxonomy, one variant family per layer.

use rkyv::rancor;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("packet shorter than header")]
    ShortRead,
    #[error("unknown packet type byte: {0}")]
    UnknownType(u8),
    #[error("quaternion component out of range")]
    InvalidQuaternion,
    #[error("invalid enum discriminant: {0}")]
    InvalidEnum(u8),
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("handshake not received within timeout")]
    HandshakeTimeout,
    #[error("protocol version mismatch: client={client}, server={server}")]
    VersionMismatch { client: u32, server: u32 },
    #[error("incorrect password")]
    BadPassword,
    #[error("server is full ({max} players)")]
    CapacityFull { max: usize },
    #[error("heartbeat timeout")]
    HeartbeatTimeout,
}

impl SessionError {
    pub fn reason_code(&self) -> u8 {
        match self {
            SessionError::HandshakeTimeout => 1,
            SessionError::VersionMismatch { .. } => 2,
            SessionError::BadPassword => 3,
            SessionError::CapacityFull { .. } => 4,
            SessionError::HeartbeatTimeout => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EventRejection {
    #[error("unknown event type")]
    UnknownType,
    #[error("missing primary entity")]
    MissingEntity,
    #[error("invalid component payload")]
    InvalidPayload,
    #[error("source player does not own target entity")]
    PermissionDenied,
    #[error("pvp is disabled on this server")]
    PvpDisabled,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("no snapshot exists at or before tick {0}")]
    NoSnapshotForTarget(u64),
    #[error("snapshot at tick {0} is corrupted")]
    CorruptedSnapshot(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused")]
    ConnectionRefused,
    #[error("peer reset the connection")]
    PeerReset,
    #[error("framing error: {0}")]
    Framing(#[from] CodecError),
    #[error("send queue overflowed for peer")]
    BackpressureOverflow,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Fatal, unrecoverable server conditions (§7): the server enters
/// graceful-shutdown rather than unwinding the simulator loop.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("world lock poisoned")]
    WorldLockPoisoned,
    #[error("event log append failed: {0}")]
    EventLogWrite(std::io::Error),
}
