use std::net::SocketAddr;

/// Surfaced from one `tick_once` call for the TUI/headless logger to drain.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    ClientConnecting { addr: SocketAddr },
    ClientConnected { session_id: u32, addr: SocketAddr, player_id: u32 },
    ClientDisconnected { session_id: u32, reason: DisconnectReason },
    ConnectionDenied { addr: SocketAddr, reason: String },
    Error { message: String },
}

/// `cleanup_timed_out` doesn't report which of the two timeouts (§4.4's
/// auth-timeout vs. heartbeat-timeout) fired for a given session, so both
/// surface under `HeartbeatTimeout` here; only `GameServer` call sites that
/// know the distinction (there are none yet) would need a finer variant.
#[derive(Debug, Clone, Copy)]
pub enum DisconnectReason {
    Graceful,
    HeartbeatTimeout,
    Kicked,
    Banned,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::HeartbeatTimeout => "timed out",
            DisconnectReason::Kicked => "kicked",
            DisconnectReason::Banned => "banned",
        }
    }
}
