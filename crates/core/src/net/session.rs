use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::error::SessionError;

use super::stats::NetworkStats;
use super::tracking::{AckTracker, ReceiveTracker};

/// Real seconds a new peer has to complete the handshake before being
/// dropped.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Ticks of silence after authentication before a session is considered
/// lost: 5 seconds' worth of ticks, computed against the live tick rate
/// rather than hardcoded, since the tick rate is configurable.
pub fn heartbeat_timeout_ticks(tick_rate: u32) -> u64 {
    (5 * tick_rate.max(1)) as u64
}

/// Per-connection state machine:
/// `Connected -> Authenticating -> {Authenticated, Kicked}`,
/// `Authenticated -> {Disconnected, Kicked}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Authenticating,
    Authenticated,
    Kicked,
    Disconnected,
}

/// One client's session. A connection can own more than one entity (a
/// `HashSet<u32>` rather than a single `Option<u32>`), plus authentication
/// fields (`player_id`, `player_name`, `admin`).
#[derive(Debug)]
pub struct ClientConnection {
    pub session_id: u32,
    pub addr: SocketAddr,
    pub state: SessionState,
    pub player_id: Option<u32>,
    pub player_name: Option<String>,
    /// Settable only out-of-band — never through a handshake field or any
    /// other network-originated write.
    pub admin: bool,
    pub connected_at: Instant,
    pub last_heartbeat_tick: u64,
    pub ping_ms: f32,
    pub owned_entities: HashSet<u32>,
    pub send_sequence: u32,
    pub receive_tracker: ReceiveTracker,
    pub ack_tracker: AckTracker,
    pub stats: NetworkStats,
}

impl ClientConnection {
    fn new(session_id: u32, addr: SocketAddr) -> Self {
        Self {
            session_id,
            addr,
            state: SessionState::Connected,
            player_id: None,
            player_name: None,
            admin: false,
            connected_at: Instant::now(),
            last_heartbeat_tick: 0,
            ping_ms: 0.0,
            owned_entities: HashSet::new(),
            send_sequence: 0,
            receive_tracker: ReceiveTracker::new(),
            ack_tracker: AckTracker::new(256),
            stats: NetworkStats::default(),
        }
    }

    pub fn next_send_sequence(&mut self) -> u32 {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1);
        sequence
    }

    pub fn touch_heartbeat(&mut self, tick: u64) {
        self.last_heartbeat_tick = tick;
    }

    fn auth_elapsed(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Owns every live session and enforces capacity, auth, and timeout rules,
/// keeping auth-timeout and heartbeat-timeout as distinct clocks.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    sessions_by_addr: HashMap<SocketAddr, u32>,
    sessions: HashMap<u32, ClientConnection>,
    next_session_id: u32,
    max_players: usize,
}

impl ConnectionManager {
    pub fn new(max_players: usize) -> Self {
        Self {
            sessions_by_addr: HashMap::new(),
            sessions: HashMap::new(),
            next_session_id: 1,
            max_players,
        }
    }

    pub fn accept(&mut self, addr: SocketAddr) -> &mut ClientConnection {
        if let Some(&id) = self.sessions_by_addr.get(&addr) {
            return self.sessions.get_mut(&id).unwrap();
        }
        let session_id = self.next_session_id;
        self.next_session_id += 1;
        self.sessions.insert(session_id, ClientConnection::new(session_id, addr));
        self.sessions_by_addr.insert(addr, session_id);
        self.sessions.get_mut(&session_id).unwrap()
    }

    /// Transitions a session from `Authenticating` to `Authenticated`,
    /// enforcing the `maxPlayers` capacity cap.
    pub fn authenticate(
        &mut self,
        session_id: u32,
        player_id: u32,
        player_name: String,
    ) -> Result<(), SessionError> {
        if self.connected_count() >= self.max_players {
            return Err(SessionError::CapacityFull { max: self.max_players });
        }
        let session = self
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::HandshakeTimeout)?;
        session.player_id = Some(player_id);
        session.player_name = Some(player_name);
        session.state = SessionState::Authenticated;
        Ok(())
    }

    pub fn reject(&mut self, session_id: u32) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.state = SessionState::Kicked;
        }
    }

    pub fn kick(&mut self, session_id: u32) {
        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.state = SessionState::Kicked;
        }
    }

    pub fn get(&self, session_id: u32) -> Option<&ClientConnection> {
        self.sessions.get(&session_id)
    }

    pub fn get_mut(&mut self, session_id: u32) -> Option<&mut ClientConnection> {
        self.sessions.get_mut(&session_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientConnection> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClientConnection> {
        self.sessions.values_mut()
    }

    pub fn remove(&mut self, session_id: u32) -> Option<ClientConnection> {
        if let Some(session) = self.sessions.remove(&session_id) {
            self.sessions_by_addr.remove(&session.addr);
            Some(session)
        } else {
            None
        }
    }

    pub fn connected_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.state == SessionState::Authenticated)
            .count()
    }

    pub fn total_count(&self) -> usize {
        self.sessions.len()
    }

    /// Sweeps sessions that have overstayed either timeout:
    /// pre-`Authenticated` sessions against `AUTH_TIMEOUT` wall-clock time,
    /// `Authenticated` sessions against `heartbeat_timeout_ticks` of
    /// simulation time. Returns the removed sessions' ids and owned entity
    /// ids so the caller can mark those entities for removal.
    pub fn cleanup_timed_out(&mut self, current_tick: u64, tick_rate: u32) -> Vec<(u32, Vec<u32>)> {
        let heartbeat_timeout = heartbeat_timeout_ticks(tick_rate);
        let timed_out: Vec<u32> = self
            .sessions
            .values()
            .filter(|session| match session.state {
                SessionState::Authenticated => {
                    current_tick.saturating_sub(session.last_heartbeat_tick) > heartbeat_timeout
                }
                SessionState::Kicked | SessionState::Disconnected => false,
                _ => session.auth_elapsed() > AUTH_TIMEOUT,
            })
            .map(|session| session.session_id)
            .collect();

        timed_out
            .into_iter()
            .map(|id| {
                let owned = self
                    .remove(id)
                    .map(|session| session.owned_entities.into_iter().collect())
                    .unwrap_or_default();
                (id, owned)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn capacity_full_rejects_additional_authentication() {
        let mut manager = ConnectionManager::new(1);
        let s1 = manager.accept(addr(1)).session_id;
        manager.authenticate(s1, 1, "one".into()).unwrap();

        let s2 = manager.accept(addr(2)).session_id;
        let result = manager.authenticate(s2, 2, "two".into());
        assert!(matches!(result, Err(SessionError::CapacityFull { max: 1 })));
    }

    #[test]
    fn heartbeat_timeout_only_applies_post_authentication() {
        let mut manager = ConnectionManager::new(8);
        let s1 = manager.accept(addr(1)).session_id;
        manager.authenticate(s1, 1, "player".into()).unwrap();
        manager.get_mut(s1).unwrap().last_heartbeat_tick = 0;

        let removed = manager.cleanup_timed_out(heartbeat_timeout_ticks(20) + 1, 20);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, s1);
    }

    #[test]
    fn same_addr_reuses_existing_session() {
        let mut manager = ConnectionManager::new(8);
        let first = manager.accept(addr(1)).session_id;
        let second = manager.accept(addr(1)).session_id;
        assert_eq!(first, second);
        assert_eq!(manager.total_count(), 1);
    }
}
