use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;

use worldsim_core::admin::{self, AdminEffect, AdminParseError};
use worldsim_core::chat::{self, ChatRecipient};
use worldsim_core::config::ServerConfig;
use worldsim_core::entity::EntityType;
use worldsim_core::error::SessionError;
use worldsim_core::event::{EventKind, Reliability, WorldEvent};
use worldsim_core::interest::{InterestManager, ZoneGrid};
use worldsim_core::net::{
    decompress_quat, Channel, ChannelSet, ConnectionManager, Packet, PacketLossSimulation, Payload,
    SessionState,
};
use worldsim_core::world::World;

use crate::events::{DisconnectReason, ServerEvent};

/// A `Heartbeat` packet is expected roughly every half-second (~2 Hz); the
/// server doesn't enforce an upper rate, only the lower bound via
/// `heartbeat_timeout_ticks`.
const RECV_BUF_LEN: usize = 4096;

/// How often (in ticks) to broadcast a `TimeSync` packet to every
/// authenticated session. Not part of the interest manager's per-entity
/// delta, since world time isn't an entity.
const TIME_SYNC_INTERVAL_TICKS: u64 = 20;

pub struct GameServer {
    socket: UdpSocket,
    local_addr: SocketAddr,
    config: ServerConfig,
    world: World,
    connections: ConnectionManager,
    interest: InterestManager,
    grid: ZoneGrid,
    channels: HashMap<u32, ChannelSet>,
    banned_names: HashSet<String>,
    packet_loss: Option<PacketLossSimulation>,
    rng: StdRng,
    tick_duration: Duration,
    accumulator: Duration,
    last_tick_time: Instant,
    start_time: Instant,
    running: Arc<AtomicBool>,
    paused: bool,
    game_speed: f32,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(bind_addr: &str, config: ServerConfig) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;
        let tick_duration = config.tick_duration();

        Ok(Self {
            socket,
            local_addr,
            world: World::new(1, config.pvp_enabled),
            connections: ConnectionManager::new(config.max_players),
            interest: InterestManager::new(),
            grid: ZoneGrid::new(),
            channels: HashMap::new(),
            banned_names: HashSet::new(),
            packet_loss: None,
            rng: StdRng::from_entropy(),
            tick_duration,
            accumulator: Duration::ZERO,
            last_tick_time: Instant::now(),
            start_time: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
            paused: false,
            game_speed: config.game_speed,
            pending_events: VecDeque::new(),
            config,
        })
    }

    pub fn with_packet_loss(mut self, sim: PacketLossSimulation) -> Self {
        self.packet_loss = Some(sim);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown_connections();
    }

    pub fn shutdown_connections(&mut self) {
        let session_ids: Vec<u32> = self.connections.iter().map(|c| c.session_id).collect();
        for session_id in session_ids {
            self.disconnect_session(session_id, DisconnectReason::Graceful);
        }
    }

    /// Runs one real-time frame: drains the socket, then steps the fixed
    /// tick as many times as `accumulator` allows.
    pub fn tick_once(&mut self) {
        let now = Instant::now();
        self.accumulator += now - self.last_tick_time;
        self.last_tick_time = now;

        if let Err(err) = self.process_network() {
            self.pending_events
                .push_back(ServerEvent::Error { message: format!("network error: {err}") });
        }

        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            if !self.paused {
                self.tick();
            }
        }
    }

    fn now_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
    }

    fn tick(&mut self) {
        let now_ms = self.now_ms();
        let dt = self.tick_duration.as_secs_f32() * self.game_speed.max(0.0);
        self.world.simulate_tick(dt, now_ms);

        self.broadcast_applied_events();

        if self.world.tick % TIME_SYNC_INTERVAL_TICKS == 0 {
            self.broadcast(
                Payload::TimeSync { world_time_hours: self.world.clock.hour, day: self.world.clock.day },
                Channel::ReliableUnordered,
            );
        }

        self.broadcast_interest_deltas();

        let timed_out = self.connections.cleanup_timed_out(self.world.tick, self.config.tick_rate);
        for (session_id, owned_entities) in timed_out {
            for entity_id in owned_entities {
                if let Some(entity) = self.world.registry.get_mut(entity_id) {
                    entity.mark_for_removal();
                }
            }
            self.interest.drop_session(session_id);
            self.channels.remove(&session_id);
            self.pending_events.push_back(ServerEvent::ClientDisconnected {
                session_id,
                reason: DisconnectReason::HeartbeatTimeout,
            });
        }

        let overloaded: Vec<u32> = self
            .channels
            .iter_mut()
            .filter(|(_, set)| set.tick_backpressure())
            .map(|(id, _)| *id)
            .collect();
        for session_id in overloaded {
            self.disconnect_session(session_id, DisconnectReason::Kicked);
        }

        self.flush_channels();
    }

    /// Translates newly-applied world events into broadcast payloads.
    /// Combat and building events get dedicated packet types rather than
    /// waiting for the next world snapshot.
    fn broadcast_applied_events(&mut self) {
        let applied: Vec<WorldEvent> = self
            .world
            .last_tick_applied_events()
            .into_iter()
            .filter(|a| a.event.applied)
            .map(|a| a.event)
            .collect();

        for event in &applied {
            if let Some((payload, channel)) = applied_event_payload(event) {
                self.broadcast(payload, channel);
            }
            if matches!(event.kind, EventKind::DamageDealt { .. } | EventKind::HealingApplied { .. }) {
                if let Some(entity) = self.world.registry.get(event.entity_id) {
                    if let Some(health) = entity.health {
                        self.broadcast(
                            Payload::HealthUpdate {
                                entity_id: entity.net_id,
                                head: health.head,
                                chest: health.chest,
                                limbs: health.limbs,
                            },
                            Channel::ReliableUnordered,
                        );
                    }
                }
            }
        }
    }

    /// Runs the interest manager over every authenticated session, in
    /// session-id order (the tie-break rule for who sees a spawn first),
    /// then clears the registry-wide dirty bit once.
    fn broadcast_interest_deltas(&mut self) {
        self.grid.rebuild(&self.world.registry);

        let mut session_ids: Vec<u32> = self
            .connections
            .iter()
            .filter(|c| c.state == SessionState::Authenticated)
            .map(|c| c.session_id)
            .collect();
        session_ids.sort_unstable();

        for session_id in session_ids {
            let owned = match self.connections.get(session_id) {
                Some(session) => session.owned_entities.clone(),
                None => continue,
            };
            let delta = self.interest.compute_delta(session_id, &owned, &self.world.registry, &self.grid);

            for spawn in delta.spawns {
                self.enqueue(session_id, Channel::ReliableOrdered, Payload::EntitySpawn(spawn));
            }
            if !delta.position_batch.is_empty() {
                self.enqueue(session_id, Channel::Unreliable, Payload::PositionBatch(delta.position_batch));
            }
            for (entity_id, reason_code) in delta.despawns {
                self.enqueue(
                    session_id,
                    Channel::ReliableOrdered,
                    Payload::EntityDespawn { entity_id, reason_code },
                );
            }
        }

        InterestManager::clear_dirty_flags(&mut self.world.registry);
    }

    fn enqueue(&mut self, session_id: u32, channel: Channel, payload: Payload) {
        if let Some(set) = self.channels.get_mut(&session_id) {
            let _ = set.enqueue(channel, payload);
        }
    }

    fn broadcast(&mut self, payload: Payload, channel: Channel) {
        let session_ids: Vec<u32> = self
            .connections
            .iter()
            .filter(|c| c.state == SessionState::Authenticated)
            .map(|c| c.session_id)
            .collect();
        for session_id in session_ids {
            self.enqueue(session_id, channel, payload.clone());
        }
    }

    /// Sends every queued payload for every session across its three
    /// channels, applying the packet-loss harness if one is configured
    /// (see `net/simulator.rs`).
    fn flush_channels(&mut self) {
        let session_addrs: Vec<(u32, SocketAddr, u32)> = self
            .connections
            .iter()
            .map(|c| (c.session_id, c.addr, c.send_sequence))
            .collect();

        for (session_id, addr, _) in session_addrs {
            let Some(set) = self.channels.get_mut(&session_id) else { continue };
            for channel in [Channel::ReliableOrdered, Channel::ReliableUnordered, Channel::Unreliable] {
                for payload in set.drain(channel) {
                    if let Some(sim) = &self.packet_loss {
                        if sim.should_drop(&mut self.rng) {
                            if let Some(session) = self.connections.get_mut(session_id) {
                                session.stats.record_dropped();
                            }
                            continue;
                        }
                    }
                    if let Some(session) = self.connections.get_mut(session_id) {
                        let _ = session.next_send_sequence();
                    }
                    let packet = Packet::new(payload);
                    match packet.serialize() {
                        Ok(bytes) => match self.socket.send_to(&bytes, addr) {
                            Ok(n) => {
                                if let Some(session) = self.connections.get_mut(session_id) {
                                    session.stats.record_sent(n);
                                }
                            }
                            Err(err) => {
                                self.pending_events.push_back(ServerEvent::Error {
                                    message: format!("send to {addr} failed: {err}"),
                                });
                            }
                        },
                        Err(err) => {
                            self.pending_events
                                .push_back(ServerEvent::Error { message: format!("encode failed: {err}") });
                        }
                    }
                }
            }
        }
    }

    fn process_network(&mut self) -> io::Result<()> {
        let mut buf = [0u8; RECV_BUF_LEN];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((len, addr)) => self.handle_datagram(&buf[..len], addr),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn handle_datagram(&mut self, data: &[u8], addr: SocketAddr) {
        let packet = match Packet::deserialize(data) {
            Ok(packet) => packet,
            Err(_) => return,
        };

        let sessions_before = self.connections.total_count();
        let session_id = self.connections.accept(addr).session_id;
        if self.connections.total_count() > sessions_before {
            self.channels.insert(session_id, ChannelSet::new());
            self.pending_events.push_back(ServerEvent::ClientConnecting { addr });
        }

        match packet.payload {
            Payload::Handshake { protocol_version, player_name, password } => {
                self.handle_handshake(session_id, addr, protocol_version, player_name, password)
            }
            Payload::Heartbeat { .. } => {
                let tick = self.world.tick;
                if let Some(session) = self.connections.get_mut(session_id) {
                    session.touch_heartbeat(tick);
                }
            }
            Payload::PositionUpdate { entity_id, position, rotation_compressed } => {
                self.handle_position_update(session_id, entity_id, position, rotation_compressed)
            }
            Payload::AttackIntent { attacker_entity_id, target_entity_id, weapon_id } => {
                self.handle_attack_intent(session_id, attacker_entity_id, target_entity_id, weapon_id)
            }
            Payload::EquipmentUpdate { entity_id, slot, item_type } => {
                self.handle_equipment_update(session_id, entity_id, slot, item_type)
            }
            Payload::ChatMessage { channel, sender_player_id, target_player_id, text } => {
                self.handle_chat_message(channel, sender_player_id, target_player_id, text)
            }
            Payload::EntitySpawnReq(payload) => self.handle_spawn_request(session_id, payload.position, payload.local_id),
            _ => {}
        }
    }

    fn handle_handshake(
        &mut self,
        session_id: u32,
        addr: SocketAddr,
        protocol_version: u32,
        player_name: String,
        password: String,
    ) {
        if let Some(session) = self.connections.get_mut(session_id) {
            session.state = SessionState::Authenticating;
        }
        if self.banned_names.contains(&player_name) {
            self.reject(session_id, addr, SessionError::BadPassword);
            return;
        }
        if protocol_version != worldsim_core::net::PROTOCOL_VERSION as u32 {
            self.reject(
                session_id,
                addr,
                SessionError::VersionMismatch {
                    client: protocol_version,
                    server: worldsim_core::net::PROTOCOL_VERSION as u32,
                },
            );
            return;
        }
        if self.config.requires_password() && password != self.config.password {
            self.reject(session_id, addr, SessionError::BadPassword);
            return;
        }

        let player_id = session_id;
        match self.connections.authenticate(session_id, player_id, player_name) {
            Ok(()) => {
                let handle = self.world.registry.spawn(EntityType::PlayerCharacter, player_id);
                if let Some(session) = self.connections.get_mut(session_id) {
                    session.owned_entities.insert(handle.id());
                }
                self.world.submit(EventKind::PlayerConnected { player_id }, 0, None, player_id, self.now_ms());

                let ack = Payload::HandshakeAck {
                    player_id,
                    current_players: self.connections.connected_count() as u32,
                    max_players: self.config.max_players as u32,
                    world_time_hours: self.world.clock.hour,
                };
                self.enqueue(session_id, Channel::ReliableOrdered, ack);
                self.pending_events
                    .push_back(ServerEvent::ClientConnected { session_id, addr, player_id });
            }
            Err(err) => self.reject(session_id, addr, err),
        }
    }

    fn reject(&mut self, session_id: u32, addr: SocketAddr, err: SessionError) {
        self.enqueue(session_id, Channel::ReliableOrdered, Payload::HandshakeReject { reason_code: err.reason_code() });
        self.flush_channels();
        // `reject` only marks the session `Kicked`, which `cleanup_timed_out`
        // deliberately never sweeps (timeouts and explicit removal are kept
        // distinct) — remove it outright so a bad handshake doesn't leave a
        // session behind forever.
        self.connections.reject(session_id);
        self.connections.remove(session_id);
        self.channels.remove(&session_id);
        self.pending_events
            .push_back(ServerEvent::ConnectionDenied { addr, reason: err.to_string() });
    }

    fn handle_position_update(&mut self, session_id: u32, entity_id: u32, position: [f32; 3], rotation_compressed: u32) {
        if !self.owns(session_id, entity_id) {
            return;
        }
        let Ok(rotation) = decompress_quat(rotation_compressed) else { return };
        self.world.submit(
            EventKind::EntityMoved { position, rotation: rotation.to_array() },
            entity_id,
            None,
            self.player_id_of(session_id),
            self.now_ms(),
        );
    }

    fn handle_attack_intent(&mut self, session_id: u32, attacker_entity_id: u32, target_entity_id: u32, weapon_id: u8) {
        if !self.owns(session_id, attacker_entity_id) {
            return;
        }
        let player_id = self.player_id_of(session_id);
        let now_ms = self.now_ms();
        self.world.submit(EventKind::CombatAction { weapon_id }, attacker_entity_id, Some(target_entity_id), player_id, now_ms);
        self.world.submit(
            EventKind::DamageDealt { amount: 10.0, hitbox: 1 },
            target_entity_id,
            Some(attacker_entity_id),
            player_id,
            now_ms,
        );
    }

    fn handle_equipment_update(&mut self, session_id: u32, entity_id: u32, slot: u8, item_type: Option<u32>) {
        if !self.owns(session_id, entity_id) {
            return;
        }
        let kind = match item_type {
            Some(item_type) => EventKind::ItemEquipped { item_type, slot },
            None => EventKind::ItemUnequipped { slot },
        };
        self.world.submit(kind, entity_id, None, self.player_id_of(session_id), self.now_ms());
    }

    fn handle_spawn_request(&mut self, session_id: u32, position: [f32; 3], local_id: Option<u32>) {
        let player_id = self.player_id_of(session_id);
        self.world.submit(
            EventKind::EntitySpawned {
                entity_type: EntityType::Item as u8,
                owner_player_id: player_id,
                position,
                template_name: None,
                local_id,
            },
            0,
            None,
            player_id,
            self.now_ms(),
        );
    }

    /// Chat is not event-sourced: it routes straight to recipients'
    /// channels rather than going through `World::submit`.
    fn handle_chat_message(&mut self, channel: u8, sender_player_id: u32, target_player_id: Option<u32>, text: String) {
        let recipients: Vec<ChatRecipient> = self
            .connections
            .iter()
            .filter(|c| c.state == SessionState::Authenticated)
            .filter_map(|c| c.player_id.map(|player_id| ChatRecipient {
                player_id,
                faction_id: self.world.registry.owned_by(player_id).map(|e| e.faction_id).next().unwrap_or(0),
            }))
            .collect();

        let targets = chat::route(channel, sender_player_id, target_player_id, &self.world.registry, &recipients);
        let payload = chat::to_payload(channel, sender_player_id, target_player_id, text);

        let session_ids: Vec<u32> = self
            .connections
            .iter()
            .filter(|c| c.player_id.map(|p| targets.contains(&p)).unwrap_or(false))
            .map(|c| c.session_id)
            .collect();
        for session_id in session_ids {
            self.enqueue(session_id, Channel::ReliableOrdered, payload.clone());
        }
    }

    fn owns(&self, session_id: u32, entity_id: u32) -> bool {
        self.connections.get(session_id).map(|s| s.owned_entities.contains(&entity_id)).unwrap_or(false)
    }

    fn player_id_of(&self, session_id: u32) -> u32 {
        self.connections.get(session_id).and_then(|s| s.player_id).unwrap_or(0)
    }

    fn disconnect_session(&mut self, session_id: u32, reason: DisconnectReason) {
        if let Some(session) = self.connections.remove(session_id) {
            for entity_id in session.owned_entities {
                if let Some(entity) = self.world.registry.get_mut(entity_id) {
                    entity.mark_for_removal();
                }
            }
        }
        self.interest.drop_session(session_id);
        self.channels.remove(&session_id);
        self.pending_events.push_back(ServerEvent::ClientDisconnected { session_id, reason });
    }

    /// Executes one operator command from the TUI-driven console, which is
    /// inherently admin.
    pub fn run_admin_command(&mut self, line: &str) -> String {
        let command = match admin::parse_command(line) {
            Ok(command) => command,
            Err(err) => return format_parse_error(&err),
        };
        let now_ms = self.now_ms();
        let outcome = admin::execute(&command, true, &mut self.world, now_ms);
        self.apply_admin_effect(outcome.effect.clone());
        outcome.message
    }

    fn apply_admin_effect(&mut self, effect: AdminEffect) {
        match effect {
            AdminEffect::None => {}
            AdminEffect::Pause => self.paused = true,
            AdminEffect::Unpause => self.paused = false,
            AdminEffect::SetGameSpeed(multiplier) => self.game_speed = multiplier,
            AdminEffect::AnnounceWeather(weather_id) => {
                self.broadcast(
                    Payload::SystemMessage { text: format!("weather changed to {weather_id}") },
                    Channel::ReliableOrdered,
                );
            }
            AdminEffect::Kick(player_id) => self.kick_player(player_id, DisconnectReason::Kicked),
            AdminEffect::Ban(player_id) => {
                if let Some(session) = self.connections.iter().find(|c| c.player_id == Some(player_id)) {
                    if let Some(name) = &session.player_name {
                        self.banned_names.insert(name.clone());
                    }
                }
                self.kick_player(player_id, DisconnectReason::Banned);
            }
            AdminEffect::SetAdmin(player_id, admin_flag) => {
                if let Some(session) = self.connections.iter_mut().find(|c| c.player_id == Some(player_id)) {
                    session.admin = admin_flag;
                }
            }
        }
    }

    fn kick_player(&mut self, player_id: u32, reason: DisconnectReason) {
        let session_id = self.connections.iter().find(|c| c.player_id == Some(player_id)).map(|c| c.session_id);
        if let Some(session_id) = session_id {
            self.disconnect_session(session_id, reason);
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.world.tick,
            paused: self.paused,
            game_speed: self.game_speed,
            client_count: self.connections.connected_count(),
            max_clients: self.config.max_players,
            entity_count: self.world.registry.len(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    pub fn client_infos(&self) -> Vec<crate::tui::ClientInfo> {
        self.connections
            .iter()
            .filter(|c| c.state == SessionState::Authenticated)
            .map(|c| crate::tui::ClientInfo {
                session_id: c.session_id,
                player_id: c.player_id.unwrap_or(0),
                player_name: c.player_name.clone().unwrap_or_default(),
                addr: c.addr.to_string(),
                ping_ms: c.ping_ms,
                admin: c.admin,
            })
            .collect()
    }
}

fn applied_event_payload(event: &WorldEvent) -> Option<(Payload, Channel)> {
    let channel = match event.kind.reliability() {
        Reliability::ReliableOrdered => Channel::ReliableOrdered,
        Reliability::ReliableUnordered => Channel::ReliableUnordered,
        Reliability::Unreliable => Channel::Unreliable,
    };
    let payload = match &event.kind {
        EventKind::EntityDied { killer_entity_id } => {
            Payload::CombatDeath { entity_id: event.entity_id, killer_entity_id: *killer_entity_id }
        }
        EventKind::DamageDealt { amount, hitbox } => Payload::CombatHit {
            attacker_entity_id: event.target_entity_id.unwrap_or(0),
            target_entity_id: event.entity_id,
            amount: *amount,
            hitbox: *hitbox,
        },
        EventKind::BuildingPlaced { template_name, position } => {
            Payload::BuildPlaced { entity_id: event.entity_id, template_name: template_name.clone(), position: *position }
        }
        _ => return None,
    };
    Some((payload, channel))
}

fn format_parse_error(err: &AdminParseError) -> String {
    format!("error: {err}")
}

#[derive(Debug, Clone, Copy)]
pub struct ServerStats {
    pub tick: u64,
    pub paused: bool,
    pub game_speed: f32,
    pub client_count: usize,
    pub max_clients: usize,
    pub entity_count: usize,
    pub uptime_secs: u64,
}
