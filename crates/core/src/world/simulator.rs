use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::entity::{Entity, EntityRegistry, EntityType, Health};
use crate::error::EventRejection;
use crate::event::{EventKind, EventLog, EventQueue, Reliability, WorldEvent};
use crate::snapshot::{EntitySnapshot, SnapshotStore, WorldSnapshot, SNAPSHOT_INTERVAL_TICKS};

use super::clock::WorldClock;
use super::economy::Economy;
use super::faction::FactionRelations;
use super::zone::{Zone, ZoneIntent, ZoneManager};

/// Result of one `simulate_tick` call.
#[derive(Debug, Clone)]
pub struct TickResult {
    pub tick_id: u64,
    pub success: bool,
    pub state_version: u64,
    pub events_processed: usize,
    pub entities_cleaned: usize,
    pub error: Option<String>,
}

/// The world events a caller wants broadcast after a tick, paired with the
/// delivery guarantee the transport dispatcher should use (surfaced via
/// [`EventKind::reliability`]).
pub struct AppliedEvent {
    pub event: WorldEvent,
    pub reliability: Reliability,
}

/// Owns the registry, event log/queue, snapshot store, and the small
/// per-tick subsystems (clock, zones, factions, economy), and runs the
/// fixed-order per-tick pipeline. A single exclusive lock around a `World`
/// (held by its owner, typically the server's simulator thread) keeps the
/// world, entity registry, and event log behind one exclusive lock.
pub struct World {
    pub world_id: u32,
    pub tick: u64,
    pub state_version: u64,
    pub clock: WorldClock,
    pub registry: EntityRegistry,
    pub zones: ZoneManager,
    pub factions: FactionRelations,
    pub economy: Economy,
    pub queue: EventQueue,
    pub log: EventLog,
    pub snapshots: SnapshotStore,
    pub pvp_enabled: bool,
    rng: StdRng,
}

impl World {
    pub fn new(world_id: u32, pvp_enabled: bool) -> Self {
        Self {
            world_id,
            tick: 0,
            state_version: 0,
            clock: WorldClock::new(),
            registry: EntityRegistry::new(),
            zones: ZoneManager::new(),
            factions: FactionRelations::new(),
            economy: Economy::new(),
            queue: EventQueue::new(),
            log: EventLog::in_memory(),
            snapshots: SnapshotStore::new(),
            pvp_enabled,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    pub fn register_zone(&mut self, zone: Zone) {
        self.zones.register_zone(zone);
    }

    /// Thread-safe submission entry point. Threadsafe by construction: it
    /// only touches `self.queue`, which uses interior mutability, so this
    /// takes `&self`.
    pub fn submit(
        &self,
        kind: EventKind,
        entity_id: u32,
        target_entity_id: Option<u32>,
        source_player_id: u32,
        submitted_at_ms: u64,
    ) -> u64 {
        self.queue
            .submit(kind, entity_id, target_entity_id, source_player_id, submitted_at_ms)
    }

    /// Runs the fixed-order per-tick pipeline. Per-client AOI deltas are
    /// the interest manager's job and run against the post-tick world from
    /// the caller, not as part of this pipeline.
    pub fn simulate_tick(&mut self, delta_seconds: f32, now_ms: u64) -> TickResult {
        // 1. Increment current_tick, state_version.
        self.tick += 1;
        self.state_version += 1;

        // 2. Advance world-time.
        self.clock.advance(delta_seconds);

        // 3. Zone subsystem update; spawn intents become entities directly
        // (the zone subsystem is server-trusted, unlike client-submitted
        // events, so it does not go through `apply_event`'s rejection path).
        let intents = self.zones.advance(delta_seconds, &mut self.rng);
        for intent in intents {
            match intent {
                ZoneIntent::SpawnNpc { position, .. } => {
                    let handle = self.registry.spawn(EntityType::Npc, 0);
                    if let Some(entity) = self.registry.get_mut(handle.id()) {
                        entity.position = position;
                    }
                }
            }
        }

        // 4. Per-type entity update: NPCs without a current order idle in
        // place. Left intentionally minimal.
        for entity in self.registry.iter_mut() {
            entity.last_update_tick = self.tick;
        }

        // 5. Faction relation decay.
        self.factions.decay(delta_seconds);

        // 6. Economy.
        self.economy.advance(&mut self.rng);

        // 7. Drain and apply queued events.
        let pending = self.queue.drain();
        let mut events_processed = 0;
        for item in pending {
            let mut event = item.into_world_event(self.tick);
            match apply_event(
                &mut self.registry,
                &mut self.factions,
                &mut self.clock,
                self.pvp_enabled,
                &event,
            ) {
                Ok(()) => event.mark_applied(now_ms),
                Err(reason) => event.mark_rejected(now_ms, reason),
            }
            events_processed += 1;
            if let Err(err) = self.log.append(event) {
                return TickResult {
                    tick_id: self.tick,
                    success: false,
                    state_version: self.state_version,
                    events_processed,
                    entities_cleaned: 0,
                    error: Some(err.to_string()),
                };
            }
        }

        // 8. Remove entities marked for removal.
        let cleaned = self.registry.cleanup_marked();

        // 9. Periodic snapshot.
        if self.tick % SNAPSHOT_INTERVAL_TICKS == 0 {
            self.capture_snapshot(now_ms);
        }

        TickResult {
            tick_id: self.tick,
            success: true,
            state_version: self.state_version,
            events_processed,
            entities_cleaned: cleaned.len(),
            error: None,
        }
    }

    /// Applied and rejected events from the tick just run, paired with the
    /// reliability channel the dispatcher should broadcast them on (pipeline
    /// step 10's input). Rejected events are included so admin/debug tooling
    /// can surface them; broadcast-worthy filtering (`applied` only) is the
    /// caller's job.
    pub fn last_tick_applied_events(&self) -> Vec<AppliedEvent> {
        self.log
            .events_in_range(self.tick, self.tick)
            .into_iter()
            .map(|event| AppliedEvent {
                reliability: event.kind.reliability(),
                event: event.clone(),
            })
            .collect()
    }

    pub fn capture_snapshot(&mut self, now_ms: u64) {
        let entities = self.registry.iter().map(EntitySnapshot::from).collect();
        let faction_relations = self
            .factions
            .iter()
            .map(|((a, b), value)| (WorldSnapshot::relation_key(*a, *b), *value))
            .collect();
        let active_zone_ids = self.zones.zones().iter().map(|z| z.zone_id).collect();
        let economy_prices = self.economy.snapshot();

        self.snapshots.push(WorldSnapshot {
            world_id: self.world_id,
            tick_id: self.tick,
            state_version: self.state_version,
            timestamp_ms: now_ms,
            world_time_hours: self.clock.hour,
            entities,
            faction_relations,
            active_zone_ids,
            economy_prices,
        });
    }

    /// Restores entity/economy state from a snapshot, without touching the
    /// event log (callers performing a full replay drive `log.replay_to_tick`
    /// afterward, per §4.2's contract).
    pub fn restore_from_snapshot(&mut self, snapshot: &WorldSnapshot) {
        self.tick = snapshot.tick_id;
        self.state_version = snapshot.state_version;
        self.clock.hour = snapshot.world_time_hours;
        self.registry = EntityRegistry::new();
        for entity_snapshot in &snapshot.entities {
            let mut entity = Entity::new(
                entity_snapshot.net_id,
                entity_snapshot.entity_type(),
                entity_snapshot.owner_player_id,
            );
            entity.position = Vec3::from_array(entity_snapshot.position);
            entity.rotation = Quat::from_array(entity_snapshot.rotation);
            entity.velocity = Vec3::from_array(entity_snapshot.velocity);
            entity.faction_id = entity_snapshot.faction_id;
            entity.health = entity_snapshot.health.map(|h| Health {
                head: h[0],
                chest: h[1],
                limbs: h[2],
            });
            let _ = self.registry.register(entity_snapshot.net_id, entity);
        }
        self.economy.restore(&snapshot.economy_prices);
    }
}

/// Applies one event's pure transform to world state. Deterministic given
/// (pre-event state, event); on rejection, state is left untouched.
fn apply_event(
    registry: &mut EntityRegistry,
    factions: &mut FactionRelations,
    clock: &mut WorldClock,
    pvp_enabled: bool,
    event: &WorldEvent,
) -> Result<(), EventRejection> {
    match &event.kind {
        EventKind::EntitySpawned {
            entity_type,
            owner_player_id,
            position,
            template_name,
            ..
        } => {
            let handle = registry.spawn(EntityType::from(*entity_type), *owner_player_id);
            if let Some(entity) = registry.get_mut(handle.id()) {
                entity.position = Vec3::from_array(*position);
                entity.template_name = template_name.clone();
            }
            Ok(())
        }

        EventKind::EntityRemoved => {
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            require_ownership(entity, event.source_player_id)?;
            entity.mark_for_removal();
            Ok(())
        }

        EventKind::EntityDied { .. } => {
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            entity.mark_for_removal();
            Ok(())
        }

        EventKind::EntityMoved { position, rotation } => {
            let tick = registry
                .get(event.entity_id)
                .ok_or(EventRejection::MissingEntity)?
                .last_update_tick;
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            require_ownership(entity, event.source_player_id)?;
            entity.move_to(Vec3::from_array(*position), tick);
            entity.rotation = quat_from_array_checked(*rotation)?;
            Ok(())
        }

        EventKind::EntityTeleported { position } => {
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            entity.position = Vec3::from_array(*position);
            entity.dirty = true;
            Ok(())
        }

        EventKind::DamageDealt { amount, hitbox } => {
            if *amount < 0.0 {
                return Err(EventRejection::InvalidPayload);
            }
            if !pvp_enabled && is_player_vs_player(registry, event) {
                return Err(EventRejection::PvpDisabled);
            }
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            let health = entity.health.as_mut().ok_or(EventRejection::InvalidPayload)?;
            match hitbox {
                0 => health.head -= amount,
                1 => health.chest -= amount,
                2 => health.limbs -= amount,
                _ => return Err(EventRejection::InvalidPayload),
            }
            if health.is_dead() {
                entity.mark_for_removal();
            }
            entity.dirty = true;
            Ok(())
        }

        EventKind::HealingApplied { amount } => {
            if *amount < 0.0 {
                return Err(EventRejection::InvalidPayload);
            }
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            let health = entity.health.as_mut().ok_or(EventRejection::InvalidPayload)?;
            health.head = (health.head + amount).min(100.0);
            health.chest = (health.chest + amount).min(100.0);
            health.limbs = (health.limbs + amount).min(100.0);
            entity.dirty = true;
            Ok(())
        }

        EventKind::InventoryChanged {
            item_type,
            delta_quantity,
        } => {
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            require_ownership(entity, event.source_player_id)?;
            if let Some(slot) = entity.inventory.iter_mut().find(|s| s.item_type == *item_type) {
                let updated = slot.quantity as i64 + *delta_quantity as i64;
                if updated < 0 {
                    return Err(EventRejection::InvalidPayload);
                }
                slot.quantity = updated as u32;
            } else {
                if *delta_quantity < 0 {
                    return Err(EventRejection::InvalidPayload);
                }
                entity.inventory.push(crate::entity::InventorySlot {
                    item_type: *item_type,
                    quantity: *delta_quantity as u32,
                });
            }
            entity.dirty = true;
            Ok(())
        }

        EventKind::ItemEquipped { item_type, slot } => {
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            require_ownership(entity, event.source_player_id)?;
            match slot {
                0 => entity.equipment.weapon = Some(*item_type),
                1 => entity.equipment.armor = Some(*item_type),
                2 => entity.equipment.accessory = Some(*item_type),
                _ => return Err(EventRejection::InvalidPayload),
            }
            entity.dirty = true;
            Ok(())
        }

        EventKind::ItemUnequipped { slot } => {
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            require_ownership(entity, event.source_player_id)?;
            match slot {
                0 => entity.equipment.weapon = None,
                1 => entity.equipment.armor = None,
                2 => entity.equipment.accessory = None,
                _ => return Err(EventRejection::InvalidPayload),
            }
            entity.dirty = true;
            Ok(())
        }

        EventKind::FactionRelationChanged { other_faction_id, delta } => {
            let entity = registry.get(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            factions.apply_delta(entity.faction_id, *other_faction_id, *delta);
            Ok(())
        }

        EventKind::FactionMemberJoined { faction_id } | EventKind::FactionMemberLeft { faction_id } => {
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            entity.faction_id = if matches!(event.kind, EventKind::FactionMemberLeft { .. }) {
                0
            } else {
                *faction_id
            };
            Ok(())
        }

        EventKind::BuildingPlaced { template_name, position } => {
            let handle = registry.spawn(EntityType::Building, event.source_player_id);
            if let Some(entity) = registry.get_mut(handle.id()) {
                entity.position = Vec3::from_array(*position);
                entity.template_name = Some(template_name.clone());
            }
            Ok(())
        }

        EventKind::BuildingDestroyed => {
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            entity.mark_for_removal();
            Ok(())
        }

        EventKind::PlayerControlTransferred { new_owner_player_id } => {
            let entity = registry.get_mut(event.entity_id).ok_or(EventRejection::MissingEntity)?;
            require_ownership(entity, event.source_player_id)?;
            entity.owner_player_id = *new_owner_player_id;
            Ok(())
        }

        EventKind::TimeAdvanced { game_hours } => {
            clock.apply_delta(*game_hours);
            Ok(())
        }

        // Informational events carry no entity-state transform of their own;
        // applying them always succeeds (they exist to be logged/broadcast).
        EventKind::CombatAction { .. }
        | EventKind::StatusEffectApplied { .. }
        | EventKind::StatusEffectRemoved { .. }
        | EventKind::ItemDropped { .. }
        | EventKind::ItemPickedUp { .. }
        | EventKind::InteractionStarted { .. }
        | EventKind::InteractionCompleted { .. }
        | EventKind::ZoneChanged { .. }
        | EventKind::PlayerConnected { .. }
        | EventKind::PlayerDisconnected { .. } => Ok(()),
    }
}

fn require_ownership(entity: &Entity, source_player_id: u32) -> Result<(), EventRejection> {
    if entity.may_be_mutated_by(source_player_id) {
        Ok(())
    } else {
        Err(EventRejection::PermissionDenied)
    }
}

fn quat_from_array_checked(values: [f32; 4]) -> Result<Quat, EventRejection> {
    let quat = Quat::from_array(values);
    if quat.is_finite() {
        Ok(quat)
    } else {
        Err(EventRejection::InvalidPayload)
    }
}

fn is_player_vs_player(registry: &EntityRegistry, event: &WorldEvent) -> bool {
    let attacker_is_player = event.source_player_id != 0;
    let target_is_player = registry
        .get(event.entity_id)
        .map(|e| e.entity_type == EntityType::PlayerCharacter && e.owner_player_id != 0)
        .unwrap_or(false);
    attacker_is_player && target_is_player
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_tick_applies_in_order() {
        let mut world = World::new(1, true);
        world.submit(
            EventKind::EntitySpawned {
                entity_type: EntityType::Item as u8,
                owner_player_id: 0,
                position: [0.0, 0.0, 0.0],
                template_name: None,
                local_id: None,
            },
            0,
            None,
            0,
            0,
        );
        let result = world.simulate_tick(0.05, 0);
        assert!(result.success);
        assert_eq!(result.events_processed, 1);
        assert_eq!(world.registry.len(), 1);
    }

    #[test]
    fn non_owner_cannot_move_entity() {
        let mut world = World::new(1, true);
        let handle = world.registry.spawn(EntityType::PlayerCharacter, 1);
        world.submit(
            EventKind::EntityMoved {
                position: [5.0, 0.0, 0.0],
                rotation: [0.0, 0.0, 0.0, 1.0],
            },
            handle.id(),
            None,
            99,
            0,
        );
        let result = world.simulate_tick(0.05, 0);
        assert_eq!(result.events_processed, 1);
        let applied = world.log.recent(1)[0];
        assert!(!applied.applied);
    }

    #[test]
    fn pvp_disabled_rejects_player_damage() {
        let mut world = World::new(1, false);
        let victim = world.registry.spawn(EntityType::PlayerCharacter, 2);
        world.submit(
            EventKind::DamageDealt { amount: 10.0, hitbox: 1 },
            victim.id(),
            None,
            7,
            0,
        );
        world.simulate_tick(0.05, 0);
        let applied = world.log.recent(1)[0];
        assert!(!applied.applied);
        assert_eq!(
            applied.rejection_reason.as_deref(),
            Some("pvp is disabled on this server")
        );
    }

    #[test]
    fn damage_below_death_threshold_marks_entity_for_removal() {
        let mut world = World::new(1, true);
        let npc = world.registry.spawn(EntityType::Npc, 0);
        world.submit(
            EventKind::DamageDealt { amount: 250.0, hitbox: 1 },
            npc.id(),
            None,
            0,
            0,
        );
        world.simulate_tick(0.05, 0);
        assert!(world.registry.get(npc.id()).is_none());
    }

    #[test]
    fn snapshot_captured_on_interval() {
        let mut world = World::new(1, true);
        for _ in 0..SNAPSHOT_INTERVAL_TICKS {
            world.simulate_tick(0.05, 0);
        }
        assert_eq!(world.snapshots.len(), 1);
    }
}
