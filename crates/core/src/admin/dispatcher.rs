use glam::Vec3;

use crate::event::EventKind;
use crate::world::{zone_id_for_position, World};

use super::command::AdminCommand;

/// A heal command restores every hitbox to full, overriding any accrued
/// damage rather than adding a fixed amount.
const FULL_HEAL_AMOUNT: f32 = 10_000.0;

/// Side effects an [`AdminCommand`] requests outside of `World` itself —
/// session/connection management and server-loop control aren't part of
/// the replayable world-state model, so they are reported back to the
/// caller (the server binary, which owns both the `World` and the
/// `ConnectionManager`/tick-loop pacing) rather than applied here.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminEffect {
    None,
    Pause,
    Unpause,
    SetGameSpeed(f32),
    /// No world-state field backs weather; this is surfaced as an
    /// announcement only, a `SystemMessage` for a cosmetic operator action.
    AnnounceWeather(u32),
    Kick(u32),
    Ban(u32),
    SetAdmin(u32, bool),
}

/// Result of executing one admin command.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminOutcome {
    pub success: bool,
    /// The tick this command's events will be applied at, if it submitted
    /// any (world events are drained and applied at the *start* of the next
    /// `simulate_tick` call, so this is `world.tick + 1`).
    pub tick_id: Option<u64>,
    pub message: String,
    pub effect: AdminEffect,
}

impl AdminOutcome {
    fn denied() -> Self {
        Self {
            success: false,
            tick_id: None,
            message: "executor is not an admin".to_string(),
            effect: AdminEffect::None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self { success: false, tick_id: None, message: message.into(), effect: AdminEffect::None }
    }

    fn ok(message: impl Into<String>) -> Self {
        Self { success: true, tick_id: None, message: message.into(), effect: AdminEffect::None }
    }

    fn applied(world: &World, message: impl Into<String>) -> Self {
        Self {
            success: true,
            tick_id: Some(world.tick + 1),
            message: message.into(),
            effect: AdminEffect::None,
        }
    }
}

fn entity_for_player(world: &World, player_id: u32) -> Option<u32> {
    world.registry.owned_by(player_id).map(|e| e.net_id).next()
}

/// Executes one already-parsed command; a non-admin executor cannot cause
/// a state change. `now_ms` stamps the submitted event's `submitted_at`
/// field.
pub fn execute(
    command: &AdminCommand,
    executor_is_admin: bool,
    world: &mut World,
    now_ms: u64,
) -> AdminOutcome {
    if !executor_is_admin {
        return AdminOutcome::denied();
    }

    match command {
        AdminCommand::Teleport { player_id, position } => match entity_for_player(world, *player_id) {
            Some(entity_id) => {
                world.submit(EventKind::EntityTeleported { position: *position }, entity_id, None, 0, now_ms);
                let zone_id = zone_id_for_position(Vec3::from_array(*position));
                world.submit(EventKind::ZoneChanged { zone_id }, entity_id, None, 0, now_ms);
                AdminOutcome::applied(world, format!("teleported player {player_id}"))
            }
            None => AdminOutcome::failed(format!("player {player_id} has no entity")),
        },

        AdminCommand::Heal { player_id } => match entity_for_player(world, *player_id) {
            Some(entity_id) => {
                world.submit(
                    EventKind::HealingApplied { amount: FULL_HEAL_AMOUNT },
                    entity_id,
                    None,
                    0,
                    now_ms,
                );
                AdminOutcome::applied(world, format!("healed player {player_id}"))
            }
            None => AdminOutcome::failed(format!("player {player_id} has no entity")),
        },

        AdminCommand::Kill { player_id } => match entity_for_player(world, *player_id) {
            Some(entity_id) => {
                world.submit(
                    EventKind::EntityDied { killer_entity_id: None },
                    entity_id,
                    None,
                    0,
                    now_ms,
                );
                AdminOutcome::applied(world, format!("killed player {player_id}"))
            }
            None => AdminOutcome::failed(format!("player {player_id} has no entity")),
        },

        AdminCommand::SetTime { hour } => {
            let delta = (hour.rem_euclid(24.0) - world.clock.hour).rem_euclid(24.0);
            world.submit(EventKind::TimeAdvanced { game_hours: delta }, 0, None, 0, now_ms);
            AdminOutcome::applied(world, format!("time set to {hour}"))
        }

        AdminCommand::NextDay => {
            world.submit(EventKind::TimeAdvanced { game_hours: 24.0 }, 0, None, 0, now_ms);
            AdminOutcome::applied(world, "advanced to next day")
        }

        AdminCommand::SpawnItem { item_type, position } => {
            world.submit(
                EventKind::EntitySpawned {
                    entity_type: crate::entity::EntityType::Item as u8,
                    owner_player_id: 0,
                    position: *position,
                    template_name: Some(format!("item:{item_type}")),
                    local_id: None,
                },
                0,
                None,
                0,
                now_ms,
            );
            AdminOutcome::applied(world, format!("spawned item {item_type}"))
        }

        AdminCommand::SpawnNpc { template_name, position } => {
            world.submit(
                EventKind::EntitySpawned {
                    entity_type: crate::entity::EntityType::Npc as u8,
                    owner_player_id: 0,
                    position: *position,
                    template_name: Some(template_name.clone()),
                    local_id: None,
                },
                0,
                None,
                0,
                now_ms,
            );
            AdminOutcome::applied(world, format!("spawned npc {template_name}"))
        }

        AdminCommand::SetSpeed { multiplier } => AdminOutcome {
            success: true,
            tick_id: None,
            message: format!("game speed set to {multiplier}x"),
            effect: AdminEffect::SetGameSpeed(*multiplier),
        },

        AdminCommand::Pause => {
            AdminOutcome { success: true, tick_id: None, message: "paused".to_string(), effect: AdminEffect::Pause }
        }

        AdminCommand::Unpause => AdminOutcome {
            success: true,
            tick_id: None,
            message: "unpaused".to_string(),
            effect: AdminEffect::Unpause,
        },

        AdminCommand::SetWeather { weather_id } => AdminOutcome {
            success: true,
            tick_id: None,
            message: format!("weather set to {weather_id}"),
            effect: AdminEffect::AnnounceWeather(*weather_id),
        },

        AdminCommand::List => AdminOutcome::ok(format!("{} entities registered", world.registry.len())),

        AdminCommand::Stats => AdminOutcome::ok(format!(
            "tick={} state_version={} entities={}",
            world.tick,
            world.state_version,
            world.registry.len()
        )),

        AdminCommand::Info => AdminOutcome::ok(format!(
            "world {} | day {} hour {:.1}",
            world.world_id, world.clock.day, world.clock.hour
        )),

        AdminCommand::Help => AdminOutcome::ok(
            "teleport heal kill settime setspeed pause unpause setweather nextday \
             spawnitem spawnnpc list stats info help debug clear kick ban setadmin"
                .to_string(),
        ),

        AdminCommand::Debug => AdminOutcome::ok(format!("pending_events={}", world.queue.pending_len())),

        AdminCommand::Clear => AdminOutcome::ok(""),

        AdminCommand::Kick { player_id } => AdminOutcome {
            success: true,
            tick_id: None,
            message: format!("kicked player {player_id}"),
            effect: AdminEffect::Kick(*player_id),
        },

        AdminCommand::Ban { player_id } => AdminOutcome {
            success: true,
            tick_id: None,
            message: format!("banned player {player_id}"),
            effect: AdminEffect::Ban(*player_id),
        },

        AdminCommand::SetAdmin { player_id, admin } => AdminOutcome {
            success: true,
            tick_id: None,
            message: format!("player {player_id} admin={admin}"),
            effect: AdminEffect::SetAdmin(*player_id, *admin),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityType;

    #[test]
    fn non_admin_executor_cannot_mutate_world() {
        let mut world = World::new(1, true);
        let outcome = execute(&AdminCommand::NextDay, false, &mut world, 0);
        assert!(!outcome.success);
        assert_eq!(world.queue.pending_len(), 0);
    }

    #[test]
    fn teleport_submits_event_for_the_players_entity() {
        let mut world = World::new(1, true);
        let handle = world.registry.spawn(EntityType::PlayerCharacter, 7);
        let outcome = execute(
            &AdminCommand::Teleport { player_id: 7, position: [1.0, 2.0, 3.0] },
            true,
            &mut world,
            0,
        );
        assert!(outcome.success);
        assert_eq!(outcome.tick_id, Some(world.tick + 1));
        assert_eq!(world.queue.pending_len(), 2);
        world.simulate_tick(0.05, 0);
        let entity = world.registry.get(handle.id()).unwrap();
        assert_eq!(entity.position.to_array(), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn teleport_also_submits_a_zone_changed_event() {
        let mut world = World::new(1, true);
        world.registry.spawn(EntityType::PlayerCharacter, 7);
        execute(&AdminCommand::Teleport { player_id: 7, position: [1.0, 2.0, 3.0] }, true, &mut world, 0);
        world.simulate_tick(0.05, 0);
        assert!(world
            .last_tick_applied_events()
            .iter()
            .any(|applied| matches!(applied.event.kind, EventKind::ZoneChanged { .. })));
    }

    #[test]
    fn teleport_without_a_player_entity_fails_cleanly() {
        let mut world = World::new(1, true);
        let outcome = execute(
            &AdminCommand::Teleport { player_id: 999, position: [0.0, 0.0, 0.0] },
            true,
            &mut world,
            0,
        );
        assert!(!outcome.success);
    }

    #[test]
    fn settime_advances_clock_to_requested_hour() {
        let mut world = World::new(1, true);
        execute(&AdminCommand::SetTime { hour: 12.0 }, true, &mut world, 0);
        world.simulate_tick(0.0, 0);
        assert!((world.clock.hour - 12.0).abs() < 1e-3);
    }

    #[test]
    fn pause_reports_server_level_effect_without_touching_world() {
        let mut world = World::new(1, true);
        let outcome = execute(&AdminCommand::Pause, true, &mut world, 0);
        assert_eq!(outcome.effect, AdminEffect::Pause);
        assert_eq!(world.queue.pending_len(), 0);
    }
}
