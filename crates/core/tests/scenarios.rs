//! End-to-end scenarios combining `World`, `InterestManager`, and the admin
//! interpreter the way `GameServer` drives them: AOI spawn/move, snapshot +
//! replay, combat death, and admin teleport, none of which are already
//! exercised at the single-module level inside `src/`.

use std::collections::HashSet;

use glam::Vec3;

use worldsim_core::admin::{self, AdminCommand};
use worldsim_core::entity::EntityType;
use worldsim_core::event::EventKind;
use worldsim_core::interest::{InterestManager, ZoneGrid};
use worldsim_core::world::World;

fn owned(id: u32) -> HashSet<u32> {
    let mut set = HashSet::new();
    set.insert(id);
    set
}

/// Two observers, one moving entity — the second observer should see a
/// spawn the tick the entity enters range, then position updates as it
/// moves, never a despawn while still in range.
#[test]
fn entity_entering_aoi_then_moving_produces_spawn_then_updates() {
    let mut world = World::new(1, true);
    let player_a = world.registry.spawn(EntityType::PlayerCharacter, 1);
    let player_b = world.registry.spawn(EntityType::PlayerCharacter, 2);
    world.registry.get_mut(player_b.id()).unwrap().position = Vec3::new(10.0, 0.0, 0.0);

    let mut grid = ZoneGrid::new();
    let mut interest = InterestManager::new();

    grid.rebuild(&world.registry);
    let delta = interest.compute_delta(2, &owned(player_b.id()), &world.registry, &grid);
    assert!(delta.spawns.iter().any(|s| s.entity_id == player_a.id()));

    world.submit(
        EventKind::EntityMoved { position: [5.0, 0.0, 0.0], rotation: [0.0, 0.0, 0.0, 1.0] },
        player_a.id(),
        None,
        1,
        0,
    );
    world.simulate_tick(0.05, 0);
    grid.rebuild(&world.registry);

    let delta = interest.compute_delta(2, &owned(player_b.id()), &world.registry, &grid);
    assert!(delta.spawns.is_empty());
    assert!(delta.despawns.is_empty());
    assert!(delta.position_batch.iter().any(|p| p.entity_id == player_a.id()));
}

/// Snapshot every `SNAPSHOT_INTERVAL_TICKS`, then replay up to an
/// intermediate tick should reproduce the entity state at that tick.
#[test]
fn snapshot_and_replay_reproduces_world_state_at_target_tick() {
    use worldsim_core::snapshot::SNAPSHOT_INTERVAL_TICKS;

    let mut world = World::new(1, true);
    let handle = world.registry.spawn(EntityType::Item, 0);

    let target_tick = SNAPSHOT_INTERVAL_TICKS * 3;
    let total_ticks = target_tick + SNAPSHOT_INTERVAL_TICKS / 2;
    let mut expected_position_at_target = Vec3::ZERO;
    for tick in 0..total_ticks {
        if tick % 37 == 0 {
            world.submit(
                EventKind::EntityTeleported { position: [tick as f32, 0.0, 0.0] },
                handle.id(),
                None,
                0,
                tick,
            );
        }
        let result = world.simulate_tick(0.05, tick);
        if result.tick_id == target_tick {
            expected_position_at_target = world.registry.get(handle.id()).unwrap().position;
        }
    }

    assert!(world.snapshots.len() >= 3);

    let snapshot = world.snapshots.nearest_at_or_before(target_tick).unwrap().clone();
    let replay_events = world.log.replay_to_tick(target_tick);

    let mut replayed_world = World::new(1, true);
    replayed_world.restore_from_snapshot(&snapshot);
    for event in replay_events {
        if event.tick_id <= snapshot.tick_id {
            continue;
        }
        if let EventKind::EntityTeleported { position } = &event.kind {
            if let Some(entity) = replayed_world.registry.get_mut(event.entity_id) {
                entity.position = Vec3::from_array(*position);
            }
        }
    }

    let actual = replayed_world.registry.get(handle.id()).unwrap().position;
    assert_eq!(expected_position_at_target, actual);
}

/// An attack against another player's entity applies damage, marks it
/// dirty for broadcast, and removal follows once chest health crosses the
/// death threshold.
#[test]
fn combat_applies_damage_and_marks_dead_entity_for_removal() {
    let mut world = World::new(1, true);
    let attacker = world.registry.spawn(EntityType::PlayerCharacter, 1);
    let victim = world.registry.spawn(EntityType::PlayerCharacter, 2);

    world.submit(EventKind::DamageDealt { amount: 20.0, hitbox: 1 }, victim.id(), None, 1, 0);
    world.simulate_tick(0.05, 0);

    let applied = world.log.recent(1)[0];
    assert!(applied.applied);
    let entity = world.registry.get(victim.id()).unwrap();
    assert_eq!(entity.health.unwrap().chest, 80.0);
    assert!(entity.dirty);
    assert!(!entity.marked_for_removal);

    world.submit(EventKind::DamageDealt { amount: 200.0, hitbox: 1 }, victim.id(), None, 1, 0);
    world.simulate_tick(0.05, 0);
    assert!(world.registry.get(victim.id()).is_none());

    let _ = attacker;
}

/// An admin teleport submits an event that is applied on the very next
/// tick, and the interest manager broadcasts the new position to observers.
#[test]
fn admin_teleport_is_applied_next_tick_and_broadcast() {
    let mut world = World::new(1, true);
    let target = world.registry.spawn(EntityType::PlayerCharacter, 42);
    let observer = world.registry.spawn(EntityType::PlayerCharacter, 99);

    let outcome = admin::execute(
        &AdminCommand::Teleport { player_id: 42, position: [100.0, 0.0, 200.0] },
        true,
        &mut world,
        0,
    );
    assert!(outcome.success);
    assert_eq!(outcome.tick_id, Some(world.tick + 1));

    let result = world.simulate_tick(0.05, 0);
    assert_eq!(outcome.tick_id, Some(result.tick_id));

    let entity = world.registry.get(target.id()).unwrap();
    assert_eq!(entity.position.to_array(), [100.0, 0.0, 200.0]);

    assert!(world
        .last_tick_applied_events()
        .iter()
        .any(|applied| matches!(applied.event.kind, EventKind::ZoneChanged { .. })));

    let mut grid = ZoneGrid::new();
    grid.rebuild(&world.registry);
    let mut interest = InterestManager::new();
    let delta = interest.compute_delta(1, &owned(observer.id()), &world.registry, &grid);
    assert!(delta.spawns.iter().any(|s| s.entity_id == target.id()));
}
