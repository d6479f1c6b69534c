use glam::Vec3;

/// Side length in meters of one interest/spawn-zone cell (also used by
/// `interest::zone_grid` for the AOI prefilter).
pub const ZONE_SIZE: f32 = 200.0;

const NPC_SPAWN_INTERVAL_SECS: f32 = 30.0;

/// A single NPC spawn region. Minimal on purpose — the zone/NPC
/// subsystems are collaborators, not a combat/AI system to flesh out.
#[derive(Debug, Clone)]
pub struct Zone {
    pub zone_id: u32,
    pub center: Vec3,
    pub npc_cap: u32,
    pub current_npc_count: u32,
    spawn_timer: f32,
}

impl Zone {
    pub fn new(zone_id: u32, center: Vec3, npc_cap: u32) -> Self {
        Self {
            zone_id,
            center,
            npc_cap,
            current_npc_count: 0,
            spawn_timer: 0.0,
        }
    }

    pub fn grid_coord(&self) -> (i32, i32) {
        grid_coord(self.center)
    }
}

pub fn grid_coord(position: Vec3) -> (i32, i32) {
    (
        (position.x / ZONE_SIZE).floor() as i32,
        (position.z / ZONE_SIZE).floor() as i32,
    )
}

/// Packs a position's grid cell into a single id, for events that need to
/// name "which zone" a position falls in without requiring a registered
/// [`Zone`] to exist there (most of the map isn't inside an NPC spawn zone).
/// Each axis is offset to an unsigned range and packed into one half of a
/// `u32`, so adjacent cells get adjacent-ish but distinct ids.
pub fn zone_id_for_position(position: Vec3) -> u32 {
    let (cx, cy) = grid_coord(position);
    let ux = (cx as i64 - i32::MIN as i64) as u32;
    let uy = (cy as i64 - i32::MIN as i64) as u32;
    ((ux & 0xFFFF) << 16) | (uy & 0xFFFF)
}

/// Intent raised by [`ZoneManager::advance`] for the simulator to act on
/// (pipeline step 3: "collaborators may enqueue spawn events").
#[derive(Debug, Clone)]
pub enum ZoneIntent {
    SpawnNpc { zone_id: u32, position: Vec3 },
}

#[derive(Debug, Default)]
pub struct ZoneManager {
    zones: Vec<Zone>,
}

impl ZoneManager {
    pub fn new() -> Self {
        Self { zones: Vec::new() }
    }

    pub fn register_zone(&mut self, zone: Zone) {
        self.zones.push(zone);
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone_mut(&mut self, zone_id: u32) -> Option<&mut Zone> {
        self.zones.iter_mut().find(|z| z.zone_id == zone_id)
    }

    /// Advances each zone's spawn timer by `delta_seconds`, emitting a
    /// `SpawnNpc` intent whenever a zone is under its NPC cap and its timer
    /// has elapsed.
    pub fn advance(&mut self, delta_seconds: f32, rng: &mut impl rand::Rng) -> Vec<ZoneIntent> {
        let mut intents = Vec::new();
        for zone in &mut self.zones {
            if zone.current_npc_count >= zone.npc_cap {
                zone.spawn_timer = 0.0;
                continue;
            }
            zone.spawn_timer += delta_seconds;
            if zone.spawn_timer < NPC_SPAWN_INTERVAL_SECS {
                continue;
            }
            zone.spawn_timer = 0.0;

            let offset = Vec3::new(
                rng.gen_range(-ZONE_SIZE / 2.0..ZONE_SIZE / 2.0),
                0.0,
                rng.gen_range(-ZONE_SIZE / 2.0..ZONE_SIZE / 2.0),
            );
            intents.push(ZoneIntent::SpawnNpc {
                zone_id: zone.zone_id,
                position: zone.center + offset,
            });
            zone.current_npc_count += 1;
        }
        intents
    }

    pub fn notify_npc_despawned(&mut self, zone_id: u32) {
        if let Some(zone) = self.zone_mut(zone_id) {
            zone.current_npc_count = zone.current_npc_count.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn zone_at_cap_never_spawns() {
        let mut manager = ZoneManager::new();
        let mut zone = Zone::new(1, Vec3::ZERO, 1);
        zone.current_npc_count = 1;
        manager.register_zone(zone);

        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let intents = manager.advance(1000.0, &mut rng);
        assert!(intents.is_empty());
    }

    #[test]
    fn zone_under_cap_spawns_after_interval() {
        let mut manager = ZoneManager::new();
        manager.register_zone(Zone::new(1, Vec3::ZERO, 5));

        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let intents = manager.advance(NPC_SPAWN_INTERVAL_SECS, &mut rng);
        assert_eq!(intents.len(), 1);
    }

    #[test]
    fn grid_coord_buckets_by_zone_size() {
        assert_eq!(grid_coord(Vec3::new(150.0, 0.0, 50.0)), (0, 0));
        assert_eq!(grid_coord(Vec3::new(250.0, 0.0, -50.0)), (1, -1));
    }
}
